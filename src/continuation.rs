/// Continuation service adapter: one document in, one continuation out.
///
/// Stateless and single-shot. No retries, no caching; the timeout is owned by
/// the HTTP client underneath.
use async_trait::async_trait;

use crate::client::Client;
use crate::error::ProviderError;

const INSTRUCTIONS: &str = "Continue the text below from exactly where it ends. \
Do not repeat its final sentence. Do not add greetings, commentary or any other \
conversational filler. Reply with the continuation only.";

#[async_trait]
pub trait ContinuationProvider: Send + Sync {
    /// `current_text` is the trimmed document; emptiness is checked by the caller.
    async fn generate(&self, current_text: &str) -> Result<String, ProviderError>;
}

/// Build the single prompt sent to the model.
pub fn build_prompt(current_text: &str) -> String {
    format!("{INSTRUCTIONS}\n\nText:\n{current_text}")
}

// ── Chat-completions backed provider ──────────────────────────────────────────

pub struct ChatContinuation {
    client: Client,
}

impl ChatContinuation {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContinuationProvider for ChatContinuation {
    async fn generate(&self, current_text: &str) -> Result<String, ProviderError> {
        let prompt = build_prompt(current_text);
        let completion = self.client.complete(&prompt).await?;
        tracing::debug!(
            input_tokens = completion.input_tokens,
            output_tokens = completion.output_tokens,
            chars = completion.text.len(),
            "continuation received"
        );
        if completion.text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(completion.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse(chunks: &[&str]) -> String {
        let mut body = String::new();
        for c in chunks {
            let line = json!({"choices": [{"delta": {"content": c}}]});
            body.push_str(&format!("data: {line}\n\n"));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    fn provider_for(server: &MockServer) -> ChatContinuation {
        let client = Client::new(server.uri(), "test-model".to_string(), 5)
            .expect("client builds");
        ChatContinuation::new(client)
    }

    #[test]
    fn test_prompt_carries_document_and_instructions() {
        let prompt = build_prompt("The sky was");
        assert!(prompt.ends_with("The sky was"));
        assert!(prompt.contains("Do not repeat its final sentence"));
        assert!(prompt.contains("conversational filler"));
    }

    #[tokio::test]
    async fn test_generate_returns_streamed_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(sse(&[" turning", " orange."]), "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let text = provider_for(&server).generate("The sky was").await.unwrap();
        assert_eq!(text, " turning orange.");
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse(&["", "  "]), "text/event-stream"),
            )
            .mount(&server)
            .await;

        let err = provider_for(&server).generate("The sky was").await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }
}
