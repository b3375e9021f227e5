use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde::Deserialize;

use crate::error::ProviderError;

// ── Completion after streaming finishes ───────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

// ── SSE chunk types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    usage: Option<UsageStats>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
    // reasoning_content (DeepSeek-R1, Qwen3 thinking) is deliberately not read:
    // only visible text belongs in the document.
}

#[derive(Debug, Deserialize)]
struct UsageStats {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

// ── Non-streaming body (servers that ignore `stream: true`) ───────────────────

#[derive(Debug, Deserialize)]
struct FullResponse {
    choices: Vec<FullChoice>,
    usage: Option<UsageStats>,
}

#[derive(Debug, Deserialize)]
struct FullChoice {
    message: FullMessage,
}

#[derive(Debug, Deserialize)]
struct FullMessage {
    content: Option<String>,
}

// ── Error payloads ({"error": {"message": ...}}) ──────────────────────────────

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiErrorBody {
    Detailed { message: String },
    Plain(String),
}

impl ApiErrorBody {
    fn into_message(self) -> String {
        match self {
            ApiErrorBody::Detailed { message } | ApiErrorBody::Plain(message) => message,
        }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Minimal OpenAI-compatible chat-completions client.
pub struct Client {
    http: reqwest::Client,
    pub endpoint: String,
    pub model: String,
    api_key: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: u64,
}

impl Client {
    pub fn new(endpoint: String, model: String, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            endpoint,
            model,
            api_key: None,
            max_tokens: None,
            temperature: None,
            timeout_secs,
        })
    }

    pub fn set_api_key(&mut self, key: String) {
        self.api_key = Some(key);
    }

    pub fn set_max_tokens(&mut self, max_tokens: u32) {
        self.max_tokens = Some(max_tokens);
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = Some(temperature);
    }

    /// Send one user prompt and accumulate the streamed reply into a single string.
    /// Nothing is surfaced until the stream has finished.
    pub async fn complete(&self, prompt: &str) -> Result<Completion, ProviderError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "stream": true,
            "stream_options": {"include_usage": true},
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        let url = format!("{}/v1/chat/completions", self.endpoint.trim_end_matches('/'));

        let mut req = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);

        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        tracing::debug!(
            %url,
            model = %self.model,
            prompt_chars = prompt.len(),
            "requesting continuation"
        );
        let resp = req.send().await.map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: api_error_message(&text, status),
            });
        }

        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        if is_json {
            let text = resp.text().await.map_err(|e| self.classify(e))?;
            return parse_full_response(&text);
        }

        let mut stream = resp.bytes_stream();
        let mut acc = StreamAccumulator::default();
        // Bytes of a line split across network chunks
        let mut pending: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| self.classify(e))?;
            pending.extend_from_slice(&bytes);
            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                acc.feed_line(&String::from_utf8_lossy(&line))?;
            }
        }
        if !pending.is_empty() {
            acc.feed_line(&String::from_utf8_lossy(&pending))?;
        }

        Ok(acc.finish())
    }

    fn classify(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout_secs)
        } else {
            ProviderError::from(e)
        }
    }
}

// ── SSE accumulation ──────────────────────────────────────────────────────────

#[derive(Default)]
struct StreamAccumulator {
    text: String,
    input_tokens: u32,
    output_tokens: u32,
}

impl StreamAccumulator {
    fn feed_line(&mut self, line: &str) -> Result<(), ProviderError> {
        let line = line.trim();
        if line.is_empty() || line == "data: [DONE]" {
            return Ok(());
        }
        // Comments (": keep-alive") and event names carry nothing for us
        let Some(json_str) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let chunk: StreamChunk = serde_json::from_str(json_str.trim())
            .map_err(|e| ProviderError::Malformed(format!("{e}: {json_str}")))?;

        if let Some(err) = chunk.error {
            return Err(ProviderError::Provider(err.into_message()));
        }
        if let Some(usage) = chunk.usage {
            self.input_tokens = usage.prompt_tokens.unwrap_or(0);
            self.output_tokens = usage.completion_tokens.unwrap_or(0);
        }
        for choice in chunk.choices.unwrap_or_default() {
            if let Some(text) = choice.delta.and_then(|d| d.content) {
                self.text.push_str(&text);
            }
        }
        Ok(())
    }

    fn finish(self) -> Completion {
        Completion {
            text: self.text,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
        }
    }
}

fn parse_full_response(body: &str) -> Result<Completion, ProviderError> {
    if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(body) {
        return Err(ProviderError::Provider(env.error.into_message()));
    }
    let full: FullResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    let text = full
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();
    let (input_tokens, output_tokens) = full
        .usage
        .map(|u| (u.prompt_tokens.unwrap_or(0), u.completion_tokens.unwrap_or(0)))
        .unwrap_or((0, 0));
    Ok(Completion { text, input_tokens, output_tokens })
}

fn api_error_message(body: &str, status: reqwest::StatusCode) -> String {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|env| env.error.into_message())
        .unwrap_or_else(|_| body.trim().to_string());
    if message.trim().is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        message
    }
}
