use thiserror::Error;

/// Shown when a provider failure carries no message of its own.
pub const FALLBACK_ERROR_MESSAGE: &str = "Failed to generate text";

// ── Provider failures ─────────────────────────────────────────────────────────

/// Everything that can go wrong while asking the provider for a continuation.
/// Always recovered into the machine's `failure` state, never escalated.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Connection refused, DNS failure, broken stream, ...
    #[error("network error: {0}")]
    Transport(String),
    /// The request exceeded the configured timeout.
    #[error("request timed out after {0}s")]
    Timeout(u64),
    /// Non-2xx response from the endpoint.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The call succeeded but produced no text.
    #[error("the model returned no text")]
    EmptyResponse,
    /// Provider-reported failure, surfaced verbatim.
    #[error("{0}")]
    Provider(String),
}

impl ProviderError {
    /// Human-readable reason stored in the orchestration context.
    pub fn normalized(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            FALLBACK_ERROR_MESSAGE.to_string()
        } else {
            message
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

// ── Entry-point rejections ────────────────────────────────────────────────────

/// Reasons `trigger_generation` refuses to start. Neither causes a transition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TriggerError {
    #[error("nothing to continue: the document is empty")]
    EmptyDocument,
    #[error("a continuation is already being generated")]
    Busy,
}
