//! Text-generation backend interface
//!
//! Provider-agnostic seam between the analyzer and a text-generation API.
//! The analyzer only sees a request in, response text or a typed error out.

use async_trait::async_trait;

/// Generation backend errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Request did not complete within its timeout
    #[error("Generation timed out: {0}")]
    Timeout(String),

    /// Backend asked us to slow down (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Connection failure or server-side error
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// Credentials rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Backend rejected the request itself
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Backend answered but the envelope carried no usable text
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    /// Whether another attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationError::Timeout(_)
                | GenerationError::RateLimited(_)
                | GenerationError::Unreachable(_)
                | GenerationError::InvalidResponse(_)
        )
    }

    /// Short wire name for logs and fallback summaries
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Timeout(_) => "timeout",
            GenerationError::RateLimited(_) => "rate_limited",
            GenerationError::Unreachable(_) => "unreachable",
            GenerationError::Auth(_) => "auth",
            GenerationError::InvalidRequest(_) => "invalid_request",
            GenerationError::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// One generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Text-generation backend
///
/// Implementations must be safe to call concurrently and hold no per-call
/// state; retries are the caller's business.
#[async_trait]
pub trait Generator: Send + Sync + std::fmt::Debug {
    /// Provider name for logging
    fn provider_name(&self) -> &str;

    /// Generate a completion for `request`
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}
