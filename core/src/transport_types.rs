//! Transport types
//!
//! Common types shared across transport implementations.

use async_trait::async_trait;
use std::time::Duration;

/// HTTP header as an owned name/value pair
pub type Header = (String, String);

/// Transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Request did not complete within its timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection refused, DNS failure, TLS failure
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP error (non-2xx status)
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// Body could not be read or was not valid text
    #[error("Invalid body: {0}")]
    Body(String),
}

impl TransportError {
    /// HTTP status, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Asynchronous HTTP transport
///
/// Abstraction over the HTTP client so collectors, generators and channels
/// can be exercised with `FakeTransport`.
#[async_trait]
pub trait HttpTransport: Send + Sync + std::fmt::Debug {
    /// GET a URL and return the response body
    async fn get(
        &self,
        url: &str,
        headers: &[Header],
        timeout: Duration,
    ) -> Result<String, TransportError>;

    /// POST a JSON body and return the response body
    async fn post_json(
        &self,
        url: &str,
        headers: &[Header],
        body: &str,
        timeout: Duration,
    ) -> Result<String, TransportError>;
}
