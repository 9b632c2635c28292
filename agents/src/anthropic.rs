//! Anthropic Adapter
//!
//! Messages API backend. One non-streaming POST per call.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use pulsecheck_core::transport::header;
use pulsecheck_core::{HttpTransport, ReqwestTransport, TransportError};

use crate::generator::{GenerationError, GenerationRequest, Generator};

/// API version sent with every request
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages API adapter
#[derive(Debug)]
pub struct AnthropicGenerator {
    /// Base URL (e.g., https://api.anthropic.com)
    base_url: String,
    /// Model name
    model: String,
    /// API key
    api_key: String,
    request_timeout: Duration,
    /// HTTP transport
    transport: Arc<dyn HttpTransport>,
}

impl AnthropicGenerator {
    /// Create new Anthropic adapter
    pub fn new(base_url: String, model: String, api_key: String, request_timeout: Duration) -> Self {
        Self::with_transport(
            base_url,
            model,
            api_key,
            request_timeout,
            Arc::new(ReqwestTransport::new()),
        )
    }

    /// Create adapter with custom transport (for testing)
    pub fn with_transport(
        base_url: String,
        model: String,
        api_key: String,
        request_timeout: Duration,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            base_url,
            model,
            api_key,
            request_timeout,
            transport,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    /// Build messages request body
    pub fn build_request(&self, request: &GenerationRequest) -> String {
        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "system": request.system,
            "messages": [
                {"role": "user", "content": request.prompt}
            ]
        })
        .to_string()
    }
}

/// Concatenated text blocks of a messages API response
pub fn parse_messages_response(body: &str) -> Result<String, GenerationError> {
    let json: JsonValue = serde_json::from_str(body)
        .map_err(|e| GenerationError::InvalidResponse(format!("Response is not JSON: {}", e)))?;

    let blocks = json["content"]
        .as_array()
        .ok_or_else(|| GenerationError::InvalidResponse("Missing content array".to_string()))?;

    let text: String = blocks
        .iter()
        .filter(|block| block["type"] == "text")
        .filter_map(|block| block["text"].as_str())
        .collect();

    if text.trim().is_empty() {
        return Err(GenerationError::InvalidResponse(
            "Response contained no text".to_string(),
        ));
    }
    Ok(text)
}

/// Map a transport failure onto the generation error taxonomy
pub fn map_transport_error(err: TransportError) -> GenerationError {
    match err {
        TransportError::Timeout(msg) => GenerationError::Timeout(msg),
        TransportError::Network(msg) => GenerationError::Unreachable(msg),
        TransportError::Body(msg) => GenerationError::Unreachable(msg),
        TransportError::Http { status, message } => {
            let detail = format!("HTTP {}: {}", status, message);
            match status {
                401 | 403 => GenerationError::Auth(detail),
                429 => GenerationError::RateLimited(detail),
                s if s >= 500 => GenerationError::Unreachable(detail),
                _ => GenerationError::InvalidRequest(detail),
            }
        }
    }
}

#[async_trait]
impl Generator for AnthropicGenerator {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let headers = vec![
            header("x-api-key", self.api_key.clone()),
            header("anthropic-version", ANTHROPIC_VERSION),
        ];
        let body = self.build_request(request);
        debug!("POST {} ({} bytes, model {})", self.endpoint(), body.len(), self.model);

        let response = self
            .transport
            .post_json(&self.endpoint(), &headers, &body, self.request_timeout)
            .await
            .map_err(map_transport_error)?;
        parse_messages_response(&response)
    }
}
