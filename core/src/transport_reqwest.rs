//! reqwest-backed transport

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::transport_types::{Header, HttpTransport, TransportError};

/// Response bodies in error messages are cut to this many characters
const ERROR_BODY_LIMIT: usize = 500;

/// Production transport over a shared `reqwest::Client`
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<String, TransportError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        debug!("{} answered {} ({} bytes)", url, status, body.len());

        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                message: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }
        Ok(body)
    }
}

fn apply_headers(
    mut request: reqwest::RequestBuilder,
    headers: &[Header],
) -> reqwest::RequestBuilder {
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() || err.is_request() {
        TransportError::Network(err.to_string())
    } else if let Some(status) = err.status() {
        TransportError::Http {
            status: status.as_u16(),
            message: err.to_string(),
        }
    } else {
        TransportError::Body(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[Header],
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let request = apply_headers(self.client.get(url), headers).timeout(timeout);
        self.send(request, url).await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &[Header],
        body: &str,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let request = apply_headers(self.client.post(url), headers)
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .timeout(timeout);
        self.send(request, url).await
    }
}
