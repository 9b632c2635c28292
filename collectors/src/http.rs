//! Shared helpers for HTTP-backed collectors

use serde::de::DeserializeOwned;
use std::time::Duration;

use pulsecheck_core::transport::{bearer, Header};
use pulsecheck_core::{CollectorError, HttpTransport};

/// GET `url` and decode the body as JSON
pub(crate) async fn get_json<T: DeserializeOwned>(
    transport: &dyn HttpTransport,
    url: &str,
    headers: &[Header],
    timeout: Duration,
) -> Result<T, CollectorError> {
    let body = transport.get(url, headers, timeout).await?;
    serde_json::from_str(&body).map_err(|e| {
        CollectorError::invalid_response(format!("Undecodable response from {}: {}", url, e))
    })
}

/// Bearer header for an optional token
pub(crate) fn token_headers(token: Option<&str>) -> Vec<Header> {
    token.map(bearer).into_iter().collect()
}

/// First `max` characters of `text`
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push('…');
    out
}
