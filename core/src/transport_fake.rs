//! Fake transport for testing
//!
//! Replays scripted responses instead of making real HTTP calls and records
//! every request it receives.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::transport_types::{Header, HttpTransport, TransportError};

/// A request seen by `FakeTransport`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub headers: Vec<Header>,
    pub body: Option<String>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Fake transport for testing (uses scripted responses)
#[derive(Debug, Default)]
pub struct FakeTransport {
    /// Responses returned in order; the last one repeats once the queue drains
    responses: Mutex<VecDeque<Result<String, TransportError>>>,
    /// Requests in arrival order
    requests: Mutex<Vec<RecordedRequest>>,
    /// Delay applied before answering
    delay: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeTransport {
    /// Create fake transport that always answers with `body`
    pub fn new(body: &str) -> Self {
        Self::with_responses(vec![Ok(body.to_string())])
    }

    /// Create fake transport that always fails with `error`
    pub fn with_error(error: TransportError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    /// Create fake transport answering with `responses` in order
    pub fn with_responses(responses: Vec<Result<String, TransportError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Delay every answer by `delay`
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    async fn answer(&self, request: RecordedRequest) -> Result<String, TransportError> {
        lock(&self.requests).push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut responses = lock(&self.responses);
        match responses.len() {
            0 => Err(TransportError::Network("no scripted response".to_string())),
            1 => responses[0].clone(),
            _ => responses
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Network("no scripted response".into()))),
        }
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[Header],
        _timeout: Duration,
    ) -> Result<String, TransportError> {
        self.answer(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            headers: headers.to_vec(),
            body: None,
        })
        .await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &[Header],
        body: &str,
        _timeout: Duration,
    ) -> Result<String, TransportError> {
        self.answer(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            headers: headers.to_vec(),
            body: Some(body.to_string()),
        })
        .await
    }
}
