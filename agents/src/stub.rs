//! Stub Generator
//!
//! Testing backend that replays scripted responses without network calls.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::generator::{GenerationError, GenerationRequest, Generator};

/// Stub generator for testing (returns scripted responses)
#[derive(Debug)]
pub struct StubGenerator {
    /// Answers in order; the last one repeats once the queue drains
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for StubGenerator {
    fn default() -> Self {
        Self::new(&Self::default_response())
    }
}

impl StubGenerator {
    /// Create stub generator that always answers with `response`
    pub fn new(response: &str) -> Self {
        Self::with_responses(vec![Ok(response.to_string())])
    }

    /// Create stub generator that always fails with `error`
    pub fn failing(error: GenerationError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    /// Create stub generator answering with `responses` in order
    pub fn with_responses(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Default well-formed synthesis
    pub fn default_response() -> String {
        serde_json::json!({
            "summary": "All monitored sources report normal operation.",
            "severity": "healthy",
            "actions": []
        })
        .to_string()
    }

    /// Number of generate calls so far
    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<GenerationRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl Generator for StubGenerator {
    fn provider_name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        lock(&self.requests).push(request.clone());
        let mut responses = lock(&self.responses);
        if responses.len() > 1 {
            if let Some(next) = responses.pop_front() {
                return next;
            }
        }
        responses
            .front()
            .cloned()
            .unwrap_or_else(|| Err(GenerationError::Unreachable("no scripted response".into())))
    }
}
