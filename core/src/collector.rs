//! Collector capability
//!
//! A collector turns one external source into a `SourceReport`. Anything that
//! goes wrong is returned as a `CollectorError`; the aggregator stamps it into
//! a `SourceFailure`. Collectors hold no state between runs and may be run
//! concurrently with each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::clock::{Clock, SystemClock};
use crate::model::{FailureKind, SourceFailure, SourceReport};
use crate::transport::TransportError;

/// Collector errors, one per failure kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct CollectorError {
    pub kind: FailureKind,
    pub detail: String,
}

impl CollectorError {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, detail)
    }

    pub fn auth(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Auth, detail)
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Unreachable, detail)
    }

    pub fn invalid_response(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidResponse, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Internal, detail)
    }

    /// Stamp this error into a `SourceFailure`
    pub fn into_failure(self, source_id: impl Into<String>, attempted_at: DateTime<Utc>) -> SourceFailure {
        SourceFailure {
            source_id: source_id.into(),
            error_kind: self.kind,
            detail: self.detail,
            attempted_at,
        }
    }
}

impl From<TransportError> for CollectorError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(msg) => CollectorError::timeout(msg),
            TransportError::Network(msg) => CollectorError::unreachable(msg),
            TransportError::Http { status, message } if status == 401 || status == 403 => {
                CollectorError::auth(format!("HTTP {}: {}", status, message))
            }
            TransportError::Http { status, message } if status >= 500 => {
                CollectorError::unreachable(format!("HTTP {}: {}", status, message))
            }
            TransportError::Http { status, message } => {
                CollectorError::invalid_response(format!("HTTP {}: {}", status, message))
            }
            TransportError::Body(msg) => CollectorError::invalid_response(msg),
        }
    }
}

impl From<serde_json::Error> for CollectorError {
    fn from(err: serde_json::Error) -> Self {
        CollectorError::invalid_response(format!("JSON error: {}", err))
    }
}

/// Per-invocation context handed to a collector
#[derive(Debug, Clone)]
pub struct CollectContext {
    /// Source being collected
    pub source_id: String,
    /// Point after which the result will be discarded
    pub deadline: Instant,
    clock: Arc<dyn Clock>,
}

impl CollectContext {
    pub fn new(source_id: impl Into<String>, deadline: Instant, clock: Arc<dyn Clock>) -> Self {
        Self {
            source_id: source_id.into(),
            deadline,
            clock,
        }
    }

    /// Context with the system clock and `budget` from now
    pub fn with_budget(source_id: impl Into<String>, budget: Duration) -> Self {
        Self::new(source_id, Instant::now() + budget, Arc::new(SystemClock))
    }

    /// Wall-clock time for `collected_at` stamps
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Time left before the deadline
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// `limit` shortened to the time left before the deadline
    pub fn bounded(&self, limit: Duration) -> Duration {
        limit.min(self.remaining())
    }
}

/// Collector capability, one implementation per source type
#[async_trait]
pub trait Collector: Send + Sync {
    /// Registry key of this collector type
    fn kind(&self) -> &'static str;

    /// Collect one report for `ctx.source_id`
    async fn collect(&self, ctx: &CollectContext) -> Result<SourceReport, CollectorError>;
}

/// A configured source ready to be aggregated
#[derive(Clone)]
pub struct SourceBinding {
    pub source_id: String,
    /// Failure escalates the run to `Critical`
    pub required: bool,
    /// Overrides the aggregator's per-source timeout
    pub timeout: Option<Duration>,
    pub collector: Arc<dyn Collector>,
}

impl SourceBinding {
    pub fn new(source_id: impl Into<String>, collector: Arc<dyn Collector>) -> Self {
        Self {
            source_id: source_id.into(),
            required: false,
            timeout: None,
            collector,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for SourceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceBinding")
            .field("source_id", &self.source_id)
            .field("kind", &self.collector.kind())
            .field("required", &self.required)
            .field("timeout", &self.timeout)
            .finish()
    }
}
