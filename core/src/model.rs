//! Run data model
//!
//! Every entity here is created fresh for one run and never mutated after
//! construction. `HealthSnapshot` is built by the aggregator, `Synthesis` by
//! the analyzer and `DeliveryResult` by the dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use crate::status::Status;

/// Metric value reported by a collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Bool(v) => write!(f, "{}", v),
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{:.2}", v),
            MetricValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        MetricValue::Bool(v)
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        MetricValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

/// Output of one successful collector run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    /// Stable identifier of the source
    pub source_id: String,
    /// Source-local severity, derived by the collector
    pub status: Status,
    /// Named metrics
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricValue>,
    /// Human-readable observations, in collector order
    #[serde(default)]
    pub findings: Vec<String>,
    /// When the data was collected
    pub collected_at: DateTime<Utc>,
}

impl SourceReport {
    /// Create an empty report
    pub fn new(source_id: impl Into<String>, status: Status, collected_at: DateTime<Utc>) -> Self {
        Self {
            source_id: source_id.into(),
            status,
            metrics: BTreeMap::new(),
            findings: Vec::new(),
            collected_at,
        }
    }

    /// Add a metric
    pub fn with_metric(mut self, name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.metrics.insert(name.into(), value.into());
        self
    }

    /// Append a finding
    pub fn with_finding(mut self, finding: impl Into<String>) -> Self {
        self.findings.push(finding.into());
        self
    }
}

/// Why a collector could not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Auth,
    Unreachable,
    InvalidResponse,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Auth => "auth",
            FailureKind::Unreachable => "unreachable",
            FailureKind::InvalidResponse => "invalid_response",
            FailureKind::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output when a collector could not complete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source_id: String,
    pub error_kind: FailureKind,
    pub detail: String,
    pub attempted_at: DateTime<Utc>,
}

/// Exactly one of report or failure for a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SourceOutcome {
    Report(SourceReport),
    Failure(SourceFailure),
}

impl SourceOutcome {
    pub fn source_id(&self) -> &str {
        match self {
            SourceOutcome::Report(r) => &r.source_id,
            SourceOutcome::Failure(f) => &f.source_id,
        }
    }

    /// Reported status, `None` for failures
    pub fn status(&self) -> Option<Status> {
        match self {
            SourceOutcome::Report(r) => Some(r.status),
            SourceOutcome::Failure(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SourceOutcome::Failure(_))
    }

    pub fn as_failure(&self) -> Option<&SourceFailure> {
        match self {
            SourceOutcome::Failure(f) => Some(f),
            SourceOutcome::Report(_) => None,
        }
    }

    pub fn as_report(&self) -> Option<&SourceReport> {
        match self {
            SourceOutcome::Report(r) => Some(r),
            SourceOutcome::Failure(_) => None,
        }
    }

    /// Status this outcome contributes to the platform-wide status
    ///
    /// Failures escalate to `Critical` for required sources and to
    /// `Warning` otherwise.
    pub fn effective_status(&self, required: bool) -> Status {
        match self {
            SourceOutcome::Report(r) => r.status,
            SourceOutcome::Failure(_) if required => Status::Critical,
            SourceOutcome::Failure(_) => Status::Warning,
        }
    }
}

/// Derive the platform-wide status from per-source outcomes
pub fn derive_overall_status(
    reports: &BTreeMap<String, SourceOutcome>,
    required_sources: &BTreeSet<String>,
) -> Status {
    Status::worst(
        reports
            .iter()
            .map(|(id, outcome)| outcome.effective_status(required_sources.contains(id))),
    )
}

/// Merged point-in-time view of all sources for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// One entry per configured source
    pub reports: BTreeMap<String, SourceOutcome>,
    /// Sources whose failure forces `Critical`
    #[serde(default)]
    pub required_sources: BTreeSet<String>,
    pub overall_status: Status,
}

/// A source that is not plainly healthy, as seen by the analyzer and renderer
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConcern<'a> {
    pub source_id: &'a str,
    pub required: bool,
    /// Status the source contributes to the overall status
    pub effective_status: Status,
    pub outcome: &'a SourceOutcome,
}

impl SourceConcern<'_> {
    /// Short human description, e.g. `jira (warning)` or `jobs (failed: timeout)`
    pub fn describe(&self) -> String {
        match self.outcome {
            SourceOutcome::Report(r) => format!("{} ({})", self.source_id, r.status),
            SourceOutcome::Failure(f) => format!("{} (failed: {})", self.source_id, f.error_kind),
        }
    }
}

impl HealthSnapshot {
    /// Build a snapshot, deriving `overall_status` from the outcomes
    pub fn new(
        run_id: Uuid,
        generated_at: DateTime<Utc>,
        reports: BTreeMap<String, SourceOutcome>,
        required_sources: BTreeSet<String>,
    ) -> Self {
        let overall_status = derive_overall_status(&reports, &required_sources);
        Self {
            run_id,
            generated_at,
            reports,
            required_sources,
            overall_status,
        }
    }

    pub fn is_required(&self, source_id: &str) -> bool {
        self.required_sources.contains(source_id)
    }

    /// Non-healthy sources, most severe first, then by source id
    pub fn concerns(&self) -> Vec<SourceConcern<'_>> {
        let mut concerns: Vec<SourceConcern<'_>> = self
            .reports
            .iter()
            .filter_map(|(id, outcome)| {
                let required = self.is_required(id);
                let effective_status = outcome.effective_status(required);
                if effective_status.is_healthy() {
                    return None;
                }
                Some(SourceConcern {
                    source_id: id.as_str(),
                    required,
                    effective_status,
                    outcome,
                })
            })
            .collect();
        concerns.sort_by(|a, b| {
            b.effective_status
                .cmp(&a.effective_status)
                .then_with(|| b.outcome.is_failure().cmp(&a.outcome.is_failure()))
                .then_with(|| a.source_id.cmp(b.source_id))
        });
        concerns
    }

    /// Count of sources per reported status (failures counted separately)
    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for outcome in self.reports.values() {
            match outcome.status() {
                Some(Status::Healthy) => counts.healthy += 1,
                Some(Status::Warning) => counts.warning += 1,
                Some(Status::Critical) => counts.critical += 1,
                None => counts.failed += 1,
            }
        }
        counts
    }
}

/// Per-status source counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
    pub failed: usize,
}

/// Output of the analyzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synthesis {
    pub summary: String,
    pub severity: Status,
    /// Recommended actions, most important first
    pub actions: Vec<String>,
    /// True when produced by the rule-based fallback
    pub degraded: bool,
}

/// Delivery outcome for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed,
}

/// Per-channel delivery record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub channel_id: String,
    pub outcome: DeliveryOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryResult {
    pub fn sent(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            outcome: DeliveryOutcome::Sent,
            error: None,
        }
    }

    pub fn failed(channel_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            outcome: DeliveryOutcome::Failed,
            error: Some(error.into()),
        }
    }

    pub fn is_sent(&self) -> bool {
        self.outcome == DeliveryOutcome::Sent
    }
}
