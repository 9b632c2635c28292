//! Aggregator
//!
//! Runs every configured collector as its own task, each bounded by a
//! per-source timeout, and the whole set bounded by an overall budget. The
//! collecting loop below is the only writer of the `reports` map. When the
//! overall budget elapses, unfinished tasks are aborted and their `JoinSet`
//! is dropped, so a late result has nowhere to land.

use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::collector::{CollectContext, Collector, CollectorError, SourceBinding};
use crate::model::{FailureKind, HealthSnapshot, SourceFailure, SourceOutcome};

/// Aggregation errors, all raised before any collector runs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("No sources configured")]
    NoSources,

    #[error("Source configured more than once: {0}")]
    DuplicateSource(String),

    #[error("Timeout must be greater than zero: {0}")]
    ZeroTimeout(&'static str),
}

/// Merges concurrent collector results into one `HealthSnapshot`
#[derive(Debug, Clone)]
pub struct Aggregator {
    clock: Arc<dyn Clock>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    /// Create an aggregator on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an aggregator on a custom clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Run all collectors and merge their results
    ///
    /// Every source in `sources` appears exactly once in the returned
    /// snapshot. The call returns no later than `overall_timeout` after it
    /// starts collecting.
    pub async fn aggregate(
        &self,
        sources: Vec<SourceBinding>,
        per_source_timeout: Duration,
        overall_timeout: Duration,
    ) -> Result<HealthSnapshot, AggregateError> {
        validate(&sources, per_source_timeout, overall_timeout)?;

        let run_id = Uuid::new_v4();
        let started_at = self.clock.now();
        let overall_deadline = Instant::now() + overall_timeout;

        info!(
            %run_id,
            sources = sources.len(),
            "Starting parallel collection (per-source {:?}, overall {:?})",
            per_source_timeout,
            overall_timeout
        );

        let expected: Vec<String> = sources.iter().map(|s| s.source_id.clone()).collect();
        let required_sources: BTreeSet<String> = sources
            .iter()
            .filter(|s| s.required)
            .map(|s| s.source_id.clone())
            .collect();

        let mut tasks = JoinSet::new();
        for binding in sources {
            let budget = binding.timeout.unwrap_or(per_source_timeout);
            let deadline = (Instant::now() + budget).min(overall_deadline);
            let ctx = CollectContext::new(binding.source_id, deadline, self.clock.clone());
            tasks.spawn(run_collector(binding.collector, ctx, budget));
        }

        let mut reports: BTreeMap<String, SourceOutcome> = BTreeMap::new();
        let mut budget_exhausted = false;
        loop {
            match tokio::time::timeout_at(overall_deadline, tasks.join_next()).await {
                Ok(Some(Ok(outcome))) => {
                    log_outcome(&outcome);
                    reports.insert(outcome.source_id().to_string(), outcome);
                }
                Ok(Some(Err(join_err))) => {
                    error!("Collector task ended without a result: {}", join_err);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        pending = tasks.len(),
                        "Overall collection budget of {:?} elapsed; abandoning unfinished collectors",
                        overall_timeout
                    );
                    budget_exhausted = true;
                    tasks.abort_all();
                    break;
                }
            }
        }
        drop(tasks);

        let expected_ids: HashSet<&str> = expected.iter().map(String::as_str).collect();
        reports.retain(|id, _| expected_ids.contains(id.as_str()));

        for source_id in expected {
            if reports.contains_key(&source_id) {
                continue;
            }
            let error = if budget_exhausted {
                CollectorError::timeout(format!(
                    "abandoned after overall collection budget of {}s",
                    overall_timeout.as_secs_f64()
                ))
            } else {
                CollectorError::internal("collector task ended without a result")
            };
            warn!(source = %source_id, "{}", error);
            let failure = error.into_failure(source_id.clone(), started_at);
            reports.insert(source_id, SourceOutcome::Failure(failure));
        }

        let snapshot =
            HealthSnapshot::new(run_id, self.clock.now(), reports, required_sources);
        info!(
            %run_id,
            "Collection complete. Overall platform status: {}",
            snapshot.overall_status.as_str().to_uppercase()
        );
        Ok(snapshot)
    }
}

fn validate(
    sources: &[SourceBinding],
    per_source_timeout: Duration,
    overall_timeout: Duration,
) -> Result<(), AggregateError> {
    if sources.is_empty() {
        return Err(AggregateError::NoSources);
    }
    if per_source_timeout.is_zero() {
        return Err(AggregateError::ZeroTimeout("per_source_timeout"));
    }
    if overall_timeout.is_zero() {
        return Err(AggregateError::ZeroTimeout("overall_timeout"));
    }
    let mut seen = HashSet::new();
    for binding in sources {
        if !seen.insert(binding.source_id.as_str()) {
            return Err(AggregateError::DuplicateSource(binding.source_id.clone()));
        }
        if binding.timeout.is_some_and(|t| t.is_zero()) {
            return Err(AggregateError::ZeroTimeout("source timeout"));
        }
    }
    Ok(())
}

/// Run one collector to a `SourceOutcome`; never panics, never overruns
async fn run_collector(
    collector: Arc<dyn Collector>,
    ctx: CollectContext,
    budget: Duration,
) -> SourceOutcome {
    let attempted_at = ctx.now();
    let work = AssertUnwindSafe(collector.collect(&ctx)).catch_unwind();

    let result = match tokio::time::timeout_at(ctx.deadline, work).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(CollectorError::internal(format!(
            "collector panicked: {}",
            panic_message(panic.as_ref())
        ))),
        Err(_) => Err(CollectorError::timeout(format!(
            "no result within {}s",
            budget.as_secs_f64()
        ))),
    };

    match result {
        Ok(mut report) => {
            if report.source_id != ctx.source_id {
                debug!(
                    "{} collector reported as '{}'; re-keying to '{}'",
                    collector.kind(),
                    report.source_id,
                    ctx.source_id
                );
                report.source_id = ctx.source_id.clone();
            }
            SourceOutcome::Report(report)
        }
        Err(err) => SourceOutcome::Failure(err.into_failure(ctx.source_id.clone(), attempted_at)),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn log_outcome(outcome: &SourceOutcome) {
    match outcome {
        SourceOutcome::Report(r) => {
            info!(source = %r.source_id, status = %r.status, "Source collected")
        }
        SourceOutcome::Failure(SourceFailure {
            source_id,
            error_kind: FailureKind::Timeout,
            detail,
            ..
        }) => warn!(source = %source_id, "Source timed out: {}", detail),
        SourceOutcome::Failure(f) => {
            error!(source = %f.source_id, kind = %f.error_kind, "Source failed: {}", f.detail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceReport;
    use crate::status::Status;
    use async_trait::async_trait;

    struct Fixed(Status);

    #[async_trait]
    impl Collector for Fixed {
        fn kind(&self) -> &'static str {
            "fixed"
        }

        async fn collect(&self, ctx: &CollectContext) -> Result<crate::model::SourceReport, CollectorError> {
            Ok(SourceReport::new("ignored", self.0, ctx.now()))
        }
    }

    struct Panics;

    #[async_trait]
    impl Collector for Panics {
        fn kind(&self) -> &'static str {
            "panics"
        }

        async fn collect(&self, _ctx: &CollectContext) -> Result<crate::model::SourceReport, CollectorError> {
            panic!("index out of range");
        }
    }

    const SECOND: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_rejects_empty_source_set() {
        let result = Aggregator::new().aggregate(vec![], SECOND, SECOND).await;
        assert_eq!(result.unwrap_err(), AggregateError::NoSources);
    }

    #[tokio::test]
    async fn test_rejects_duplicate_sources() {
        let sources = vec![
            SourceBinding::new("jobs", Arc::new(Fixed(Status::Healthy))),
            SourceBinding::new("jobs", Arc::new(Fixed(Status::Healthy))),
        ];
        let result = Aggregator::new().aggregate(sources, SECOND, SECOND).await;
        assert_eq!(result.unwrap_err(), AggregateError::DuplicateSource("jobs".into()));
    }

    #[tokio::test]
    async fn test_rejects_zero_timeouts() {
        let sources = vec![SourceBinding::new("jobs", Arc::new(Fixed(Status::Healthy)))];
        let result = Aggregator::new()
            .aggregate(sources, Duration::ZERO, SECOND)
            .await;
        assert!(matches!(result, Err(AggregateError::ZeroTimeout(_))));
    }

    #[tokio::test]
    async fn test_report_is_rekeyed_to_configured_source_id() {
        let sources = vec![SourceBinding::new("jobs", Arc::new(Fixed(Status::Warning)))];
        let snapshot = Aggregator::new().aggregate(sources, SECOND, SECOND).await.unwrap();
        let report = snapshot.reports["jobs"].as_report().unwrap();
        assert_eq!(report.source_id, "jobs");
        assert_eq!(snapshot.overall_status, Status::Warning);
    }

    #[tokio::test]
    async fn test_panicking_collector_becomes_internal_failure() {
        let sources = vec![
            SourceBinding::new("shell", Arc::new(Panics)),
            SourceBinding::new("jobs", Arc::new(Fixed(Status::Healthy))),
        ];
        let snapshot = Aggregator::new().aggregate(sources, SECOND, SECOND).await.unwrap();
        let failure = snapshot.reports["shell"].as_failure().unwrap();
        assert_eq!(failure.error_kind, FailureKind::Internal);
        assert!(failure.detail.contains("index out of range"));
        assert_eq!(snapshot.overall_status, Status::Warning);
    }
}
