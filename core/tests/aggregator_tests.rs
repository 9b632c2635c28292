//! Integration tests for the aggregator
//!
//! These tests verify:
//! - One entry per configured source whatever the collectors do
//! - Required failures escalate to critical, optional ones to warning
//! - The overall budget bounds the call and late results are discarded
//! - Identical inputs on a fixed clock give identical snapshots
//!
//! Time is paused so timeouts resolve instantly and deterministically.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use pulsecheck_core::{
    Aggregator, CollectContext, Collector, CollectorError, FailureKind, FixedClock, SourceBinding,
    SourceReport, Status,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Collector with a fixed answer and optional delay
struct Scripted {
    result: Result<Status, CollectorError>,
    delay: Option<Duration>,
    finished: Arc<AtomicBool>,
}

impl Scripted {
    fn ok(status: Status) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(status),
            delay: None,
            finished: Arc::new(AtomicBool::new(false)),
        })
    }

    fn err(error: CollectorError) -> Arc<Self> {
        Arc::new(Self {
            result: Err(error),
            delay: None,
            finished: Arc::new(AtomicBool::new(false)),
        })
    }

    fn slow(status: Status, delay: Duration, finished: Arc<AtomicBool>) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(status),
            delay: Some(delay),
            finished,
        })
    }
}

#[async_trait]
impl Collector for Scripted {
    fn kind(&self) -> &'static str {
        "scripted"
    }

    async fn collect(&self, ctx: &CollectContext) -> Result<SourceReport, CollectorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.finished.store(true, Ordering::SeqCst);
        let status = self.result.clone()?;
        Ok(SourceReport::new(ctx.source_id.clone(), status, ctx.now())
            .with_metric("checked", true)
            .with_finding(format!("{} looked at", ctx.source_id)))
    }
}

const PER_SOURCE: Duration = Duration::from_secs(1);
const OVERALL: Duration = Duration::from_secs(5);
const FOREVER: Duration = Duration::from_secs(3600);

fn never_finishes() -> (Arc<Scripted>, Arc<AtomicBool>) {
    let finished = Arc::new(AtomicBool::new(false));
    (Scripted::slow(Status::Healthy, FOREVER, finished.clone()), finished)
}

#[tokio::test(start_paused = true)]
async fn test_every_source_appears_exactly_once() {
    let (hung, _) = never_finishes();
    let sources = vec![
        SourceBinding::new("a", Scripted::ok(Status::Healthy)),
        SourceBinding::new("b", Scripted::err(CollectorError::auth("401 from API"))),
        SourceBinding::new("c", hung),
        SourceBinding::new("d", Scripted::ok(Status::Critical)),
    ];

    let snapshot = Aggregator::new().aggregate(sources, PER_SOURCE, OVERALL).await.unwrap();

    let ids: Vec<&str> = snapshot.reports.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
    assert_eq!(snapshot.reports["b"].as_failure().unwrap().error_kind, FailureKind::Auth);
    assert_eq!(snapshot.reports["c"].as_failure().unwrap().error_kind, FailureKind::Timeout);
    assert_eq!(snapshot.overall_status, Status::Critical);
}

#[tokio::test(start_paused = true)]
async fn test_required_failure_is_critical() {
    let sources = vec![
        SourceBinding::new("jobs", Scripted::err(CollectorError::unreachable("refused"))).required(true),
        SourceBinding::new("alerts", Scripted::ok(Status::Healthy)),
    ];
    let snapshot = Aggregator::new().aggregate(sources, PER_SOURCE, OVERALL).await.unwrap();
    assert_eq!(snapshot.overall_status, Status::Critical);
    assert!(snapshot.is_required("jobs"));
}

#[tokio::test(start_paused = true)]
async fn test_optional_failure_only_warns() {
    let sources = vec![
        SourceBinding::new("jobs", Scripted::ok(Status::Healthy)).required(true),
        SourceBinding::new("tickets", Scripted::err(CollectorError::invalid_response("not JSON"))),
    ];
    let snapshot = Aggregator::new().aggregate(sources, PER_SOURCE, OVERALL).await.unwrap();
    assert_eq!(snapshot.overall_status, Status::Warning);
}

#[tokio::test(start_paused = true)]
async fn test_overall_budget_bounds_the_call_and_drops_late_results() {
    let (hung, finished) = never_finishes();
    // Per-source override longer than the overall budget
    let sources = vec![
        SourceBinding::new("slow", hung).with_timeout(Duration::from_secs(600)),
        SourceBinding::new("fast", Scripted::ok(Status::Healthy)),
    ];

    let started = Instant::now();
    let snapshot = Aggregator::new().aggregate(sources, PER_SOURCE, OVERALL).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed <= OVERALL + Duration::from_millis(50), "took {:?}", elapsed);
    let failure = snapshot.reports["slow"].as_failure().unwrap();
    assert_eq!(failure.error_kind, FailureKind::Timeout);

    // Let the abandoned collector's sleep run out; it must never complete
    tokio::time::sleep(FOREVER * 2).await;
    assert!(!finished.load(Ordering::SeqCst));
    assert_eq!(snapshot.reports.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_collector_does_not_delay_fast_ones() {
    let finished = Arc::new(AtomicBool::new(false));
    let sources = vec![
        SourceBinding::new(
            "slow",
            Scripted::slow(Status::Warning, Duration::from_millis(800), finished.clone()),
        ),
        SourceBinding::new("fast", Scripted::ok(Status::Healthy)),
    ];

    let started = Instant::now();
    let snapshot = Aggregator::new().aggregate(sources, PER_SOURCE, OVERALL).await.unwrap();

    assert!(started.elapsed() < PER_SOURCE);
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(snapshot.reports["slow"].status(), Some(Status::Warning));
    assert_eq!(snapshot.overall_status, Status::Warning);
}

#[tokio::test(start_paused = true)]
async fn test_same_inputs_on_fixed_clock_give_equal_snapshots() {
    let at = Utc.with_ymd_and_hms(2024, 12, 1, 8, 0, 0).unwrap();
    let aggregator = Aggregator::with_clock(Arc::new(FixedClock(at)));
    let bindings = || {
        vec![
            SourceBinding::new("jobs", Scripted::ok(Status::Warning)).required(true),
            SourceBinding::new("alerts", Scripted::err(CollectorError::timeout("slow API"))),
            SourceBinding::new("shell", Scripted::ok(Status::Healthy)),
        ]
    };

    let first = aggregator.aggregate(bindings(), PER_SOURCE, OVERALL).await.unwrap();
    let second = aggregator.aggregate(bindings(), PER_SOURCE, OVERALL).await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.generated_at, second.generated_at);
    assert_eq!(first.reports, second.reports);
    assert_eq!(first.required_sources, second.required_sources);
    assert_eq!(first.overall_status, second.overall_status);
}

#[tokio::test(start_paused = true)]
async fn test_four_source_scenario() {
    let (hung, _) = never_finishes();
    let sources = vec![
        SourceBinding::new("A", Scripted::ok(Status::Warning)).required(true),
        SourceBinding::new("B", hung).required(true),
        SourceBinding::new("C", Scripted::ok(Status::Healthy)),
        SourceBinding::new("D", Scripted::ok(Status::Healthy)),
    ];

    let snapshot = Aggregator::new().aggregate(sources, PER_SOURCE, OVERALL).await.unwrap();

    assert_eq!(snapshot.overall_status, Status::Critical);
    assert_eq!(snapshot.reports.len(), 4);
    let b = snapshot.reports["B"].as_failure().unwrap();
    assert_eq!(b.error_kind, FailureKind::Timeout);
    assert_eq!(snapshot.reports["A"].status(), Some(Status::Warning));

    let concerns: Vec<String> = snapshot.concerns().iter().map(|c| c.describe()).collect();
    assert_eq!(concerns, vec!["B (failed: timeout)", "A (warning)"]);
}
