//! Job-platform collector
//!
//! Reads the job list of an ML/batch platform, keeps the jobs created inside
//! the lookback window and grades the platform by how many of them failed.
//! When a compute endpoint is configured, cluster provisioning states are
//! reported too; they never change the grade and a failed compute listing
//! only adds a finding.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use pulsecheck_core::{
    CollectContext, Collector, CollectorError, HttpTransport, SourceConfig, SourceReport, Status,
};

use crate::http::{get_json, token_headers, truncate};
use crate::registry::{parse_settings, CollectorEnv, RegistryError};

const ERROR_TEXT_LIMIT: usize = 300;

/// Settings for a `jobs` source
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobsSettings {
    /// Endpoint returning the job list
    pub url: String,
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,
    /// Optional endpoint returning compute clusters
    #[serde(default)]
    pub compute_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_lookback_hours() -> u32 {
    24
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// One job as returned by the platform
#[derive(Debug, Clone, Deserialize)]
struct Job {
    name: String,
    #[serde(default, alias = "displayName")]
    display_name: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default, alias = "createdAt", alias = "creation_time")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    error: Option<Value>,
}

impl Job {
    fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    fn error_text(&self) -> String {
        match &self.error {
            None | Some(Value::Null) => "no error details".to_string(),
            Some(Value::String(s)) => truncate(s, ERROR_TEXT_LIMIT),
            Some(Value::Object(map)) => match map.get("message").and_then(Value::as_str) {
                Some(message) => truncate(message, ERROR_TEXT_LIMIT),
                None => truncate(&Value::Object(map.clone()).to_string(), ERROR_TEXT_LIMIT),
            },
            Some(other) => truncate(&other.to_string(), ERROR_TEXT_LIMIT),
        }
    }
}

/// Bare array or `{"jobs": [...]}` / `{"value": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JobList {
    Bare(Vec<Job>),
    Wrapped {
        #[serde(alias = "value")]
        jobs: Vec<Job>,
    },
}

impl JobList {
    fn into_jobs(self) -> Vec<Job> {
        match self {
            JobList::Bare(jobs) | JobList::Wrapped { jobs } => jobs,
        }
    }
}

/// One compute cluster
#[derive(Debug, Clone, Deserialize)]
struct Compute {
    name: String,
    #[serde(default = "unknown", rename = "type", alias = "computeType", alias = "compute_type")]
    kind: String,
    #[serde(default = "unknown", alias = "provisioningState", alias = "provisioning_state")]
    state: String,
}

fn unknown() -> String {
    "Unknown".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ComputeList {
    Bare(Vec<Compute>),
    Wrapped {
        #[serde(alias = "value")]
        compute: Vec<Compute>,
    },
}

impl ComputeList {
    fn into_compute(self) -> Vec<Compute> {
        match self {
            ComputeList::Bare(compute) | ComputeList::Wrapped { compute } => compute,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Completed,
    Failed,
    Running,
    Other,
}

fn classify(status: &str) -> JobState {
    match status.to_ascii_lowercase().as_str() {
        "completed" | "succeeded" => JobState::Completed,
        "failed" => JobState::Failed,
        "running" | "starting" | "queued" | "preparing" | "provisioning" => JobState::Running,
        _ => JobState::Other,
    }
}

/// 0 failed → healthy, 1–3 → warning, more → critical
pub fn status_for_failed_jobs(failed: usize) -> Status {
    match failed {
        0 => Status::Healthy,
        1..=3 => Status::Warning,
        _ => Status::Critical,
    }
}

/// Job-platform collector
#[derive(Debug)]
pub struct JobsCollector {
    settings: JobsSettings,
    token: Option<String>,
    transport: Arc<dyn HttpTransport>,
}

impl JobsCollector {
    pub const KIND: &'static str = "jobs";

    pub fn new(settings: JobsSettings, token: Option<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            settings,
            token,
            transport,
        }
    }

    pub fn from_config(source: &SourceConfig, env: &CollectorEnv) -> Result<Self, RegistryError> {
        Ok(Self::new(
            parse_settings(source)?,
            source.token.clone(),
            env.transport.clone(),
        ))
    }

    /// Compute summary findings; a failed listing is reported, not raised
    async fn compute_findings(&self, url: &str, timeout: Duration) -> (Vec<Compute>, Vec<String>) {
        let listed = get_json::<ComputeList>(
            self.transport.as_ref(),
            url,
            &token_headers(self.token.as_deref()),
            timeout,
        )
        .await;
        match listed {
            Ok(list) => {
                let compute = list.into_compute();
                let findings = compute
                    .iter()
                    .filter(|c| !c.state.eq_ignore_ascii_case("succeeded"))
                    .map(|c| format!("Compute '{}' ({}) is {}", c.name, c.kind, c.state))
                    .collect();
                (compute, findings)
            }
            Err(e) => {
                warn!("Could not fetch compute list: {}", e);
                (Vec::new(), vec![format!("Could not fetch compute list: {}", e.detail)])
            }
        }
    }
}

#[async_trait]
impl Collector for JobsCollector {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn collect(&self, ctx: &CollectContext) -> Result<SourceReport, CollectorError> {
        info!(source = %ctx.source_id, "Collecting job platform data...");
        let timeout = ctx.bounded(Duration::from_secs(self.settings.request_timeout_secs));
        let list: JobList = get_json(
            self.transport.as_ref(),
            &self.settings.url,
            &token_headers(self.token.as_deref()),
            timeout,
        )
        .await?;

        let now = ctx.now();
        let cutoff = now - chrono::Duration::hours(i64::from(self.settings.lookback_hours));
        let jobs: Vec<Job> = list
            .into_jobs()
            .into_iter()
            .filter(|job| job.created_at.map_or(true, |created| created >= cutoff))
            .collect();

        let (mut completed, mut running, mut other) = (0usize, 0usize, 0usize);
        let mut failed = Vec::new();
        for job in &jobs {
            match classify(&job.status) {
                JobState::Completed => completed += 1,
                JobState::Failed => failed.push(job),
                JobState::Running => running += 1,
                JobState::Other => other += 1,
            }
        }

        let status = status_for_failed_jobs(failed.len());
        debug!(
            source = %ctx.source_id,
            "{} jobs in window: {} completed, {} failed, {} running, {} other",
            jobs.len(),
            completed,
            failed.len(),
            running,
            other
        );

        let mut report = SourceReport::new(ctx.source_id.clone(), status, now)
            .with_metric("lookback_hours", i64::from(self.settings.lookback_hours))
            .with_metric("total", jobs.len())
            .with_metric("completed", completed)
            .with_metric("failed", failed.len())
            .with_metric("running", running)
            .with_metric("other", other);
        for job in failed {
            report = report.with_finding(format!("Job '{}' failed: {}", job.label(), job.error_text()));
        }
        if running > 0 {
            report = report.with_finding(format!("{} job(s) still running", running));
        }

        if let Some(url) = &self.settings.compute_url {
            let (compute, findings) = self.compute_findings(url, timeout).await;
            let ready = compute
                .iter()
                .filter(|c| c.state.eq_ignore_ascii_case("succeeded"))
                .count();
            report = report
                .with_metric("compute_total", compute.len())
                .with_metric("compute_not_ready", compute.len() - ready);
            for finding in findings {
                report = report.with_finding(finding);
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsecheck_core::{FailureKind, FakeTransport, MetricValue, TransportError};

    fn collector(transport: Arc<FakeTransport>) -> JobsCollector {
        JobsCollector::new(
            JobsSettings {
                url: "https://ml.example.com/jobs".into(),
                lookback_hours: 24,
                compute_url: None,
                request_timeout_secs: 30,
            },
            Some("secret".into()),
            transport,
        )
    }

    fn ctx() -> CollectContext {
        CollectContext::with_budget("azure_ml", Duration::from_secs(60))
    }

    #[test]
    fn test_failed_job_thresholds() {
        assert_eq!(status_for_failed_jobs(0), Status::Healthy);
        assert_eq!(status_for_failed_jobs(1), Status::Warning);
        assert_eq!(status_for_failed_jobs(3), Status::Warning);
        assert_eq!(status_for_failed_jobs(4), Status::Critical);
    }

    #[tokio::test]
    async fn test_classifies_jobs_in_window() {
        let now = Utc::now();
        let recent = (now - chrono::Duration::hours(2)).to_rfc3339();
        let stale = (now - chrono::Duration::hours(48)).to_rfc3339();
        let body = serde_json::json!({
            "jobs": [
                {"name": "a", "status": "Completed", "created_at": recent},
                {"name": "b", "display_name": "nightly-retrain", "status": "Failed",
                 "created_at": recent, "error": {"message": "OutOfMemoryError"}},
                {"name": "c", "status": "Running", "created_at": recent},
                {"name": "d", "status": "Failed", "created_at": stale},
                {"name": "e", "status": "Canceled"}
            ]
        })
        .to_string();
        let transport = Arc::new(FakeTransport::new(&body));

        let report = collector(transport.clone()).collect(&ctx()).await.unwrap();

        assert_eq!(report.status, Status::Warning);
        assert_eq!(report.metrics["total"], MetricValue::Int(4));
        assert_eq!(report.metrics["failed"], MetricValue::Int(1));
        assert_eq!(report.metrics["other"], MetricValue::Int(1));
        assert_eq!(report.findings[0], "Job 'nightly-retrain' failed: OutOfMemoryError");

        let request = &transport.requests()[0];
        assert_eq!(request.header("authorization"), Some("Bearer secret"));
    }

    #[tokio::test]
    async fn test_bare_array_is_accepted() {
        let body = r#"[{"name": "x", "status": "Completed"}]"#;
        let report = collector(Arc::new(FakeTransport::new(body)))
            .collect(&ctx())
            .await
            .unwrap();
        assert_eq!(report.status, Status::Healthy);
        assert!(report.findings.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_body_is_invalid_response() {
        let err = collector(Arc::new(FakeTransport::new("<html>login</html>")))
            .collect(&ctx())
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::InvalidResponse);
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_failure() {
        let transport = FakeTransport::with_error(TransportError::Http {
            status: 401,
            message: "expired token".into(),
        });
        let err = collector(Arc::new(transport)).collect(&ctx()).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Auth);
    }

    fn with_compute(transport: Arc<FakeTransport>) -> JobsCollector {
        JobsCollector::new(
            JobsSettings {
                url: "https://ml.example.com/jobs".into(),
                lookback_hours: 24,
                compute_url: Some("https://ml.example.com/compute".into()),
                request_timeout_secs: 30,
            },
            None,
            transport,
        )
    }

    #[tokio::test]
    async fn test_compute_clusters_are_summarized() {
        let jobs = r#"[{"name": "a", "status": "Completed"}]"#;
        let compute = r#"{"value": [
            {"name": "cpu-cluster", "type": "AmlCompute", "provisioningState": "Succeeded"},
            {"name": "gpu-cluster", "type": "AmlCompute", "provisioningState": "Failed"},
            {"name": "notebook"}
        ]}"#;
        let transport = Arc::new(FakeTransport::with_responses(vec![
            Ok(jobs.to_string()),
            Ok(compute.to_string()),
        ]));

        let report = with_compute(transport.clone()).collect(&ctx()).await.unwrap();

        assert_eq!(report.status, Status::Healthy);
        assert_eq!(report.metrics["compute_total"], MetricValue::Int(3));
        assert_eq!(report.metrics["compute_not_ready"], MetricValue::Int(2));
        assert_eq!(
            report.findings,
            vec![
                "Compute 'gpu-cluster' (AmlCompute) is Failed".to_string(),
                "Compute 'notebook' (Unknown) is Unknown".to_string()
            ]
        );
        assert_eq!(transport.requests()[1].url, "https://ml.example.com/compute");
    }

    #[tokio::test]
    async fn test_failed_compute_listing_keeps_the_source() {
        let jobs = r#"[{"name": "a", "status": "Failed"}]"#;
        let transport = Arc::new(FakeTransport::with_responses(vec![
            Ok(jobs.to_string()),
            Err(TransportError::Http {
                status: 403,
                message: "forbidden".into(),
            }),
        ]));

        let report = with_compute(transport).collect(&ctx()).await.unwrap();

        assert_eq!(report.status, Status::Warning);
        assert_eq!(report.metrics["compute_total"], MetricValue::Int(0));
        assert!(report
            .findings
            .iter()
            .any(|f| f.starts_with("Could not fetch compute list:")));
    }
}
