//! Synthetic collector
//!
//! Returns a report described entirely by its settings. Used for dry runs
//! and the demo configuration, and handy for exercising failure paths.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use pulsecheck_core::{
    CollectContext, Collector, CollectorError, FailureKind, MetricValue, SourceConfig, SourceReport,
    Status,
};

use crate::registry::{parse_settings, RegistryError};

/// Settings for a `synthetic` source
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SyntheticSettings {
    pub status: Status,
    pub metrics: BTreeMap<String, MetricValue>,
    pub findings: Vec<String>,
    /// Simulated collection latency
    pub delay_ms: Option<u64>,
    /// Fail with this kind instead of reporting
    pub fail: Option<FailureKind>,
}

/// Synthetic collector
#[derive(Debug, Clone, Default)]
pub struct SyntheticCollector {
    settings: SyntheticSettings,
}

impl SyntheticCollector {
    pub const KIND: &'static str = "synthetic";

    pub fn new(settings: SyntheticSettings) -> Self {
        Self { settings }
    }

    pub fn from_config(source: &SourceConfig) -> Result<Self, RegistryError> {
        Ok(Self::new(parse_settings(source)?))
    }

    /// Stand-in for a real source during a dry run
    ///
    /// Keeps the settings of synthetic sources; any other source reports
    /// healthy with a single dry-run finding.
    pub fn dry_run(source: &SourceConfig) -> Self {
        if source.kind == Self::KIND {
            if let Ok(collector) = Self::from_config(source) {
                return collector;
            }
        }
        Self::new(SyntheticSettings {
            findings: vec![format!("Dry run: synthetic data in place of '{}' collector", source.kind)],
            ..SyntheticSettings::default()
        })
    }
}

#[async_trait]
impl Collector for SyntheticCollector {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn collect(&self, ctx: &CollectContext) -> Result<SourceReport, CollectorError> {
        if let Some(delay) = self.settings.delay_ms {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if let Some(kind) = self.settings.fail {
            return Err(CollectorError::new(kind, "synthetic failure"));
        }

        debug!(source = %ctx.source_id, "Synthetic report: {}", self.settings.status);
        let mut report = SourceReport::new(ctx.source_id.clone(), self.settings.status, ctx.now());
        report.metrics = self.settings.metrics.clone();
        report.findings = self.settings.findings.clone();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> CollectContext {
        CollectContext::with_budget("demo", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_reports_configured_values() {
        let mut source = SourceConfig::new("demo", "synthetic");
        source.settings = json!({
            "status": "warning",
            "metrics": {"failed": 2, "ratio": 0.5, "ok": false, "note": "x"},
            "findings": ["one"]
        });
        let report = SyntheticCollector::from_config(&source)
            .unwrap()
            .collect(&ctx())
            .await
            .unwrap();

        assert_eq!(report.status, Status::Warning);
        assert_eq!(report.metrics["failed"], MetricValue::Int(2));
        assert_eq!(report.metrics["ratio"], MetricValue::Float(0.5));
        assert_eq!(report.metrics["ok"], MetricValue::Bool(false));
        assert_eq!(report.findings, vec!["one".to_string()]);
    }

    #[tokio::test]
    async fn test_configured_failure() {
        let collector = SyntheticCollector::new(SyntheticSettings {
            fail: Some(FailureKind::Auth),
            ..SyntheticSettings::default()
        });
        let err = collector.collect(&ctx()).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Auth);
    }

    #[tokio::test]
    async fn test_dry_run_replaces_real_collectors() {
        let mut source = SourceConfig::new("azure_ml", "jobs");
        source.settings = json!({"url": "https://ml.example.com/jobs"});
        let report = SyntheticCollector::dry_run(&source).collect(&ctx()).await.unwrap();
        assert_eq!(report.status, Status::Healthy);
        assert!(report.findings[0].contains("'jobs'"));
    }
}
