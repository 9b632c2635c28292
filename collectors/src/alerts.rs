//! Metrics/alerting collector
//!
//! Reads the alerts fired in the recent window and grades them by severity:
//! Sev0, Sev1 and Critical are critical; Sev2, Sev3 and Warning are warnings;
//! anything else is informational.
//!
//! An optional resource-health endpoint adds Critical/Error/Warning activity
//! event counts grouped by resource. They are reported as metrics and the
//! busiest resources as findings; they do not change the grade, and a failed
//! query is only noted.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use pulsecheck_core::{
    CollectContext, Collector, CollectorError, HttpTransport, SourceConfig, SourceReport, Status,
};

use crate::http::{get_json, token_headers};
use crate::registry::{parse_settings, CollectorEnv, RegistryError};

/// Findings kept per run
const MAX_ALERT_FINDINGS: usize = 50;

/// Resource-health groups listed as findings
const MAX_HEALTH_FINDINGS: usize = 5;

/// Settings for an `alerts` source
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlertsSettings {
    /// Endpoint returning fired alerts
    pub url: String,
    /// Optional endpoint returning activity events grouped by resource
    #[serde(default)]
    pub resource_health_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
struct Alert {
    #[serde(alias = "alertName", alias = "alert_rule", alias = "alertRule")]
    name: String,
    #[serde(default)]
    severity: String,
    #[serde(default, alias = "targetResource", alias = "target_resource")]
    target: Option<String>,
    #[serde(default, alias = "alertState")]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AlertList {
    Bare(Vec<Alert>),
    Wrapped {
        #[serde(alias = "value")]
        alerts: Vec<Alert>,
    },
}

impl AlertList {
    fn into_alerts(self) -> Vec<Alert> {
        match self {
            AlertList::Bare(alerts) | AlertList::Wrapped { alerts } => alerts,
        }
    }
}

/// Activity events of one level for one resource and operation
#[derive(Debug, Clone, Deserialize)]
struct HealthEvent {
    #[serde(default, alias = "ResourceGroup", alias = "resourceGroup")]
    resource_group: Option<String>,
    #[serde(alias = "ResourceId", alias = "resourceId", alias = "resource")]
    resource_id: String,
    #[serde(default, alias = "OperationName", alias = "operationName")]
    operation_name: Option<String>,
    #[serde(alias = "Level")]
    level: String,
    #[serde(alias = "EventCount", alias = "eventCount", alias = "count")]
    event_count: u64,
}

impl HealthEvent {
    fn describe(&self) -> String {
        let mut text = format!("[{}] {}", self.level, self.resource_id);
        if let Some(group) = &self.resource_group {
            text.push_str(&format!(" ({})", group));
        }
        if let Some(operation) = &self.operation_name {
            text.push_str(&format!(" {}", operation));
        }
        text.push_str(&format!(": {} event(s)", self.event_count));
        text
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HealthEventList {
    Bare(Vec<HealthEvent>),
    Wrapped {
        #[serde(alias = "value", alias = "rows")]
        events: Vec<HealthEvent>,
    },
}

impl HealthEventList {
    fn into_events(self) -> Vec<HealthEvent> {
        match self {
            HealthEventList::Bare(events) | HealthEventList::Wrapped { events } => events,
        }
    }
}

/// Severity grade of one alert, `None` when informational
pub fn alert_status(severity: &str) -> Option<Status> {
    match severity.trim().to_ascii_lowercase().as_str() {
        "sev0" | "sev1" | "critical" => Some(Status::Critical),
        "sev2" | "sev3" | "warning" => Some(Status::Warning),
        _ => None,
    }
}

/// Metrics/alerting collector
#[derive(Debug)]
pub struct AlertsCollector {
    settings: AlertsSettings,
    token: Option<String>,
    transport: Arc<dyn HttpTransport>,
}

impl AlertsCollector {
    pub const KIND: &'static str = "alerts";

    pub fn new(settings: AlertsSettings, token: Option<String>, transport: Arc<dyn HttpTransport>) -> Self {
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

    async fn resource_health(&self, url: &str, timeout: Duration) -> Result<Vec<HealthEvent>, CollectorError> {
        let list: HealthEventList = get_json(
            self.transport.as_ref(),
            url,
            &token_headers(self.token.as_deref()),
            timeout,
        )
        .await?;
        let mut events = list.into_events();
        events.sort_by(|a, b| b.event_count.cmp(&a.event_count));
        Ok(events)
    }
}

fn add_resource_health(mut report: SourceReport, events: &[HealthEvent]) -> SourceReport {
    let level_total = |level: &str| -> u64 {
        events
            .iter()
            .filter(|e| e.level.eq_ignore_ascii_case(level))
            .map(|e| e.event_count)
            .sum()
    };
    report = report
        .with_metric("resource_events", events.iter().map(|e| e.event_count).sum::<u64>() as i64)
        .with_metric("resource_critical_events", level_total("critical") as i64)
        .with_metric("resource_error_events", level_total("error") as i64)
        .with_metric("resource_warning_events", level_total("warning") as i64);
    for event in events.iter().take(MAX_HEALTH_FINDINGS) {
        report = report.with_finding(event.describe());
    }
    report
}

#[async_trait]
impl Collector for AlertsCollector {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn collect(&self, ctx: &CollectContext) -> Result<SourceReport, CollectorError> {
        info!(source = %ctx.source_id, "Collecting alerting data...");
        let timeout = ctx.bounded(Duration::from_secs(self.settings.request_timeout_secs));
        let alerts = get_json::<AlertList>(
            self.transport.as_ref(),
            &self.settings.url,
            &token_headers(self.token.as_deref()),
            timeout,
        )
        .await?
        .into_alerts();

        let mut critical = Vec::new();
        let mut warnings = Vec::new();
        for alert in &alerts {
            match alert_status(&alert.severity) {
                Some(Status::Critical) => critical.push(alert),
                Some(Status::Warning) => warnings.push(alert),
                _ => {}
            }
        }

        let status = if !critical.is_empty() {
            Status::Critical
        } else if !warnings.is_empty() {
            Status::Warning
        } else {
            Status::Healthy
        };

        let mut report = SourceReport::new(ctx.source_id.clone(), status, ctx.now())
            .with_metric("total_alerts", alerts.len())
            .with_metric("critical", critical.len())
            .with_metric("warnings", warnings.len());
        for alert in critical.iter().chain(warnings.iter()).take(MAX_ALERT_FINDINGS) {
            let mut finding = format!("[{}] {}", alert.severity, alert.name);
            if let Some(target) = &alert.target {
                finding.push_str(&format!(" on {}", target));
            }
            if let Some(state) = &alert.state {
                finding.push_str(&format!(" ({})", state));
            }
            report = report.with_finding(finding);
        }

        if let Some(url) = &self.settings.resource_health_url {
            match self.resource_health(url, timeout).await {
                Ok(events) => report = add_resource_health(report, &events),
                Err(e) => {
                    warn!(source = %ctx.source_id, "Resource health query failed: {}", e);
                    report = report.with_finding(format!("Resource health unavailable: {}", e.detail));
                }
            }
        }
        Ok(report)
    }
}
