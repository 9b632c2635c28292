//! Ticket-tracker collector
//!
//! Queries a Jira project through the REST search API: open high-priority
//! tickets, tickets resolved in the last 24 hours and tickets created in the
//! last 7 days. The three searches run concurrently.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use pulsecheck_core::transport::{bearer, header, Header};
use pulsecheck_core::{
    CollectContext, Collector, CollectorError, HttpTransport, SourceConfig, SourceReport, Status,
};

use crate::http::get_json;
use crate::registry::{parse_settings, CollectorEnv, RegistryError};

/// Settings for a `tickets` source
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TicketsSettings {
    /// Jira base URL, e.g. `https://example.atlassian.net`
    pub base_url: String,
    #[serde(default = "default_project_key")]
    pub project_key: String,
    #[serde(default = "default_priorities")]
    pub priorities: Vec<String>,
    /// Account e-mail for basic auth; bearer auth when absent
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_project_key() -> String {
    "MLPLAT".to_string()
}

fn default_priorities() -> Vec<String> {
    ["P1", "P2", "High", "Critical"].iter().map(|p| p.to_string()).collect()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    issues: Vec<Issue>,
}

impl SearchResponse {
    fn count(&self) -> usize {
        self.total.unwrap_or(self.issues.len())
    }
}

#[derive(Debug, Deserialize)]
struct Issue {
    key: String,
    #[serde(default)]
    fields: IssueFields,
}

#[derive(Debug, Default, Deserialize)]
struct IssueFields {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    priority: Option<Named>,
    #[serde(default)]
    status: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

impl Issue {
    fn priority(&self) -> &str {
        self.fields.priority.as_ref().map_or("Unknown", |p| p.name.as_str())
    }

    fn status(&self) -> &str {
        self.fields.status.as_ref().map_or("Unknown", |s| s.name.as_str())
    }
}

/// Any P1/Critical → critical; more than two P2/High → warning
pub fn status_for_priorities(counts: &BTreeMap<String, usize>) -> Status {
    let count = |names: &[&str]| -> usize {
        counts
            .iter()
            .filter(|(name, _)| names.iter().any(|n| n.eq_ignore_ascii_case(name)))
            .map(|(_, c)| c)
            .sum()
    };
    if count(&["P1", "Critical"]) > 0 {
        Status::Critical
    } else if count(&["P2", "High"]) > 2 {
        Status::Warning
    } else {
        Status::Healthy
    }
}

/// Ticket-tracker collector
#[derive(Debug)]
pub struct TicketsCollector {
    settings: TicketsSettings,
    search_url: String,
    token: Option<String>,
    transport: Arc<dyn HttpTransport>,
}

impl TicketsCollector {
    pub const KIND: &'static str = "tickets";

    pub fn new(
        settings: TicketsSettings,
        token: Option<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, String> {
        let search_url = format!("{}/rest/api/2/search", settings.base_url.trim_end_matches('/'));
        reqwest::Url::parse(&search_url).map_err(|e| format!("invalid base_url: {}", e))?;
        Ok(Self {
            settings,
            search_url,
            token,
            transport,
        })
    }

    pub fn from_config(source: &SourceConfig, env: &CollectorEnv) -> Result<Self, RegistryError> {
        Self::new(parse_settings(source)?, source.token.clone(), env.transport.clone()).map_err(
            |message| RegistryError::InvalidSettings {
                source_id: source.id.clone(),
                message,
            },
        )
    }

    fn auth_headers(&self) -> Vec<Header> {
        match (&self.settings.email, &self.token) {
            (Some(email), Some(token)) => {
                let credentials = BASE64.encode(format!("{}:{}", email, token));
                vec![header("Authorization", format!("Basic {}", credentials))]
            }
            (None, Some(token)) => vec![bearer(token)],
            _ => Vec::new(),
        }
    }

    fn open_jql(&self) -> String {
        let priorities = self.settings.priorities.join("\", \"");
        format!(
            "project = \"{}\" AND status != Done AND priority in (\"{}\") ORDER BY priority ASC, created DESC",
            self.settings.project_key, priorities
        )
    }

    fn resolved_jql(&self) -> String {
        format!(
            "project = \"{}\" AND status = Done AND resolved >= -24h ORDER BY resolved DESC",
            self.settings.project_key
        )
    }

    fn velocity_jql(&self) -> String {
        format!(
            "project = \"{}\" AND created >= -7d ORDER BY created DESC",
            self.settings.project_key
        )
    }

    async fn search(
        &self,
        jql: &str,
        max_results: u32,
        fields: &str,
        timeout: Duration,
    ) -> Result<SearchResponse, CollectorError> {
        let url = reqwest::Url::parse_with_params(
            &self.search_url,
            &[
                ("jql", jql.to_string()),
                ("maxResults", max_results.to_string()),
                ("fields", fields.to_string()),
            ],
        )
        .map_err(|e| CollectorError::internal(format!("Could not build search URL: {}", e)))?;
        debug!("Jira search: {}", jql);
        get_json(self.transport.as_ref(), url.as_str(), &self.auth_headers(), timeout).await
    }
}

#[async_trait]
impl Collector for TicketsCollector {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn collect(&self, ctx: &CollectContext) -> Result<SourceReport, CollectorError> {
        info!(source = %ctx.source_id, "Collecting ticket data...");
        let timeout = ctx.bounded(Duration::from_secs(self.settings.request_timeout_secs));

        let (open_jql, resolved_jql, velocity_jql) =
            (self.open_jql(), self.resolved_jql(), self.velocity_jql());
        let (open, resolved, velocity) = futures::try_join!(
            self.search(&open_jql, 50, "summary,status,priority,assignee,created,updated", timeout),
            self.search(&resolved_jql, 20, "summary,priority,resolutiondate", timeout),
            self.search(&velocity_jql, 200, "created,status", timeout),
        )?;

        let mut by_priority: BTreeMap<String, usize> = BTreeMap::new();
        for issue in &open.issues {
            *by_priority.entry(issue.priority().to_string()).or_default() += 1;
        }
        let status = status_for_priorities(&by_priority);

        let mut report = SourceReport::new(ctx.source_id.clone(), status, ctx.now())
            .with_metric("open_high_priority", open.issues.len())
            .with_metric("resolved_last_24h", resolved.count())
            .with_metric("created_last_7d", velocity.count());
        for (priority, count) in &by_priority {
            report = report.with_metric(format!("priority_{}", priority), *count);
        }
        for issue in &open.issues {
            report = report.with_finding(format!(
                "{} [{}] {} ({})",
                issue.key,
                issue.priority(),
                issue.fields.summary,
                issue.status()
            ));
        }
        if resolved.count() > 0 {
            report = report.with_finding(format!(
                "{} ticket(s) resolved in the last 24h",
                resolved.count()
            ));
        }
        Ok(report)
    }
}
