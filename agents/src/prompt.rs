//! Prompt construction
//!
//! The prompt is built strictly from snapshot fields. Findings are cut per
//! source so a chatty collector cannot blow up the request.

use serde::Serialize;
use std::collections::BTreeMap;

use pulsecheck_core::{HealthSnapshot, MetricValue, SourceOutcome, Status, StatusCounts};

use crate::generator::GenerationRequest;

/// System prompt for the health analysis
pub const SYSTEM_PROMPT: &str = r#"You are a platform health analyst for a machine-learning and data platform.
You receive a JSON snapshot of the latest health collection run and write a short, actionable report.

Respond ONLY with a JSON object, no preamble and no markdown, following this schema:
{
  "summary": "2-4 sentences in plain English describing platform health",
  "severity": "healthy|warning|critical",
  "actions": ["most important action first", "..."]
}

Rules:
- Be specific: use the job names, ticket keys, alert names and check names from the data
- Order actions by business impact
- A source with outcome "failure" could not be collected; say so, do not guess its state
- Never invent data that is not in the snapshot"#;

/// Per-source entry of the prompt payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourcePayload {
    pub source_id: String,
    pub required: bool,
    /// `report` or `failure`
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, MetricValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<String>,
    /// Findings left out of `findings`
    #[serde(skip_serializing_if = "is_zero")]
    pub omitted_findings: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Structured payload sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptPayload {
    pub run_id: String,
    pub generated_at: String,
    pub overall_status: Status,
    pub counts: StatusCounts,
    pub sources: Vec<SourcePayload>,
}

/// Build the payload from a snapshot, keeping at most `max_findings` per source
pub fn build_payload(snapshot: &HealthSnapshot, max_findings: usize) -> PromptPayload {
    let sources = snapshot
        .reports
        .iter()
        .map(|(source_id, outcome)| {
            let required = snapshot.is_required(source_id);
            match outcome {
                SourceOutcome::Report(report) => SourcePayload {
                    source_id: source_id.clone(),
                    required,
                    outcome: "report",
                    status: Some(report.status),
                    error_kind: None,
                    detail: None,
                    metrics: report.metrics.clone(),
                    findings: report.findings.iter().take(max_findings).cloned().collect(),
                    omitted_findings: report.findings.len().saturating_sub(max_findings),
                },
                SourceOutcome::Failure(failure) => SourcePayload {
                    source_id: source_id.clone(),
                    required,
                    outcome: "failure",
                    status: None,
                    error_kind: Some(failure.error_kind.to_string()),
                    detail: Some(failure.detail.clone()),
                    metrics: BTreeMap::new(),
                    findings: Vec::new(),
                    omitted_findings: 0,
                },
            }
        })
        .collect();

    PromptPayload {
        run_id: snapshot.run_id.to_string(),
        generated_at: snapshot.generated_at.to_rfc3339(),
        overall_status: snapshot.overall_status,
        counts: snapshot.status_counts(),
        sources,
    }
}

/// User prompt: a short orientation header followed by the JSON payload
pub fn render_prompt(payload: &PromptPayload) -> Result<String, serde_json::Error> {
    let data = serde_json::to_string_pretty(payload)?;
    let counts = &payload.counts;
    Ok(format!(
        "PLATFORM HEALTH SNAPSHOT\nCollected: {}\nOverall Status: {}\n\n\
         QUICK FACTS:\n- {} healthy, {} warning, {} critical, {} failed to collect\n\n\
         FULL DATA:\n{}",
        payload.generated_at,
        payload.overall_status.as_str().to_uppercase(),
        counts.healthy,
        counts.warning,
        counts.critical,
        counts.failed,
        data
    ))
}

/// Complete generation request for a snapshot
pub fn build_request(
    snapshot: &HealthSnapshot,
    max_findings: usize,
    max_tokens: u32,
) -> Result<GenerationRequest, serde_json::Error> {
    let prompt = render_prompt(&build_payload(snapshot, max_findings))?;
    Ok(GenerationRequest {
        system: SYSTEM_PROMPT.to_string(),
        prompt,
        max_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pulsecheck_core::{FailureKind, SourceFailure, SourceReport};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn snapshot() -> HealthSnapshot {
        let at = Utc.with_ymd_and_hms(2024, 12, 1, 8, 0, 0).unwrap();
        let mut chatty = SourceReport::new("shell", Status::Warning, at).with_metric("errors", 1i64);
        for i in 0..30 {
            chatty = chatty.with_finding(format!("check {} output", i));
        }
        let mut reports = BTreeMap::new();
        reports.insert("shell".to_string(), SourceOutcome::Report(chatty));
        reports.insert(
            "jobs".to_string(),
            SourceOutcome::Failure(SourceFailure {
                source_id: "jobs".into(),
                error_kind: FailureKind::Timeout,
                detail: "no result within 60s".into(),
                attempted_at: at,
            }),
        );
        let required: BTreeSet<String> = ["jobs".to_string()].into_iter().collect();
        HealthSnapshot::new(Uuid::new_v4(), at, reports, required)
    }

    #[test]
    fn test_payload_truncates_findings() {
        let payload = build_payload(&snapshot(), 5);
        let shell = payload.sources.iter().find(|s| s.source_id == "shell").unwrap();
        assert_eq!(shell.findings.len(), 5);
        assert_eq!(shell.omitted_findings, 25);
        assert_eq!(payload.overall_status, Status::Critical);
    }

    #[test]
    fn test_payload_describes_failures() {
        let payload = build_payload(&snapshot(), 5);
        let jobs = &payload.sources[0];
        assert_eq!(jobs.source_id, "jobs");
        assert!(jobs.required);
        assert_eq!(jobs.outcome, "failure");
        assert_eq!(jobs.error_kind.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_prompt_carries_header_and_json() {
        let request = build_request(&snapshot(), 5, 1000).unwrap();
        assert!(request.prompt.starts_with("PLATFORM HEALTH SNAPSHOT"));
        assert!(request.prompt.contains("Overall Status: CRITICAL"));
        assert!(request.prompt.contains("1 failed to collect"));
        assert!(request.prompt.contains("\"omitted_findings\": 25"));
        assert_eq!(request.system, SYSTEM_PROMPT);
    }
}
