//! Report rendering
//!
//! Every channel delivers the same artifacts, rendered once per run: a
//! subject line, a plain text body, an HTML document and a MessageCard
//! payload for chat webhooks.

use serde_json::{json, Value as JsonValue};
use std::fmt::Write as _;

use pulsecheck_core::{HealthSnapshot, SourceOutcome, Status, Synthesis};

const TITLE: &str = "Platform Health Report";

/// Artifacts shared by all channels
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedReport {
    pub subject: String,
    pub text: String,
    pub html: String,
    /// MessageCard JSON for chat webhooks
    pub card: JsonValue,
    /// Suggested file name for the HTML document
    pub file_stem: String,
}

/// One line of the per-source table
#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceLine {
    source_id: String,
    label: String,
    color: &'static str,
    required: bool,
    detail: Option<String>,
}

fn status_color(status: Status) -> &'static str {
    match status {
        Status::Healthy => "#1a7a3a",
        Status::Warning => "#b45309",
        Status::Critical => "#991b1b",
    }
}

const FAILED_COLOR: &str = "#6b21a8";

/// Escape text for inclusion in HTML element content or attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn source_lines(snapshot: &HealthSnapshot) -> Vec<SourceLine> {
    snapshot
        .reports
        .iter()
        .map(|(id, outcome)| {
            let required = snapshot.is_required(id);
            match outcome {
                SourceOutcome::Report(report) => SourceLine {
                    source_id: id.clone(),
                    label: report.status.as_str().to_uppercase(),
                    color: status_color(report.status),
                    required,
                    detail: report.findings.first().cloned(),
                },
                SourceOutcome::Failure(failure) => SourceLine {
                    source_id: id.clone(),
                    label: format!("FAILED ({})", failure.error_kind.as_str()),
                    color: FAILED_COLOR,
                    required,
                    detail: Some(failure.detail.clone()),
                },
            }
        })
        .collect()
}

/// Render the artifacts for one run
pub fn render(snapshot: &HealthSnapshot, synthesis: &Synthesis) -> RenderedReport {
    let timestamp = snapshot.generated_at.format("%Y-%m-%d %H:%M UTC").to_string();
    let severity = synthesis.severity.as_str().to_uppercase();
    let lines = source_lines(snapshot);

    RenderedReport {
        subject: format!("[{}] {} - {}", severity, TITLE, timestamp),
        text: render_text(snapshot, synthesis, &lines, &timestamp),
        html: render_html(snapshot, synthesis, &lines, &timestamp),
        card: render_card(snapshot, synthesis, &lines, &timestamp),
        file_stem: format!("platform_health_{}", snapshot.run_id),
    }
}

fn render_text(
    snapshot: &HealthSnapshot,
    synthesis: &Synthesis,
    lines: &[SourceLine],
    timestamp: &str,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", TITLE);
    let _ = writeln!(out, "Status: {}", synthesis.severity.as_str().to_uppercase());
    let _ = writeln!(out, "Generated: {}", timestamp);
    let _ = writeln!(out, "Run: {}", snapshot.run_id);
    if synthesis.degraded {
        let _ = writeln!(out, "(automated analysis unavailable, rule-based summary)");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", synthesis.summary);
    let _ = writeln!(out);

    let _ = writeln!(out, "Sources:");
    for line in lines {
        let _ = write!(
            out,
            "  - {}{}: {}",
            line.source_id,
            if line.required { " (required)" } else { "" },
            line.label
        );
        match &line.detail {
            Some(detail) => {
                let _ = writeln!(out, " - {}", detail);
            }
            None => {
                let _ = writeln!(out);
            }
        }
    }

    if !synthesis.actions.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Recommended actions:");
        for (i, action) in synthesis.actions.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, action);
        }
    }
    out
}

fn render_html(
    snapshot: &HealthSnapshot,
    synthesis: &Synthesis,
    lines: &[SourceLine],
    timestamp: &str,
) -> String {
    let mut out = String::new();
    let severity = synthesis.severity.as_str().to_uppercase();

    let _ = writeln!(out, "<!DOCTYPE html>");
    let _ = writeln!(out, "<html lang=\"en\">");
    let _ = writeln!(out, "<head>");
    let _ = writeln!(out, "<meta charset=\"utf-8\">");
    let _ = writeln!(out, "<title>{} - {}</title>", TITLE, escape_html(&severity));
    let _ = writeln!(out, "</head>");
    let _ = writeln!(out, "<body style=\"font-family: sans-serif; max-width: 860px; margin: auto;\">");
    let _ = writeln!(
        out,
        "<h1 style=\"color: {};\">{}: {}</h1>",
        status_color(synthesis.severity),
        TITLE,
        escape_html(&severity)
    );
    let _ = writeln!(
        out,
        "<p><small>Generated {} &middot; run {}</small></p>",
        escape_html(timestamp),
        snapshot.run_id
    );
    if synthesis.degraded {
        let _ = writeln!(out, "<p><em>Automated analysis was unavailable; this summary is rule-based.</em></p>");
    }

    for paragraph in synthesis.summary.split("\n\n").filter(|p| !p.trim().is_empty()) {
        let _ = writeln!(out, "<p>{}</p>", escape_html(paragraph.trim()));
    }

    let _ = writeln!(out, "<h2>Sources</h2>");
    let _ = writeln!(out, "<table cellpadding=\"6\" style=\"border-collapse: collapse;\">");
    let _ = writeln!(out, "<tr><th align=\"left\">Source</th><th align=\"left\">Status</th><th align=\"left\">Detail</th></tr>");
    for line in lines {
        let _ = writeln!(
            out,
            "<tr><td>{}{}</td><td style=\"color: {}; font-weight: bold;\">{}</td><td>{}</td></tr>",
            escape_html(&line.source_id),
            if line.required { " <small>(required)</small>" } else { "" },
            line.color,
            escape_html(&line.label),
            escape_html(line.detail.as_deref().unwrap_or(""))
        );
    }
    let _ = writeln!(out, "</table>");

    if !synthesis.actions.is_empty() {
        let _ = writeln!(out, "<h2>Recommended actions</h2>");
        let _ = writeln!(out, "<ol>");
        for action in &synthesis.actions {
            let _ = writeln!(out, "<li>{}</li>", escape_html(action));
        }
        let _ = writeln!(out, "</ol>");
    }

    let _ = writeln!(out, "</body>");
    let _ = writeln!(out, "</html>");
    out
}

fn render_card(
    snapshot: &HealthSnapshot,
    synthesis: &Synthesis,
    lines: &[SourceLine],
    timestamp: &str,
) -> JsonValue {
    let severity = synthesis.severity.as_str().to_uppercase();
    let counts = snapshot.status_counts();

    let facts = json!([
        { "name": "Sources", "value": snapshot.reports.len().to_string() },
        { "name": "Healthy", "value": counts.healthy.to_string() },
        { "name": "Warning", "value": counts.warning.to_string() },
        { "name": "Critical", "value": counts.critical.to_string() },
        { "name": "Failed to collect", "value": counts.failed.to_string() },
    ]);

    let statuses = lines
        .iter()
        .map(|line| format!("{}: {}", line.source_id, line.label))
        .collect::<Vec<_>>()
        .join(" | ");

    let top_action = synthesis
        .actions
        .first()
        .map(String::as_str)
        .unwrap_or("No actions required");

    json!({
        "@type": "MessageCard",
        "@context": "https://schema.org/extensions",
        "themeColor": status_color(synthesis.severity).trim_start_matches('#'),
        "summary": format!("{} - {}", TITLE, severity),
        "sections": [
            {
                "activityTitle": TITLE,
                "activitySubtitle": format!("**{}** - {}", severity, timestamp),
                "activityText": synthesis.summary,
            },
            { "title": "Key Facts", "facts": facts },
            { "title": "Source Statuses", "text": statuses },
            { "title": "Top Action", "text": top_action },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pulsecheck_core::{FailureKind, SourceFailure, SourceReport};
    use std::collections::{BTreeMap, BTreeSet};
    use uuid::Uuid;

    fn snapshot() -> HealthSnapshot {
        let at = Utc.with_ymd_and_hms(2024, 12, 1, 8, 0, 0).unwrap();
        let mut reports = BTreeMap::new();
        reports.insert(
            "alerts".to_string(),
            SourceOutcome::Report(
                SourceReport::new("alerts", Status::Warning, at).with_finding("[Sev2] <disk> on db01"),
            ),
        );
        reports.insert(
            "jobs".to_string(),
            SourceOutcome::Failure(SourceFailure {
                source_id: "jobs".into(),
                error_kind: FailureKind::Timeout,
                detail: "no result within 60s".into(),
                attempted_at: at,
            }),
        );
        let required: BTreeSet<String> = ["jobs".to_string()].into();
        HealthSnapshot::new(Uuid::nil(), at, reports, required)
    }

    fn synthesis() -> Synthesis {
        Synthesis {
            summary: "Jobs did not report & alerts fired.".into(),
            severity: Status::Critical,
            actions: vec!["investigate jobs".into(), "investigate alerts".into()],
            degraded: true,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_subject_and_text() {
        let report = render(&snapshot(), &synthesis());
        assert_eq!(report.subject, "[CRITICAL] Platform Health Report - 2024-12-01 08:00 UTC");
        assert!(report.text.contains("jobs (required): FAILED (timeout) - no result within 60s"));
        assert!(report.text.contains("1. investigate jobs"));
        assert!(report.text.contains("rule-based summary"));
        assert_eq!(report.file_stem, format!("platform_health_{}", Uuid::nil()));
    }

    #[test]
    fn test_html_is_escaped() {
        let report = render(&snapshot(), &synthesis());
        assert!(report.html.contains("[Sev2] &lt;disk&gt; on db01"));
        assert!(report.html.contains("Jobs did not report &amp; alerts fired."));
        assert!(!report.html.contains("<disk>"));
    }

    #[test]
    fn test_card_carries_statuses_and_top_action() {
        let card = render(&snapshot(), &synthesis()).card;
        assert_eq!(card["@type"], "MessageCard");
        assert_eq!(card["themeColor"], "991b1b");
        let sections = card["sections"].as_array().unwrap();
        assert_eq!(sections[2]["text"], "alerts: WARNING | jobs: FAILED (timeout)");
        assert_eq!(sections[3]["text"], "investigate jobs");
        assert_eq!(sections[1]["facts"][4]["value"], "1");
    }
}
