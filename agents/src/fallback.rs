//! Rule-based synthesis
//!
//! Deterministic synthesis used when no backend is configured or the
//! backend could not produce a valid answer. Severity is the snapshot's own
//! overall status; every non-healthy source gets an "investigate" action.

use pulsecheck_core::{HealthSnapshot, SourceConcern, Synthesis};

/// Build the fallback synthesis for `snapshot`
///
/// `reason` says why the backend was not used and is carried in the summary.
pub fn fallback_synthesis(snapshot: &HealthSnapshot, reason: &str) -> Synthesis {
    let concerns = snapshot.concerns();

    let failed: Vec<String> = concerns
        .iter()
        .filter(|c| c.outcome.is_failure())
        .map(SourceConcern::describe)
        .collect();
    let degraded: Vec<String> = concerns
        .iter()
        .filter(|c| !c.outcome.is_failure())
        .map(SourceConcern::describe)
        .collect();

    let mut summary = format!(
        "Overall platform status is {} across {} source(s).",
        snapshot.overall_status.as_str().to_uppercase(),
        snapshot.reports.len()
    );
    if !failed.is_empty() {
        summary.push_str(&format!(" Failed to collect: {}.", failed.join(", ")));
    }
    if !degraded.is_empty() {
        summary.push_str(&format!(" Degraded: {}.", degraded.join(", ")));
    }
    if concerns.is_empty() {
        summary.push_str(" All sources report healthy.");
    }
    summary.push_str(&format!(
        " Automated analysis was unavailable ({}); this summary was generated from the collected statuses.",
        reason
    ));

    Synthesis {
        summary,
        severity: snapshot.overall_status,
        actions: concerns
            .iter()
            .map(|c| format!("investigate {}", c.source_id))
            .collect(),
        degraded: true,
    }
}
