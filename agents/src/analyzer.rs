//! Analyzer
//!
//! Turns a `HealthSnapshot` into a `Synthesis`. The generation backend is
//! called with bounded retries; anything it cannot deliver ends in the
//! rule-based fallback. The snapshot's own overall status is ground truth:
//! a generated severity may raise it but never lower it.

use tracing::{info, warn};

use pulsecheck_core::{AnalyzerSettings, HealthSnapshot, Synthesis};

use crate::fallback::fallback_synthesis;
use crate::generator::{GenerationError, Generator};
use crate::prompt::build_request;
use crate::response::{parse_synthesis, GeneratedSynthesis, SchemaError};
use crate::retry::RetryPolicy;

/// Why one attempt did not produce a synthesis
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    InvalidSchema(#[from] SchemaError),
}

impl AttemptError {
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptError::Generation(e) => e.kind(),
            AttemptError::InvalidSchema(_) => "invalid_schema",
        }
    }

    /// Unusable answer, as opposed to no answer
    fn is_bad_answer(&self) -> bool {
        matches!(
            self,
            AttemptError::InvalidSchema(_)
                | AttemptError::Generation(GenerationError::InvalidResponse(_))
        )
    }
}

/// Health analyzer
#[derive(Debug, Clone)]
pub struct Analyzer {
    policy: RetryPolicy,
    max_findings_per_source: usize,
    max_tokens: u32,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::from_settings(&AnalyzerSettings::default())
    }
}

impl Analyzer {
    /// Create a new analyzer
    pub fn new(policy: RetryPolicy, max_findings_per_source: usize, max_tokens: u32) -> Self {
        Self {
            policy,
            max_findings_per_source,
            max_tokens,
        }
    }

    pub fn from_settings(settings: &AnalyzerSettings) -> Self {
        Self::new(
            RetryPolicy::from_settings(settings),
            settings.max_findings_per_source,
            settings.max_tokens,
        )
    }

    /// Produce a synthesis for `snapshot`
    ///
    /// Never fails: without a backend, or when the backend errors
    /// permanently or keeps failing, the rule-based fallback is returned.
    pub async fn analyze(&self, snapshot: &HealthSnapshot, generator: Option<&dyn Generator>) -> Synthesis {
        let Some(generator) = generator else {
            info!("No generation backend configured; using rule-based synthesis");
            return fallback_synthesis(snapshot, "no generation backend configured");
        };

        let request = match build_request(snapshot, self.max_findings_per_source, self.max_tokens) {
            Ok(request) => request,
            Err(e) => {
                warn!("Could not encode snapshot for analysis: {}", e);
                return fallback_synthesis(snapshot, "snapshot could not be encoded");
            }
        };

        info!(
            provider = generator.provider_name(),
            "Sending snapshot for analysis..."
        );

        let mut bad_answer_retried = false;
        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let outcome = match generator.generate(&request).await {
                Ok(raw) => parse_synthesis(&raw).map_err(AttemptError::from),
                Err(e) => Err(AttemptError::from(e)),
            };

            let err = match outcome {
                Ok(generated) => {
                    let synthesis = reconcile(snapshot, generated);
                    info!(
                        attempt,
                        "Analysis complete. Severity: {}",
                        synthesis.severity.as_str().to_uppercase()
                    );
                    return synthesis;
                }
                Err(err) => err,
            };

            let retryable = match &err {
                e if e.is_bad_answer() => !std::mem::replace(&mut bad_answer_retried, true),
                AttemptError::Generation(e) => e.is_transient(),
                AttemptError::InvalidSchema(_) => false,
            };

            if !retryable {
                warn!(attempt, kind = err.kind(), "Analysis failed permanently: {}", err);
                return fallback_synthesis(snapshot, &format!("{} error from backend", err.kind()));
            }
            if attempt == max_attempts {
                warn!(attempt, kind = err.kind(), "Analysis attempts exhausted: {}", err);
                return fallback_synthesis(
                    snapshot,
                    &format!("{} after {} attempts", err.kind(), max_attempts),
                );
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                attempt,
                kind = err.kind(),
                "Analysis attempt failed, retrying in {:?}: {}",
                delay,
                err
            );
            tokio::time::sleep(delay).await;
        }

        fallback_synthesis(snapshot, "no attempts made")
    }
}

/// Apply the snapshot's overall status as a floor on the generated severity
pub fn reconcile(snapshot: &HealthSnapshot, generated: GeneratedSynthesis) -> Synthesis {
    let mut summary = generated.summary;
    let mut severity = generated.severity;

    if severity < snapshot.overall_status {
        warn!(
            "Backend severity {} is below collected status {}; overriding",
            severity, snapshot.overall_status
        );
        summary.push_str(&format!(
            " [Note: severity raised from {} to {} to match the collected source statuses.]",
            severity, snapshot.overall_status
        ));
        severity = snapshot.overall_status;
    }

    Synthesis {
        summary,
        severity,
        actions: generated.actions,
        degraded: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsecheck_core::Status;
    use std::collections::{BTreeMap, BTreeSet};
    use uuid::Uuid;

    fn empty_snapshot(with_required_failure: bool) -> HealthSnapshot {
        let mut reports = BTreeMap::new();
        let mut required = BTreeSet::new();
        let at = chrono::Utc::now();
        if with_required_failure {
            reports.insert(
                "jobs".to_string(),
                pulsecheck_core::SourceOutcome::Failure(pulsecheck_core::SourceFailure {
                    source_id: "jobs".into(),
                    error_kind: pulsecheck_core::FailureKind::Unreachable,
                    detail: "refused".into(),
                    attempted_at: at,
                }),
            );
            required.insert("jobs".to_string());
        }
        HealthSnapshot::new(Uuid::new_v4(), at, reports, required)
    }

    #[test]
    fn test_reconcile_raises_but_never_lowers() {
        let critical = empty_snapshot(true);
        let lowered = reconcile(
            &critical,
            GeneratedSynthesis {
                summary: "Fine.".into(),
                severity: Status::Healthy,
                actions: vec![],
            },
        );
        assert_eq!(lowered.severity, Status::Critical);
        assert!(lowered.summary.starts_with("Fine. [Note: severity raised from healthy to critical"));
        assert!(!lowered.degraded);

        let healthy = empty_snapshot(false);
        let raised = reconcile(
            &healthy,
            GeneratedSynthesis {
                summary: "Watch the queue.".into(),
                severity: Status::Warning,
                actions: vec!["check queue".into()],
            },
        );
        assert_eq!(raised.severity, Status::Warning);
        assert_eq!(raised.summary, "Watch the queue.");
    }

    #[tokio::test]
    async fn test_no_backend_goes_straight_to_fallback() {
        let synthesis = Analyzer::default().analyze(&empty_snapshot(true), None).await;
        assert!(synthesis.degraded);
        assert_eq!(synthesis.severity, Status::Critical);
        assert_eq!(synthesis.actions, vec!["investigate jobs"]);
    }
}
