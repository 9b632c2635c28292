//! Run audit record
//!
//! The only artifact persisted by a run: snapshot, synthesis and delivery
//! results, written as pretty JSON named after the run id.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::model::{DeliveryResult, HealthSnapshot, Synthesis};

/// Audit persistence errors
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode audit record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Everything one run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub run_id: Uuid,
    pub snapshot: HealthSnapshot,
    pub synthesis: Synthesis,
    pub deliveries: Vec<DeliveryResult>,
}

impl AuditRecord {
    pub fn new(snapshot: HealthSnapshot, synthesis: Synthesis, deliveries: Vec<DeliveryResult>) -> Self {
        Self {
            run_id: snapshot.run_id,
            snapshot,
            synthesis,
            deliveries,
        }
    }

    /// File name for a run's record
    pub fn file_name_for(run_id: Uuid) -> String {
        format!("platform_health_{}.json", run_id)
    }

    pub fn file_name(&self) -> String {
        Self::file_name_for(self.run_id)
    }

    /// Write the record into `dir`, creating it if needed
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf, AuditError> {
        tokio::fs::create_dir_all(dir).await.map_err(|source| AuditError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(self.file_name());
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| AuditError::Io {
                path: path.clone(),
                source,
            })?;

        info!(run_id = %self.run_id, "Audit record saved to {:?}", path);
        Ok(path)
    }

    /// Read a record written by `write_to`
    pub async fn read_from(path: &Path) -> Result<Self, AuditError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| AuditError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{derive_overall_status, FailureKind, SourceFailure, SourceOutcome, SourceReport};
    use crate::status::Status;
    use chrono::{TimeZone, Utc};
    use std::collections::{BTreeMap, BTreeSet};

    fn record() -> AuditRecord {
        let at = Utc.with_ymd_and_hms(2024, 12, 1, 8, 0, 0).unwrap();
        let mut reports = BTreeMap::new();
        reports.insert(
            "jobs".to_string(),
            SourceOutcome::Report(
                SourceReport::new("jobs", Status::Warning, at)
                    .with_metric("failed", 2i64)
                    .with_finding("Job 'nightly' failed"),
            ),
        );
        reports.insert(
            "alerts".to_string(),
            SourceOutcome::Failure(SourceFailure {
                source_id: "alerts".into(),
                error_kind: FailureKind::Timeout,
                detail: "no result within 60s".into(),
                attempted_at: at,
            }),
        );
        let required: BTreeSet<String> = ["alerts".to_string()].into_iter().collect();
        let snapshot = HealthSnapshot::new(Uuid::new_v4(), at, reports, required);
        let synthesis = Synthesis {
            summary: "alerts is unavailable".into(),
            severity: snapshot.overall_status,
            actions: vec!["investigate alerts".into()],
            degraded: true,
        };
        AuditRecord::new(
            snapshot,
            synthesis,
            vec![
                DeliveryResult::sent("teams"),
                DeliveryResult::failed("email", "sendmail exited with 75"),
            ],
        )
    }

    #[tokio::test]
    async fn test_write_then_read_reproduces_overall_status() {
        let dir = tempfile::tempdir().unwrap();
        let record = record();
        let path = record.write_to(&dir.path().join("reports")).await.unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("platform_health_{}.json", record.run_id)
        );

        let loaded = AuditRecord::read_from(&path).await.unwrap();
        assert_eq!(loaded, record);
        assert_eq!(
            derive_overall_status(&loaded.snapshot.reports, &loaded.snapshot.required_sources),
            Status::Critical
        );
    }

    #[test]
    fn test_outcomes_are_tagged_in_json() {
        let value = serde_json::to_value(record()).unwrap();
        let reports = &value["snapshot"]["reports"];
        assert_eq!(reports["jobs"]["outcome"], "report");
        assert_eq!(reports["alerts"]["outcome"], "failure");
        assert_eq!(reports["alerts"]["error_kind"], "timeout");
        assert_eq!(value["deliveries"][1]["outcome"], "failed");
    }
}
