//! File channel: writes the HTML report into a directory

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use pulsecheck_core::ChannelConfig;

use super::registry::{parse_settings, ChannelRegistryError};
use super::{Channel, DeliveryError, RenderedReport};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct FileSettings {
    directory: PathBuf,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./reports"),
        }
    }
}

/// HTML report file channel
#[derive(Debug, Clone)]
pub struct FileChannel {
    id: String,
    directory: PathBuf,
    timeout: Duration,
}

impl FileChannel {
    pub const KIND: &'static str = "file";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a new file channel writing into `directory`
    pub fn new(id: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            directory: directory.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(channel: &ChannelConfig) -> Result<Self, ChannelRegistryError> {
        let settings: FileSettings = parse_settings(channel)?;
        Ok(Self {
            id: channel.id.clone(),
            directory: settings.directory,
            timeout: channel.timeout().unwrap_or(Self::DEFAULT_TIMEOUT),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path the report for `report` is written to
    pub fn path_for(&self, report: &RenderedReport) -> PathBuf {
        self.directory.join(format!("{}.html", report.file_stem))
    }
}

#[async_trait]
impl Channel for FileChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn deliver(&self, report: &RenderedReport) -> Result<(), DeliveryError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|source| DeliveryError::Io {
                path: self.directory.clone(),
                source,
            })?;

        let path = self.path_for(report);
        tokio::fs::write(&path, &report.html)
            .await
            .map_err(|source| DeliveryError::Io {
                path: path.clone(),
                source,
            })?;

        info!(channel = %self.id, "Report saved: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report() -> RenderedReport {
        RenderedReport {
            subject: "s".into(),
            text: "t".into(),
            html: "<html>report</html>".into(),
            card: json!({}),
            file_stem: "platform_health_abc".into(),
        }
    }

    #[tokio::test]
    async fn test_writes_html_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileChannel::new("archive", dir.path().join("nested"));

        channel.deliver(&report()).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("nested/platform_health_abc.html")).unwrap();
        assert_eq!(written, "<html>report</html>");
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = FileChannel::new("archive", &blocker).deliver(&report()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Io { .. }));
    }
}
