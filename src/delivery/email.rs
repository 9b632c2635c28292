//! Email channel
//!
//! Builds a multipart/alternative message (plain text and HTML) and pipes it
//! to a sendmail-compatible command. A non-zero exit is a failed delivery.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use pulsecheck_core::process::run_command;
use pulsecheck_core::ChannelConfig;

use super::registry::{parse_settings, ChannelRegistryError};
use super::{Channel, DeliveryError, RenderedReport};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct EmailSettings {
    recipients: Vec<String>,
    from: String,
    command: PathBuf,
    args: Vec<String>,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            from: "pulsecheck@localhost".to_string(),
            command: PathBuf::from("/usr/sbin/sendmail"),
            args: vec!["-t".to_string(), "-i".to_string()],
        }
    }
}

/// Sendmail channel
#[derive(Debug, Clone)]
pub struct EmailChannel {
    id: String,
    from: String,
    recipients: Vec<String>,
    command: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl EmailChannel {
    pub const KIND: &'static str = "email";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a new email channel piping to `command` (with `-t -i`)
    pub fn new(
        id: impl Into<String>,
        from: impl Into<String>,
        recipients: Vec<String>,
        command: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            recipients,
            command: command.into(),
            args: EmailSettings::default().args,
            timeout,
        }
    }

    /// Replace the command arguments
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn from_config(channel: &ChannelConfig) -> Result<Self, ChannelRegistryError> {
        let settings: EmailSettings = parse_settings(channel)?;
        Ok(Self {
            id: channel.id.clone(),
            from: settings.from,
            recipients: settings.recipients,
            command: settings.command,
            args: settings.args,
            timeout: channel.timeout().unwrap_or(Self::DEFAULT_TIMEOUT),
        })
    }

    /// Full RFC 5322 message for `report`
    pub fn build_message(&self, report: &RenderedReport) -> String {
        let boundary = format!("pulsecheck-{}", Uuid::new_v4().simple());
        let mut message = String::new();
        message.push_str(&format!("From: {}\r\n", self.from));
        message.push_str(&format!("To: {}\r\n", self.recipients.join(", ")));
        message.push_str(&format!("Subject: {}\r\n", report.subject));
        message.push_str("MIME-Version: 1.0\r\n");
        message.push_str(&format!(
            "Content-Type: multipart/alternative; boundary=\"{}\"\r\n\r\n",
            boundary
        ));
        for (content_type, body) in [("text/plain", &report.text), ("text/html", &report.html)] {
            message.push_str(&format!("--{}\r\n", boundary));
            message.push_str(&format!("Content-Type: {}; charset=utf-8\r\n", content_type));
            message.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
            message.push_str(body);
            message.push_str("\r\n");
        }
        message.push_str(&format!("--{}--\r\n", boundary));
        message
    }
}

#[async_trait]
impl Channel for EmailChannel {
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
        if self.recipients.is_empty() {
            return Err(DeliveryError::NoRecipients);
        }

        let message = self.build_message(report);
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        let output = run_command(&self.command, &args, Some(message.as_bytes()), self.timeout).await?;

        if !output.success() {
            return Err(DeliveryError::CommandFailed {
                code: output.exit_code,
                output: output.combined(),
            });
        }
        debug!(
            channel = %self.id,
            recipients = self.recipients.len(),
            "Mail command finished in {}ms",
            output.duration_ms
        );
        Ok(())
    }
}
