//! Webhook channel
//!
//! POSTs the MessageCard payload to a chat webhook URL.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use pulsecheck_core::{ChannelConfig, HttpTransport};

use super::registry::{parse_settings, ChannelEnv, ChannelRegistryError};
use super::{Channel, DeliveryError, RenderedReport};

#[derive(Debug, Clone, Deserialize)]
struct WebhookSettings {
    url: String,
}

/// Chat webhook channel
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    id: String,
    url: String,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
}

impl WebhookChannel {
    pub const KIND: &'static str = "webhook";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a new webhook channel
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            timeout,
            transport,
        }
    }

    pub fn from_config(channel: &ChannelConfig, env: &ChannelEnv) -> Result<Self, ChannelRegistryError> {
        let settings: WebhookSettings = parse_settings(channel)?;
        if !(settings.url.starts_with("https://") || settings.url.starts_with("http://")) {
            return Err(ChannelRegistryError::InvalidSettings {
                channel_id: channel.id.clone(),
                message: format!("webhook url must be http(s): {}", settings.url),
            });
        }
        Ok(Self::new(
            channel.id.clone(),
            settings.url,
            channel.timeout().unwrap_or(Self::DEFAULT_TIMEOUT),
            env.transport.clone(),
        ))
    }
}

#[async_trait]
impl Channel for WebhookChannel {
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
        let body = serde_json::to_string(&report.card)?;
        let response = self
            .transport
            .post_json(&self.url, &[], &body, self.timeout)
            .await?;
        debug!(channel = %self.id, "Webhook answered: {}", response.trim());
        Ok(())
    }
}
