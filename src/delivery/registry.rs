//! Channel registry
//!
//! Maps a channel `kind` to a factory building the channel from its
//! configuration, like the collector registry does for sources.

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

use pulsecheck_core::{ChannelConfig, HttpTransport, ReqwestTransport};

use super::email::EmailChannel;
use super::file::FileChannel;
use super::webhook::WebhookChannel;
use super::Channel;

/// Channel registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelRegistryError {
    #[error("Channel '{channel_id}' has unknown kind '{kind}'")]
    UnknownKind { channel_id: String, kind: String },

    #[error("Invalid settings for channel '{channel_id}': {message}")]
    InvalidSettings { channel_id: String, message: String },
}

/// Shared dependencies handed to every channel factory
#[derive(Debug, Clone)]
pub struct ChannelEnv {
    pub transport: Arc<dyn HttpTransport>,
}

impl Default for ChannelEnv {
    fn default() -> Self {
        Self {
            transport: Arc::new(ReqwestTransport::new()),
        }
    }
}

impl ChannelEnv {
    pub fn with_transport(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

pub type ChannelFactory =
    fn(&ChannelConfig, &ChannelEnv) -> Result<Arc<dyn Channel>, ChannelRegistryError>;

/// Channel factories by kind
#[derive(Clone)]
pub struct ChannelRegistry {
    factories: BTreeMap<&'static str, ChannelFactory>,
    env: ChannelEnv,
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("kinds", &self.kinds())
            .field("env", &self.env)
            .finish()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::with_defaults(ChannelEnv::default())
    }
}

impl ChannelRegistry {
    pub fn new(env: ChannelEnv) -> Self {
        Self {
            factories: BTreeMap::new(),
            env,
        }
    }

    /// Create a registry with the webhook, email and file channels
    pub fn with_defaults(env: ChannelEnv) -> Self {
        let mut registry = Self::new(env);
        registry.register(WebhookChannel::KIND, |channel, env| {
            Ok(Arc::new(WebhookChannel::from_config(channel, env)?))
        });
        registry.register(EmailChannel::KIND, |channel, _| {
            Ok(Arc::new(EmailChannel::from_config(channel)?))
        });
        registry.register(FileChannel::KIND, |channel, _| {
            Ok(Arc::new(FileChannel::from_config(channel)?))
        });
        registry
    }

    pub fn register(&mut self, kind: &'static str, factory: ChannelFactory) {
        self.factories.insert(kind, factory);
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn build(&self, channel: &ChannelConfig) -> Result<Arc<dyn Channel>, ChannelRegistryError> {
        let factory = self
            .factories
            .get(channel.kind.as_str())
            .ok_or_else(|| ChannelRegistryError::UnknownKind {
                channel_id: channel.id.clone(),
                kind: channel.kind.clone(),
            })?;
        factory(channel, &self.env)
    }

    /// Build every channel, failing on the first bad one
    pub fn build_all(&self, channels: &[ChannelConfig]) -> Result<Vec<Arc<dyn Channel>>, ChannelRegistryError> {
        channels.iter().map(|channel| self.build(channel)).collect()
    }
}

/// Decode a channel's settings; absent settings decode from `{}`
pub fn parse_settings<T: DeserializeOwned>(channel: &ChannelConfig) -> Result<T, ChannelRegistryError> {
    let value = if channel.settings.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        channel.settings.clone()
    };
    serde_json::from_value(value).map_err(|e| ChannelRegistryError::InvalidSettings {
        channel_id: channel.id.clone(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsecheck_core::FakeTransport;
    use serde_json::json;
    use std::time::Duration;

    fn registry() -> ChannelRegistry {
        ChannelRegistry::with_defaults(ChannelEnv::with_transport(Arc::new(FakeTransport::new(""))))
    }

    #[test]
    fn test_default_kinds() {
        assert_eq!(registry().kinds(), vec!["email", "file", "webhook"]);
    }

    #[test]
    fn test_build_uses_kind_and_timeout() {
        let mut mail = ChannelConfig::new("ops_mail", "email");
        mail.timeout_secs = Some(5);
        mail.settings = json!({"recipients": ["ops@example.com"]});
        let channel = registry().build(&mail).unwrap();
        assert_eq!(channel.kind(), "email");
        assert_eq!(channel.id(), "ops_mail");
        assert_eq!(channel.timeout(), Duration::from_secs(5));

        let file = registry().build(&ChannelConfig::new("archive", "file")).unwrap();
        assert_eq!(file.timeout(), FileChannel::DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_unknown_kind_and_bad_settings() {
        assert!(matches!(
            registry().build(&ChannelConfig::new("x", "pager")),
            Err(ChannelRegistryError::UnknownKind { .. })
        ));
        // webhook needs a url
        assert!(matches!(
            registry().build(&ChannelConfig::new("teams", "webhook")),
            Err(ChannelRegistryError::InvalidSettings { .. })
        ));
    }
}
