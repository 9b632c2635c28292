//! Collector registry
//!
//! Maps a stable `kind` string to a factory that builds a collector from a
//! source's configuration. Resolved once at start-up; unknown kinds and bad
//! settings are configuration errors.

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use pulsecheck_core::{Collector, HttpTransport, ReqwestTransport, SourceBinding, SourceConfig};

use crate::alerts::AlertsCollector;
use crate::jobs::JobsCollector;
use crate::shell::ShellCollector;
use crate::synthetic::SyntheticCollector;
use crate::tickets::TicketsCollector;

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Source '{source_id}' has unknown collector kind '{kind}'")]
    UnknownKind { source_id: String, kind: String },

    #[error("Invalid settings for source '{source_id}': {message}")]
    InvalidSettings { source_id: String, message: String },
}

/// Shared dependencies handed to every factory
#[derive(Debug, Clone)]
pub struct CollectorEnv {
    pub transport: Arc<dyn HttpTransport>,
}

impl Default for CollectorEnv {
    fn default() -> Self {
        Self {
            transport: Arc::new(ReqwestTransport::new()),
        }
    }
}

impl CollectorEnv {
    pub fn with_transport(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

/// Builds one collector from its source configuration
pub type CollectorFactory =
    fn(&SourceConfig, &CollectorEnv) -> Result<Arc<dyn Collector>, RegistryError>;

/// Collector factories by kind
#[derive(Clone)]
pub struct CollectorRegistry {
    factories: BTreeMap<&'static str, CollectorFactory>,
    env: CollectorEnv,
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("kinds", &self.kinds())
            .field("env", &self.env)
            .finish()
    }
}

impl Default for CollectorRegistry {
    fn default() -> Self {
        Self::with_defaults(CollectorEnv::default())
    }
}

impl CollectorRegistry {
    /// Create an empty registry
    pub fn new(env: CollectorEnv) -> Self {
        Self {
            factories: BTreeMap::new(),
            env,
        }
    }

    /// Create a registry with every built-in collector kind
    pub fn with_defaults(env: CollectorEnv) -> Self {
        let mut registry = Self::new(env);
        registry.register(JobsCollector::KIND, |source, env| {
            Ok(Arc::new(JobsCollector::from_config(source, env)?))
        });
        registry.register(AlertsCollector::KIND, |source, env| {
            Ok(Arc::new(AlertsCollector::from_config(source, env)?))
        });
        registry.register(TicketsCollector::KIND, |source, env| {
            Ok(Arc::new(TicketsCollector::from_config(source, env)?))
        });
        registry.register(ShellCollector::KIND, |source, _| {
            Ok(Arc::new(ShellCollector::from_config(source)?))
        });
        registry.register(SyntheticCollector::KIND, |source, _| {
            Ok(Arc::new(SyntheticCollector::from_config(source)?))
        });
        registry
    }

    /// Register or replace a factory
    pub fn register(&mut self, kind: &'static str, factory: CollectorFactory) {
        debug!("Registered collector kind: {}", kind);
        self.factories.insert(kind, factory);
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Build a collector for `source`
    pub fn build(&self, source: &SourceConfig) -> Result<Arc<dyn Collector>, RegistryError> {
        let factory = self
            .factories
            .get(source.kind.as_str())
            .ok_or_else(|| RegistryError::UnknownKind {
                source_id: source.id.clone(),
                kind: source.kind.clone(),
            })?;
        factory(source, &self.env)
    }

    /// Build a binding for `source`, carrying its `required` flag and timeout
    pub fn bind(&self, source: &SourceConfig) -> Result<SourceBinding, RegistryError> {
        let mut binding =
            SourceBinding::new(source.id.clone(), self.build(source)?).required(source.required);
        if let Some(timeout) = source.timeout() {
            binding = binding.with_timeout(timeout);
        }
        Ok(binding)
    }

    /// Bind every source, failing on the first bad one
    pub fn bind_all(&self, sources: &[SourceConfig]) -> Result<Vec<SourceBinding>, RegistryError> {
        sources.iter().map(|source| self.bind(source)).collect()
    }
}

/// Decode a source's kind-specific settings; absent settings decode from `{}`
pub fn parse_settings<T: DeserializeOwned>(source: &SourceConfig) -> Result<T, RegistryError> {
    let value = if source.settings.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        source.settings.clone()
    };
    serde_json::from_value(value).map_err(|e| RegistryError::InvalidSettings {
        source_id: source.id.clone(),
        message: e.to_string(),
    })
}
