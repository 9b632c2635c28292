//! Configuration Management Module
//!
//! Loads the run configuration from a TOML, JSON or YAML file (chosen by
//! extension), applies `PULSECHECK_*` environment overrides and validates
//! the result before anything runs.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "PULSECHECK";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to parse {format} config: {message}")]
    Parse { format: ConfigFormat, message: String },

    #[error("Failed to serialize {format} config: {message}")]
    Serialize { format: ConfigFormat, message: String },

    #[error("No sources configured")]
    NoSources,

    #[error("Source or channel with an empty id")]
    EmptyId,

    #[error("Source configured more than once: {0}")]
    DuplicateSource(String),

    #[error("Channel configured more than once: {0}")]
    DuplicateChannel(String),

    #[error("Source '{source_id}' has unknown collector kind '{kind}'")]
    UnknownCollector { source_id: String, kind: String },

    #[error("Channel '{channel_id}' has unknown channel kind '{kind}'")]
    UnknownChannel { channel_id: String, kind: String },

    #[error("Timeout must be greater than zero: {0}")]
    ZeroTimeout(String),

    #[error("Invalid schedule time '{0}', expected HH:MM")]
    InvalidScheduleTime(String),
}

/// Configuration file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Format for a path, by extension; `toml` when there is none
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            None => Ok(ConfigFormat::Toml),
            Some(ext) => ext.parse(),
        }
    }
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Json => "JSON",
            ConfigFormat::Yaml => "YAML",
        })
    }
}

impl std::str::FromStr for ConfigFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            _ => Err(ConfigError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub run: RunSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub analyzer: AnalyzerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// Timeouts and output location for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub per_source_timeout_secs: u64,
    pub overall_timeout_secs: u64,
    /// Directory for audit records and file-channel reports
    pub report_dir: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            per_source_timeout_secs: 60,
            overall_timeout_secs: 180,
            report_dir: PathBuf::from("./reports"),
        }
    }
}

impl RunSettings {
    pub fn per_source_timeout(&self) -> Duration {
        Duration::from_secs(self.per_source_timeout_secs)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.overall_timeout_secs)
    }
}

/// Daily trigger time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Local time, `HH:MM`
    pub time: String,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            time: "08:00".to_string(),
        }
    }
}

impl ScheduleSettings {
    pub fn parse_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(self.time.trim(), "%H:%M")
            .map_err(|_| ConfigError::InvalidScheduleTime(self.time.clone()))
    }
}

/// Generation backend and retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    /// `anthropic` or `none`
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
    pub backoff_cap_secs: u64,
    /// Findings kept per source in the prompt payload
    pub max_findings_per_source: usize,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-3-5-sonnet-latest".to_string(),
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 1500,
            request_timeout_secs: 60,
            max_attempts: 3,
            backoff_base_secs: 2,
            backoff_cap_secs: 30,
            max_findings_per_source: 20,
        }
    }
}

impl AnalyzerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Directory for the log file; no file logging when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    pub file: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: Some(PathBuf::from("logs")),
            file: "pulsecheck.log".to_string(),
            json: false,
        }
    }
}

/// One configured data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    /// Collector kind in the registry
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Credential passed through to the collector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Kind-specific settings, opaque here
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub settings: Value,
}

impl SourceConfig {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            required: false,
            timeout_secs: None,
            token: None,
            settings: Value::Null,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Name of the variable overriding this source's token
    pub fn token_env_var(&self) -> String {
        let id: String = self
            .id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_{}_TOKEN", ENV_PREFIX, id)
    }
}

/// One configured delivery channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: String,
    /// `webhook`, `email` or `file`
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub settings: Value,
}

impl ChannelConfig {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            timeout_secs: None,
            settings: Value::Null,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl AppConfig {
    /// Built-in configuration of four synthetic sources and a file channel
    pub fn demo() -> Self {
        let mut jobs = SourceConfig::new("ml_jobs", "synthetic");
        jobs.required = true;
        jobs.settings = json!({
            "status": "warning",
            "metrics": {"total_jobs": 42, "completed": 38, "failed": 2, "running": 2},
            "findings": [
                "Job 'nightly-retrain' failed: OutOfMemoryError on compute cluster gpu-a100",
                "Job 'feature-backfill' failed: upstream table not found"
            ]
        });

        let mut alerts = SourceConfig::new("monitor_alerts", "synthetic");
        alerts.required = true;
        alerts.settings = json!({
            "status": "healthy",
            "metrics": {"total_alerts": 1, "critical": 0, "warnings": 0},
            "findings": ["[Sev4] Disk latency above baseline on scoring endpoint"]
        });

        let mut tickets = SourceConfig::new("jira", "synthetic");
        tickets.settings = json!({
            "status": "warning",
            "metrics": {"open_high_priority": 3, "resolved_last_24h": 4, "created_last_7d": 11},
            "findings": [
                "MLPLAT-101 [P2] Feature store latency regression",
                "MLPLAT-107 [P2] Model registry sync intermittently fails",
                "MLPLAT-112 [High] GPU quota exhausted in staging"
            ]
        });

        let mut shell = SourceConfig::new("shell_checks", "synthetic");
        shell.settings = json!({
            "status": "healthy",
            "metrics": {"scripts_run": 2, "disk_max_percent": 71},
            "findings": ["All shell checks passed"]
        });

        let mut report_file = ChannelConfig::new("report_file", "file");
        report_file.settings = json!({"directory": "./reports"});

        Self {
            sources: vec![jobs, alerts, tickets, shell],
            channels: vec![report_file],
            ..Self::default()
        }
    }

    /// Check the configuration against the registered collector and channel kinds
    pub fn validate(&self, known_collectors: &[&str], known_channels: &[&str]) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        if self.run.per_source_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("run.per_source_timeout_secs".into()));
        }
        if self.run.overall_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("run.overall_timeout_secs".into()));
        }
        if self.analyzer.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("analyzer.request_timeout_secs".into()));
        }
        self.schedule.parse_time()?;

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(ConfigError::EmptyId);
            }
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigError::DuplicateSource(source.id.clone()));
            }
            if !known_collectors.contains(&source.kind.as_str()) {
                return Err(ConfigError::UnknownCollector {
                    source_id: source.id.clone(),
                    kind: source.kind.clone(),
                });
            }
            if source.timeout_secs == Some(0) {
                return Err(ConfigError::ZeroTimeout(format!("sources.{}.timeout_secs", source.id)));
            }
        }

        let mut seen = HashSet::new();
        for channel in &self.channels {
            if channel.id.trim().is_empty() {
                return Err(ConfigError::EmptyId);
            }
            if !seen.insert(channel.id.as_str()) {
                return Err(ConfigError::DuplicateChannel(channel.id.clone()));
            }
            if !known_channels.contains(&channel.kind.as_str()) {
                return Err(ConfigError::UnknownChannel {
                    channel_id: channel.id.clone(),
                    kind: channel.kind.clone(),
                });
            }
            if channel.timeout_secs == Some(0) {
                return Err(ConfigError::ZeroTimeout(format!("channels.{}.timeout_secs", channel.id)));
            }
        }
        Ok(())
    }

    /// Apply `PULSECHECK_*` overrides read through `lookup`
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}_{}", ENV_PREFIX, name));

        if let Some(api_key) = var("ANTHROPIC_API_KEY") {
            self.analyzer.api_key = Some(api_key);
            debug!("Applied env override for analyzer API key");
        }
        if let Some(model) = var("MODEL") {
            self.analyzer.model = model;
            debug!("Applied env override for analyzer model");
        }
        if let Some(base_url) = var("BASE_URL") {
            self.analyzer.base_url = base_url;
            debug!("Applied env override for analyzer base URL");
        }
        if let Some(report_dir) = var("REPORT_DIR") {
            self.run.report_dir = PathBuf::from(report_dir);
            debug!("Applied env override for report directory");
        }
        if let Some(log_level) = var("LOG_LEVEL") {
            self.logging.level = log_level;
            debug!("Applied env override for log level");
        }
        if let Some(time) = var("SCHEDULE_TIME") {
            self.schedule.time = time;
            debug!("Applied env override for schedule time");
        }

        for source in &mut self.sources {
            if let Some(token) = lookup(&source.token_env_var()) {
                source.token = Some(token);
                debug!("Applied env override for {} token", source.id);
            }
        }
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_with(|name| std::env::var(name).ok());
    }

    /// Parse a configuration document
    pub fn from_str_with_format(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let parse_err = |message: String| ConfigError::Parse { format, message };
        match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string())),
        }
    }

    /// Render as a configuration document
    pub fn to_string_with_format(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        let ser_err = |message: String| ConfigError::Serialize { format, message };
        match format {
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| ser_err(e.to_string())),
            ConfigFormat::Json => serde_json::to_string_pretty(self).map_err(|e| ser_err(e.to_string())),
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(|e| ser_err(e.to_string())),
        }
    }
}

/// Configuration manager
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
    config_format: ConfigFormat,
    config: AppConfig,
}

impl ConfigManager {
    /// Default config file: `<config_dir>/pulsecheck/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("pulsecheck").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load `path` and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut manager = Self::load_without_env(path)?;
        manager.config.apply_env_overrides();
        Ok(manager)
    }

    /// Load `path` as written, without environment overrides
    pub fn load_without_env(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let config_format = ConfigFormat::from_path(&config_path)?;

        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path));
        }
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
            path: config_path.clone(),
            source,
        })?;
        let config = AppConfig::from_str_with_format(&content, config_format)?;

        info!("Loaded configuration from {:?}", config_path);
        Ok(Self {
            config_path,
            config_format,
            config,
        })
    }

    /// Wrap an in-memory configuration that will be saved to `path`
    pub fn with_config(path: impl AsRef<Path>, config: AppConfig) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let config_format = ConfigFormat::from_path(&config_path)?;
        Ok(Self {
            config_path,
            config_format,
            config,
        })
    }

    /// Check if configuration file exists
    pub fn config_exists(&self) -> bool {
        self.config_path.exists()
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let content = self.config.to_string_with_format(self.config_format)?;
        fs::write(&self.config_path, content).map_err(|source| ConfigError::Io {
            path: self.config_path.clone(),
            source,
        })?;

        info!("Saved configuration to {:?}", self.config_path);
        Ok(())
    }

    /// Get the current configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get mutable configuration
    pub fn config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn into_config(self) -> AppConfig {
        self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn config_format(&self) -> ConfigFormat {
        self.config_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    const COLLECTORS: &[&str] = &["jobs", "alerts", "tickets", "shell", "synthetic"];
    const CHANNELS: &[&str] = &["webhook", "email", "file"];

    #[test]
    fn test_config_format_from_str() {
        assert_eq!("toml".parse::<ConfigFormat>().unwrap(), ConfigFormat::Toml);
        assert_eq!("JSON".parse::<ConfigFormat>().unwrap(), ConfigFormat::Json);
        assert_eq!("yml".parse::<ConfigFormat>().unwrap(), ConfigFormat::Yaml);
        assert!("ini".parse::<ConfigFormat>().is_err());
        assert_eq!(
            ConfigFormat::from_path(Path::new("/etc/pulsecheck/config")).unwrap(),
            ConfigFormat::Toml
        );
    }

    #[test]
    fn test_demo_config_is_valid() {
        let config = AppConfig::demo();
        assert_eq!(config.sources.len(), 4);
        assert_eq!(config.sources.iter().filter(|s| s.required).count(), 2);
        config.validate(COLLECTORS, CHANNELS).unwrap();
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::demo();
        config.sources.clear();
        assert!(matches!(config.validate(COLLECTORS, CHANNELS), Err(ConfigError::NoSources)));

        let mut config = AppConfig::demo();
        let dup = config.sources[0].clone();
        config.sources.push(dup);
        assert!(matches!(
            config.validate(COLLECTORS, CHANNELS),
            Err(ConfigError::DuplicateSource(id)) if id == "ml_jobs"
        ));

        let mut config = AppConfig::demo();
        config.sources[1].kind = "carrier_pigeon".into();
        assert!(matches!(
            config.validate(COLLECTORS, CHANNELS),
            Err(ConfigError::UnknownCollector { .. })
        ));

        let mut config = AppConfig::demo();
        config.channels.push(ChannelConfig::new("report_file", "file"));
        assert!(matches!(
            config.validate(COLLECTORS, CHANNELS),
            Err(ConfigError::DuplicateChannel(_))
        ));

        let mut config = AppConfig::demo();
        config.run.overall_timeout_secs = 0;
        assert!(matches!(config.validate(COLLECTORS, CHANNELS), Err(ConfigError::ZeroTimeout(_))));

        let mut config = AppConfig::demo();
        config.schedule.time = "25:99".into();
        assert!(matches!(
            config.validate(COLLECTORS, CHANNELS),
            Err(ConfigError::InvalidScheduleTime(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PULSECHECK_ANTHROPIC_API_KEY", "sk-test"),
            ("PULSECHECK_MODEL", "claude-test"),
            ("PULSECHECK_SCHEDULE_TIME", "06:30"),
            ("PULSECHECK_ML_JOBS_TOKEN", "job-token"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::demo();
        config.apply_env_overrides_with(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.analyzer.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.analyzer.model, "claude-test");
        assert_eq!(config.schedule.time, "06:30");
        assert_eq!(config.sources[0].token.as_deref(), Some("job-token"));
        assert_eq!(config.sources[1].token, None);
    }

    #[test]
    fn test_token_env_var_name() {
        let source = SourceConfig::new("azure-ml.prod", "jobs");
        assert_eq!(source.token_env_var(), "PULSECHECK_AZURE_ML_PROD_TOKEN");
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempdir().unwrap();
        for name in ["config.toml", "config.json", "config.yaml"] {
            let path = dir.path().join(name);
            let manager = ConfigManager::with_config(&path, AppConfig::demo()).unwrap();
            manager.save().unwrap();

            let loaded = ConfigManager::load_without_env(&path).unwrap();
            assert_eq!(loaded.config(), &AppConfig::demo(), "round trip through {}", name);
        }
    }

    #[test]
    fn test_toml_sources_and_defaults() {
        let content = r#"
[run]
per_source_timeout_secs = 30

[[sources]]
id = "azure_ml"
kind = "jobs"
required = true
timeout_secs = 45

[sources.settings]
url = "https://ml.example.com/jobs"
lookback_hours = 24

[[channels]]
id = "teams"
kind = "webhook"

[channels.settings]
url = "https://example.webhook.office.com/x"
"#;
        let config = AppConfig::from_str_with_format(content, ConfigFormat::Toml).unwrap();
        assert_eq!(config.run.per_source_timeout(), Duration::from_secs(30));
        assert_eq!(config.run.overall_timeout(), Duration::from_secs(180));
        assert_eq!(config.sources[0].timeout(), Some(Duration::from_secs(45)));
        assert_eq!(config.sources[0].settings["lookback_hours"], 24);
        assert_eq!(config.channels[0].settings["url"], "https://example.webhook.office.com/x");
        assert_eq!(config.schedule.parse_time().unwrap(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let result = ConfigManager::load_without_env(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
