//! Shell-check collector
//!
//! Runs configured health-check scripts plus built-in disk usage and
//! process checks.
//! Scripts exit 0 for healthy, 1 for warning and 2 for critical; any other
//! exit code or a timeout is critical. A script that cannot be started is
//! recorded as an error check, which grades as a warning.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use pulsecheck_core::process::{run_command, ProcessError};
use pulsecheck_core::{CollectContext, Collector, CollectorError, SourceConfig, SourceReport, Status};

use crate::http::truncate;
use crate::registry::{parse_settings, RegistryError};

/// Captured output per check is capped at this many characters
pub const OUTPUT_LIMIT: usize = 2000;

/// Settings for a `shell` source
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShellSettings {
    pub scripts: Vec<PathBuf>,
    pub script_timeout_secs: u64,
    pub disk_check: bool,
    /// Mounts at or above this usage are critical
    pub disk_threshold_percent: u8,
    /// `df`-compatible command used by the disk check
    pub df_command: PathBuf,
    /// `pgrep -f` pattern counted by the process check; unset disables it
    pub process_check_pattern: Option<String>,
    /// `pgrep`-compatible command used by the process check
    pub pgrep_command: PathBuf,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            scripts: Vec::new(),
            script_timeout_secs: 30,
            disk_check: true,
            disk_threshold_percent: 90,
            df_command: PathBuf::from("df"),
            process_check_pattern: None,
            pgrep_command: PathBuf::from("pgrep"),
        }
    }
}

/// Result of one check; `status` is `None` when the check itself errored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub status: Option<Status>,
    pub output: String,
    pub exit_code: Option<i32>,
}

impl CheckResult {
    fn errored(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: None,
            output: output.into(),
            exit_code: None,
        }
    }

    /// Contribution to the source status; errors grade as warnings
    pub fn graded(&self) -> Status {
        self.status.unwrap_or(Status::Warning)
    }

    fn label(&self) -> &'static str {
        self.status.map_or("error", |s| s.as_str())
    }
}

/// Map a script exit code to a status
pub fn exit_status(code: Option<i32>) -> Status {
    match code {
        Some(0) => Status::Healthy,
        Some(1) => Status::Warning,
        _ => Status::Critical,
    }
}

/// Mounts from `df -P` output whose usage is at or above `threshold`
pub fn parse_df_output(output: &str, threshold: u8) -> Vec<(String, u8)> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 6 {
                return None;
            }
            let usage: u8 = parts[4].trim_end_matches('%').parse().ok()?;
            let mount = parts[5..].join(" ");
            (usage >= threshold).then_some((mount, usage))
        })
        .collect()
}

/// Shell-check collector
#[derive(Debug, Clone)]
pub struct ShellCollector {
    settings: ShellSettings,
}

impl ShellCollector {
    pub const KIND: &'static str = "shell";

    pub fn new(settings: ShellSettings) -> Self {
        Self { settings }
    }

    pub fn from_config(source: &SourceConfig) -> Result<Self, RegistryError> {
        Ok(Self::new(parse_settings(source)?))
    }

    async fn run_script(&self, script: &Path, timeout: Duration) -> CheckResult {
        let name = script
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| script.display().to_string());

        if !script.exists() {
            return CheckResult::errored(name, format!("Script not found: {}", script.display()));
        }

        match run_command(script, &[], None, timeout).await {
            Ok(output) => CheckResult {
                name,
                status: Some(exit_status(output.exit_code)),
                output: truncate(&output.combined(), OUTPUT_LIMIT),
                exit_code: output.exit_code,
            },
            Err(ProcessError::TimedOut { timeout, .. }) => CheckResult {
                name,
                status: Some(Status::Critical),
                output: format!("Script timed out after {}s", timeout.as_secs()),
                exit_code: None,
            },
            Err(err) => CheckResult::errored(name, err.to_string()),
        }
    }

    async fn disk_usage_check(&self, timeout: Duration) -> CheckResult {
        const NAME: &str = "disk_usage_check";
        let output = match run_command(&self.settings.df_command, &["-P"], None, timeout).await {
            Ok(output) => output,
            Err(err) => return CheckResult::errored(NAME, err.to_string()),
        };

        let high = parse_df_output(&output.stdout, self.settings.disk_threshold_percent);
        if high.is_empty() {
            return CheckResult {
                name: NAME.to_string(),
                status: Some(Status::Healthy),
                output: format!(
                    "All mount points under {}% usage",
                    self.settings.disk_threshold_percent
                ),
                exit_code: output.exit_code,
            };
        }

        let listed: Vec<String> = high
            .iter()
            .map(|(mount, usage)| format!("{}: {}%", mount, usage))
            .collect();
        CheckResult {
            name: NAME.to_string(),
            status: Some(Status::Critical),
            output: truncate(&format!("High disk usage detected: {}", listed.join(", ")), OUTPUT_LIMIT),
            exit_code: output.exit_code,
        }
    }

    async fn process_check(&self, pattern: &str, timeout: Duration) -> CheckResult {
        const NAME: &str = "process_check";
        let output = match run_command(
            &self.settings.pgrep_command,
            &["-a", "-f", pattern],
            None,
            timeout,
        )
        .await
        {
            Ok(output) => output,
            Err(err) => return CheckResult::errored(NAME, err.to_string()),
        };

        // pgrep exits 1 when nothing matched
        let running = match output.exit_code {
            Some(0) | Some(1) => output.stdout.lines().filter(|l| !l.trim().is_empty()).count(),
            _ => {
                return CheckResult::errored(
                    NAME,
                    truncate(
                        &format!("pgrep failed ({:?}): {}", output.exit_code, output.combined()),
                        OUTPUT_LIMIT,
                    ),
                )
            }
        };
        CheckResult {
            name: NAME.to_string(),
            status: Some(Status::Healthy),
            output: format!("{} process(es) running matching '{}'", running, pattern),
            exit_code: output.exit_code,
        }
    }

    async fn builtin_checks(&self, timeout: Duration) -> Vec<CheckResult> {
        let disk = async {
            if self.settings.disk_check {
                Some(self.disk_usage_check(timeout).await)
            } else {
                None
            }
        };
        let process = async {
            match &self.settings.process_check_pattern {
                Some(pattern) => Some(self.process_check(pattern, timeout).await),
                None => None,
            }
        };
        let (disk, process) = tokio::join!(disk, process);
        disk.into_iter().chain(process).collect()
    }

    /// Run every check, built-in first, then scripts in configured order
    pub async fn run_checks(&self, ctx: &CollectContext) -> Vec<CheckResult> {
        let timeout = ctx.bounded(Duration::from_secs(self.settings.script_timeout_secs));

        let scripts = futures::future::join_all(
            self.settings
                .scripts
                .iter()
                .map(|script| self.run_script(script, timeout)),
        );
        let (mut results, mut scripts) = tokio::join!(self.builtin_checks(timeout), scripts);
        results.append(&mut scripts);
        results
    }
}

#[async_trait]
impl Collector for ShellCollector {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn collect(&self, ctx: &CollectContext) -> Result<SourceReport, CollectorError> {
        info!(source = %ctx.source_id, "Running shell health checks...");
        let results = self.run_checks(ctx).await;

        let status = Status::worst(results.iter().map(CheckResult::graded));
        let count = |wanted: Option<Status>| results.iter().filter(|r| r.status == wanted).count();

        let mut report = SourceReport::new(ctx.source_id.clone(), status, ctx.now())
            .with_metric("total_checks", results.len())
            .with_metric("healthy", count(Some(Status::Healthy)))
            .with_metric("warnings", count(Some(Status::Warning)))
            .with_metric("critical", count(Some(Status::Critical)))
            .with_metric("errors", count(None));
        for result in &results {
            if result.status.is_none() {
                warn!(source = %ctx.source_id, "Check {} errored: {}", result.name, result.output);
            }
            report = report.with_finding(format!("{} [{}] {}", result.name, result.label(), result.output));
        }
        Ok(report)
    }
}
