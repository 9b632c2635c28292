//! Run pipeline
//!
//! One health run: collect, analyze, deliver, audit. The stages run in
//! order. Configuration problems abort before any collector starts;
//! anything that goes wrong after that is folded into the run's results.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use pulsecheck_agents::{create_generator, Analyzer, Generator};
use pulsecheck_collectors::{CollectorEnv, CollectorRegistry, SyntheticCollector};
use pulsecheck_core::{
    Aggregator, AppConfig, AuditRecord, DeliveryResult, HealthSnapshot, HttpTransport,
    ReqwestTransport, SourceBinding, Synthesis,
};

use crate::delivery::{dispatch, ChannelEnv, ChannelRegistry};

const BANNER_WIDTH: usize = 60;

/// Everything one run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub snapshot: HealthSnapshot,
    pub synthesis: Synthesis,
    pub deliveries: Vec<DeliveryResult>,
    /// Where the audit record was written, if it could be
    pub audit_path: Option<PathBuf>,
}

impl RunReport {
    pub fn sent_count(&self) -> usize {
        self.deliveries.iter().filter(|d| d.is_sent()).count()
    }

    /// At least one channel configured and none of them delivered
    pub fn all_deliveries_failed(&self) -> bool {
        !self.deliveries.is_empty() && self.sent_count() == 0
    }
}

/// Configured, validated pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: AppConfig,
    collectors: CollectorRegistry,
    channels: ChannelRegistry,
    generator: Option<Arc<dyn Generator>>,
    aggregator: Aggregator,
    analyzer: Analyzer,
}

impl Pipeline {
    /// Create a pipeline using the real HTTP transport
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new());
        let generator = create_generator(&config.analyzer, transport.clone())
            .context("Invalid analyzer configuration")?;
        Self::with_parts(
            config,
            CollectorRegistry::with_defaults(CollectorEnv::with_transport(transport.clone())),
            ChannelRegistry::with_defaults(ChannelEnv::with_transport(transport)),
            generator,
        )
    }

    /// Create a pipeline from explicit registries and backend
    pub fn with_parts(
        config: AppConfig,
        collectors: CollectorRegistry,
        channels: ChannelRegistry,
        generator: Option<Arc<dyn Generator>>,
    ) -> anyhow::Result<Self> {
        config
            .validate(&collectors.kinds(), &channels.kinds())
            .context("Invalid configuration")?;
        let analyzer = Analyzer::from_settings(&config.analyzer);
        Ok(Self {
            config,
            collectors,
            channels,
            generator,
            aggregator: Aggregator::new(),
            analyzer,
        })
    }

    /// Replace the aggregator (e.g. one on a fixed clock)
    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn bind_sources(&self, dry_run: bool) -> anyhow::Result<Vec<SourceBinding>> {
        if !dry_run {
            return self
                .collectors
                .bind_all(&self.config.sources)
                .context("Invalid source configuration");
        }

        info!("DRY RUN: replacing collectors with synthetic data");
        Ok(self
            .config
            .sources
            .iter()
            .map(|source| {
                let mut binding =
                    SourceBinding::new(source.id.clone(), Arc::new(SyntheticCollector::dry_run(source)))
                        .required(source.required);
                if let Some(timeout) = source.timeout() {
                    binding = binding.with_timeout(timeout);
                }
                binding
            })
            .collect())
    }

    /// Execute one run
    ///
    /// # Errors
    ///
    /// Only configuration errors, raised before any collector runs.
    pub async fn run_once(&self, dry_run: bool) -> anyhow::Result<RunReport> {
        let started = Instant::now();
        info!("{}", "=".repeat(BANNER_WIDTH));
        info!(
            "Platform health run starting{}",
            if dry_run { " (dry run)" } else { "" }
        );
        info!("{}", "=".repeat(BANNER_WIDTH));

        let bindings = self.bind_sources(dry_run)?;
        let channels = self
            .channels
            .build_all(&self.config.channels)
            .context("Invalid channel configuration")?;

        let snapshot = self
            .aggregator
            .aggregate(
                bindings,
                self.config.run.per_source_timeout(),
                self.config.run.overall_timeout(),
            )
            .await
            .context("Collection could not start")?;

        let synthesis = self.analyzer.analyze(&snapshot, self.generator.as_deref()).await;
        if synthesis.degraded {
            warn!("Using rule-based synthesis for this run");
        }

        let deliveries = dispatch(&snapshot, &synthesis, &channels).await;

        let record = AuditRecord::new(snapshot, synthesis, deliveries);
        let audit_path = match record.write_to(&self.config.run.report_dir).await {
            Ok(path) => {
                info!("Audit record saved: {}", path.display());
                Some(path)
            }
            Err(e) => {
                error!("Failed to write audit record: {}", e);
                None
            }
        };

        let report = RunReport {
            snapshot: record.snapshot,
            synthesis: record.synthesis,
            deliveries: record.deliveries,
            audit_path,
        };

        if report.all_deliveries_failed() {
            error!(
                run_id = %report.snapshot.run_id,
                "Report could not be delivered to any of {} channel(s)",
                report.deliveries.len()
            );
        }

        info!("{}", "=".repeat(BANNER_WIDTH));
        info!(
            run_id = %report.snapshot.run_id,
            "Run complete in {:.1}s. Status: {}. Delivered to {}/{} channel(s)",
            started.elapsed().as_secs_f64(),
            report.synthesis.severity.as_str().to_uppercase(),
            report.sent_count(),
            report.deliveries.len()
        );
        info!("{}", "=".repeat(BANNER_WIDTH));

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsecheck_core::DeliveryOutcome;

    #[test]
    fn test_all_deliveries_failed() {
        let snapshot = HealthSnapshot::new(
            uuid::Uuid::new_v4(),
            chrono::Utc::now(),
            Default::default(),
            Default::default(),
        );
        let synthesis = Synthesis {
            summary: "s".into(),
            severity: snapshot.overall_status,
            actions: vec![],
            degraded: true,
        };
        let mut report = RunReport {
            snapshot,
            synthesis,
            deliveries: vec![],
            audit_path: None,
        };
        assert!(!report.all_deliveries_failed());

        report.deliveries = vec![DeliveryResult::failed("a", "x"), DeliveryResult::failed("b", "y")];
        assert!(report.all_deliveries_failed());

        report.deliveries[1].outcome = DeliveryOutcome::Sent;
        assert!(!report.all_deliveries_failed());
        assert_eq!(report.sent_count(), 1);
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let mut config = AppConfig::demo();
        config.analyzer.provider = "oracle".into();
        assert!(Pipeline::new(config).is_err());
    }
}
