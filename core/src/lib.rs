//! Pulsecheck Core Module
//!
//! Shared building blocks for platform health runs: the run data model and
//! status rules, the collector capability, the concurrent aggregator, the
//! configuration manager, the audit record and the HTTP/subprocess seams
//! used by collectors, generators and delivery channels.

pub mod aggregator;
pub mod audit;
pub mod clock;
pub mod collector;
pub mod config;
pub mod model;
pub mod process;
pub mod status;
pub mod transport;
mod transport_fake;
mod transport_reqwest;
mod transport_types;

pub use aggregator::{AggregateError, Aggregator};
pub use audit::{AuditError, AuditRecord};
pub use clock::{Clock, FixedClock, SystemClock};
pub use collector::{CollectContext, Collector, CollectorError, SourceBinding};
pub use config::{
    AnalyzerSettings, AppConfig, ChannelConfig, ConfigError, ConfigFormat, ConfigManager,
    LoggingSettings, RunSettings, ScheduleSettings, SourceConfig,
};
pub use model::{
    DeliveryOutcome, DeliveryResult, FailureKind, HealthSnapshot, MetricValue, SourceConcern,
    SourceFailure, SourceOutcome, SourceReport, StatusCounts, Synthesis,
};
pub use status::Status;
pub use transport::{FakeTransport, HttpTransport, ReqwestTransport, TransportError};
