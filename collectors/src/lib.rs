//! Pulsecheck Collectors Module
//!
//! Concrete collectors for the platform health run and the registry that
//! builds them from configuration.

pub mod alerts;
mod http;
pub mod jobs;
pub mod registry;
pub mod shell;
pub mod synthetic;
pub mod tickets;

pub use alerts::{AlertsCollector, AlertsSettings};
pub use jobs::{JobsCollector, JobsSettings};
pub use registry::{parse_settings, CollectorEnv, CollectorFactory, CollectorRegistry, RegistryError};
pub use shell::{ShellCollector, ShellSettings};
pub use synthetic::{SyntheticCollector, SyntheticSettings};
pub use tickets::{TicketsCollector, TicketsSettings};
