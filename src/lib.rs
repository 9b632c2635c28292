//! Pulsecheck: daily platform health reporting
//!
//! Collects health data from configured sources in parallel, synthesizes a
//! narrative through a text-generation backend (with a rule-based
//! fallback), and delivers the report to every configured channel.

pub mod cli;
pub mod delivery;
pub mod logging;
pub mod pipeline;
pub mod scheduler;

pub use delivery::{dispatch, render, Channel, DeliveryError, RenderedReport};
pub use pipeline::{Pipeline, RunReport};
