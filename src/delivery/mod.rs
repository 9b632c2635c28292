//! Report delivery
//!
//! Rendering, the delivery channels and the dispatcher that fans one
//! rendered report out to every configured channel.

pub mod dispatcher;
pub mod email;
pub mod file;
pub mod registry;
pub mod render;
pub mod webhook;

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use pulsecheck_core::process::ProcessError;
use pulsecheck_core::TransportError;

pub use dispatcher::dispatch;
pub use email::EmailChannel;
pub use file::FileChannel;
pub use registry::{ChannelEnv, ChannelRegistry, ChannelRegistryError};
pub use render::{render, RenderedReport};
pub use webhook::WebhookChannel;

/// Why a channel could not deliver
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("Webhook request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Mail command failed: {0}")]
    Process(#[from] ProcessError),

    #[error("Mail command exited with code {code:?}: {output}")]
    CommandFailed { code: Option<i32>, output: String },

    #[error("No recipients configured")]
    NoRecipients,

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Channel panicked: {0}")]
    Panicked(String),
}

/// A destination for the rendered report
#[async_trait]
pub trait Channel: Send + Sync + std::fmt::Debug {
    /// Configured channel id
    fn id(&self) -> &str;

    /// Channel kind in the registry
    fn kind(&self) -> &'static str;

    /// Upper bound on one delivery
    fn timeout(&self) -> Duration;

    /// Deliver `report`; no retries
    async fn deliver(&self, report: &RenderedReport) -> Result<(), DeliveryError>;
}
