//! Dispatcher
//!
//! Renders the report once and delivers it to every channel concurrently.
//! A channel that errors, panics or overruns its timeout yields a `failed`
//! result and has no effect on the others. Results come back in channel
//! order, one per channel.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use pulsecheck_core::{DeliveryResult, HealthSnapshot, Synthesis};

use super::render::{render, RenderedReport};
use super::{Channel, DeliveryError};

/// Deliver the rendered report for `snapshot` to every channel
pub async fn dispatch(
    snapshot: &HealthSnapshot,
    synthesis: &Synthesis,
    channels: &[Arc<dyn Channel>],
) -> Vec<DeliveryResult> {
    if channels.is_empty() {
        warn!("No delivery channels configured; report is only kept in the audit record");
        return Vec::new();
    }

    let report = Arc::new(render(snapshot, synthesis));
    info!(
        channels = channels.len(),
        "Delivering report: {}", report.subject
    );

    let mut results: Vec<DeliveryResult> = channels
        .iter()
        .map(|channel| DeliveryResult::failed(channel.id(), "delivery task ended without a result"))
        .collect();

    let mut tasks = JoinSet::new();
    for (index, channel) in channels.iter().enumerate() {
        let channel = Arc::clone(channel);
        let report = Arc::clone(&report);
        tasks.spawn(async move {
            let outcome = deliver_one(channel.as_ref(), &report).await;
            (index, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (index, outcome) = match joined {
            Ok(done) => done,
            Err(join_err) => {
                error!("Delivery task ended without a result: {}", join_err);
                continue;
            }
        };
        let Some(channel) = channels.get(index) else {
            continue;
        };
        let result = match outcome {
            Ok(()) => {
                info!(channel = channel.id(), kind = channel.kind(), "Report delivered");
                DeliveryResult::sent(channel.id())
            }
            Err(e) => {
                warn!(channel = channel.id(), kind = channel.kind(), "Delivery failed: {}", e);
                DeliveryResult::failed(channel.id(), e.to_string())
            }
        };
        if let Some(slot) = results.get_mut(index) {
            *slot = result;
        }
    }

    results
}

async fn deliver_one(channel: &dyn Channel, report: &RenderedReport) -> Result<(), DeliveryError> {
    let timeout = channel.timeout();
    let work = AssertUnwindSafe(channel.deliver(report)).catch_unwind();
    match tokio::time::timeout(timeout, work).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(DeliveryError::Panicked(panic_message(panic.as_ref()))),
        Err(_) => Err(DeliveryError::Timeout(timeout)),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
