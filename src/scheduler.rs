//! Daily scheduler
//!
//! Runs the pipeline once at start-up, then every day at the configured
//! local time until cancelled.

use chrono::{DateTime, Days, NaiveTime, TimeZone};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::pipeline::Pipeline;

/// First instant strictly after `now` whose wall-clock time in `now`'s zone is `at`
///
/// When `at` falls into a DST gap on a given day that day is skipped.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    for offset in 0..=2 {
        let Some(day) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        if let Some(candidate) = tz.from_local_datetime(&day.and_time(at)).earliest() {
            if candidate > *now {
                return candidate;
            }
        }
    }
    now.clone() + chrono::Duration::days(1)
}

/// Run at start-up, then daily at `at` (local time) until `shutdown` fires
///
/// # Errors
///
/// Fails only when the start-up run hits a configuration error; failures
/// of later runs are logged and the schedule continues.
pub async fn run_daily(
    pipeline: &Pipeline,
    at: NaiveTime,
    dry_run: bool,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!("Scheduled mode: running daily at {} local time", at.format("%H:%M"));
    pipeline.run_once(dry_run).await?;

    loop {
        let now = chrono::Local::now();
        let next = next_run_after(&now, at);
        let wait = (next.clone() - now).to_std().unwrap_or(Duration::ZERO);
        info!("Next run at {}", next.format("%Y-%m-%d %H:%M %Z"));

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Scheduler stopped");
                return Ok(());
            }
            _ = tokio::time::sleep(wait) => {}
        }

        if let Err(e) = pipeline.run_once(dry_run).await {
            error!("Scheduled run failed: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_later_today() {
        let now = Utc.with_ymd_and_hms(2024, 12, 1, 6, 30, 0).unwrap();
        assert_eq!(
            next_run_after(&now, at(8, 0)),
            Utc.with_ymd_and_hms(2024, 12, 1, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_already_passed_goes_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 8, 0, 0).unwrap();
        assert_eq!(
            next_run_after(&now, at(8, 0)),
            Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_uses_zone_of_now() {
        let cet = FixedOffset::east_opt(3600).unwrap();
        let now = cet.with_ymd_and_hms(2024, 6, 1, 7, 59, 0).unwrap();
        let next = next_run_after(&now, at(8, 0));
        assert_eq!(next, cet.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        assert_eq!(next.with_timezone(&Utc), Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap());
    }
}
