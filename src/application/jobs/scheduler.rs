//! Nightly refresh loop.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use time::{Duration, OffsetDateTime, Time};
use tracing::{error, info, warn};

use crate::application::clock::Clock;
use crate::application::shutdown::ShutdownSignal;

use super::refresh::{RefreshCoordinator, RefreshError};

/// First instant at `sync_time` (UTC) strictly after `now`.
pub fn next_run(now: OffsetDateTime, sync_time: Time) -> OffsetDateTime {
    let now = now.to_offset(time::UtcOffset::UTC);
    let today = now.replace_time(sync_time);
    if today <= now {
        today + Duration::days(1)
    } else {
        today
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub failures: u64,
}

pub struct NightlyScheduler {
    coordinator: Arc<RefreshCoordinator>,
    clock: Arc<dyn Clock>,
    sync_time: Time,
}

impl NightlyScheduler {
    pub fn new(coordinator: Arc<RefreshCoordinator>, clock: Arc<dyn Clock>, sync_time: Time) -> Self {
        Self {
            coordinator,
            clock,
            sync_time,
        }
    }

    /// Sleep until each scheduled run and refresh, until `shutdown` fires.
    ///
    /// Cycle failures are logged and never end the loop.
    pub async fn run(self, mut shutdown: ShutdownSignal) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        info!(
            target = "sagebridge::inventory::scheduler",
            sync_time = %self.sync_time,
            "Nightly inventory scheduler started"
        );

        loop {
            let now = self.clock.now_utc();
            let scheduled = next_run(now, self.sync_time);
            let delay = StdDuration::try_from(scheduled - now).unwrap_or(StdDuration::ZERO);
            info!(
                target = "sagebridge::inventory::scheduler",
                next_run = %scheduled,
                delay_secs = delay.as_secs(),
                "Next inventory refresh scheduled"
            );

            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
            if shutdown.is_triggered() {
                break;
            }

            stats.cycles += 1;
            match self.coordinator.run_cycle(&shutdown).await {
                Ok(outcome) => info!(
                    target = "sagebridge::inventory::scheduler",
                    items = outcome.items,
                    "Nightly inventory refresh completed"
                ),
                Err(RefreshError::Cancelled) => break,
                Err(RefreshError::AlreadyRunning) => warn!(
                    target = "sagebridge::inventory::scheduler",
                    "Skipped nightly refresh; a manual refresh is in flight"
                ),
                Err(err) => {
                    stats.failures += 1;
                    error!(
                        target = "sagebridge::inventory::scheduler",
                        error = %err,
                        "Nightly inventory refresh failed"
                    );
                }
            }
        }

        info!(
            target = "sagebridge::inventory::scheduler",
            cycles = stats.cycles,
            failures = stats.failures,
            "Nightly inventory scheduler stopped"
        );
        stats
    }
}
