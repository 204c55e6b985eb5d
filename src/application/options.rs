//! Inventory cache policy, resolved once at startup.

use std::num::NonZeroUsize;
use std::time::Duration as StdDuration;

use time::{Duration, Time, macros::time};

use crate::domain::inventory::InsertBatching;

pub const DEFAULT_SYNC_TIME_UTC: Time = time!(02:00);
pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_STALE_AFTER: Duration = Duration::hours(24);
pub const DEFAULT_REFRESH_TIMEOUT: StdDuration = StdDuration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct InventoryCacheOptions {
    /// Time of day (UTC) for the nightly refresh.
    pub sync_time_utc: Time,
    pub batching: InsertBatching,
    /// Maximum cache age before reads are rejected; `None` disables the check.
    pub stale_after: Option<Duration>,
    /// Upper bound on one refresh cycle; `None` waits indefinitely.
    pub refresh_timeout: Option<StdDuration>,
    /// Run one cycle at startup when the cache is empty.
    pub sync_on_startup: bool,
}

impl Default for InventoryCacheOptions {
    fn default() -> Self {
        Self {
            sync_time_utc: DEFAULT_SYNC_TIME_UTC,
            batching: InsertBatching::Chunked(
                NonZeroUsize::new(DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN),
            ),
            stale_after: Some(DEFAULT_STALE_AFTER),
            refresh_timeout: Some(DEFAULT_REFRESH_TIMEOUT),
            sync_on_startup: false,
        }
    }
}

impl From<&crate::config::InventoryCacheSettings> for InventoryCacheOptions {
    fn from(settings: &crate::config::InventoryCacheSettings) -> Self {
        Self {
            sync_time_utc: settings.sync_time_utc,
            batching: InsertBatching::from_size(settings.batch_size),
            stale_after: settings.stale_after,
            refresh_timeout: settings.refresh_timeout,
            sync_on_startup: settings.sync_on_startup,
        }
    }
}
