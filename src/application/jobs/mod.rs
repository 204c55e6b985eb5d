mod refresh;
mod scheduler;

pub use refresh::{
    InventoryCacheRefresher, RefreshCoordinator, RefreshError, RefreshOutcome, RefreshScope,
    SharedRefreshScope,
};
pub(crate) use refresh::{METRIC_CACHED_ITEMS, METRIC_REFRESH_MS, METRIC_REFRESH_TOTAL};
pub use scheduler::{NightlyScheduler, SchedulerStats, next_run};
