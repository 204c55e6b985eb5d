//! One inventory refresh cycle: fetch the ERP catalog and replace the cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, gauge, histogram};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::application::{
    clock::Clock,
    repos::{InventoryCacheRepo, RepoError},
    shutdown::ShutdownSignal,
    source::{InventorySource, SourceError},
};
use crate::domain::inventory::{InsertBatching, stamp_catalog};

pub(crate) const METRIC_REFRESH_TOTAL: &str = "sagebridge_inventory_refresh_total";
pub(crate) const METRIC_REFRESH_MS: &str = "sagebridge_inventory_refresh_ms";
pub(crate) const METRIC_CACHED_ITEMS: &str = "sagebridge_inventory_cached_items";

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("failed to fetch inventory from source: {0}")]
    Source(#[from] SourceError),
    #[error("failed to replace inventory cache: {0}")]
    Replace(#[source] RepoError),
    #[error("an inventory refresh is already running")]
    AlreadyRunning,
    #[error("inventory refresh exceeded {0:?}")]
    TimedOut(Duration),
    #[error("inventory refresh cancelled by shutdown")]
    Cancelled,
    #[error("failed to open refresh scope: {0}")]
    Scope(String),
}

impl RefreshError {
    pub fn scope(message: impl Into<String>) -> Self {
        Self::Scope(message.into())
    }

    fn outcome_label(&self) -> &'static str {
        match self {
            Self::Source(_) => "source_failed",
            Self::Replace(_) => "replace_failed",
            Self::AlreadyRunning => "already_running",
            Self::TimedOut(_) => "timed_out",
            Self::Cancelled => "cancelled",
            Self::Scope(_) => "scope_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub items: usize,
    pub synced_at: OffsetDateTime,
    pub elapsed: Duration,
}

/// Refresh worker bound to one store handle and one source client.
pub struct InventoryCacheRefresher {
    source: Arc<dyn InventorySource>,
    repo: Arc<dyn InventoryCacheRepo>,
    clock: Arc<dyn Clock>,
    batching: InsertBatching,
}

impl InventoryCacheRefresher {
    pub fn new(
        source: Arc<dyn InventorySource>,
        repo: Arc<dyn InventoryCacheRepo>,
        clock: Arc<dyn Clock>,
        batching: InsertBatching,
    ) -> Self {
        Self {
            source,
            repo,
            clock,
            batching,
        }
    }

    /// Run one cycle. Either the whole catalog is replaced or the cache is left as it was.
    pub async fn refresh(&self, shutdown: &ShutdownSignal) -> Result<RefreshOutcome, RefreshError> {
        let started_at = Instant::now();
        info!(
            target = "sagebridge::inventory::refresh",
            source = self.source.name(),
            "Refreshing inventory cache"
        );

        let mut shutdown = shutdown.clone();
        let products = tokio::select! {
            fetched = self.source.fetch_products() => fetched?,
            _ = shutdown.cancelled() => return Err(RefreshError::Cancelled),
        };
        info!(
            target = "sagebridge::inventory::refresh",
            source = self.source.name(),
            items = products.len(),
            "Retrieved inventory from source"
        );

        let synced_at = self.clock.now_utc();
        let items = stamp_catalog(products, synced_at)
            .map_err(|err| SourceError::malformed(self.source.name(), err.to_string()))?;

        let written = self
            .repo
            .replace_all(items, self.batching)
            .await
            .map_err(RefreshError::Replace)?;

        let elapsed = started_at.elapsed();
        info!(
            target = "sagebridge::inventory::refresh",
            items = written,
            elapsed_ms = elapsed.as_millis() as u64,
            "Inventory cache refreshed"
        );

        Ok(RefreshOutcome {
            items: written,
            synced_at,
            elapsed,
        })
    }
}

/// Acquires a fresh refresher for each cycle; the refresher is dropped when the cycle ends.
#[async_trait]
pub trait RefreshScope: Send + Sync {
    async fn open(&self) -> Result<InventoryCacheRefresher, RefreshError>;
}

/// Scope that hands out refreshers over long-lived shared collaborators.
pub struct SharedRefreshScope {
    source: Arc<dyn InventorySource>,
    repo: Arc<dyn InventoryCacheRepo>,
    clock: Arc<dyn Clock>,
    batching: InsertBatching,
}

impl SharedRefreshScope {
    pub fn new(
        source: Arc<dyn InventorySource>,
        repo: Arc<dyn InventoryCacheRepo>,
        clock: Arc<dyn Clock>,
        batching: InsertBatching,
    ) -> Self {
        Self {
            source,
            repo,
            clock,
            batching,
        }
    }
}

#[async_trait]
impl RefreshScope for SharedRefreshScope {
    async fn open(&self) -> Result<InventoryCacheRefresher, RefreshError> {
        Ok(InventoryCacheRefresher::new(
            self.source.clone(),
            self.repo.clone(),
            self.clock.clone(),
            self.batching,
        ))
    }
}

/// Single-flight entry point shared by the nightly scheduler and manual triggers.
pub struct RefreshCoordinator {
    scope: Arc<dyn RefreshScope>,
    in_flight: AtomicBool,
    timeout: Option<Duration>,
}

impl RefreshCoordinator {
    pub fn new(scope: Arc<dyn RefreshScope>, timeout: Option<Duration>) -> Self {
        Self {
            scope,
            in_flight: AtomicBool::new(false),
            timeout,
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one cycle unless another is already in flight.
    pub async fn run_cycle(&self, shutdown: &ShutdownSignal) -> Result<RefreshOutcome, RefreshError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            warn!(
                target = "sagebridge::inventory::refresh",
                "Inventory refresh requested while another cycle is running"
            );
            counter!(METRIC_REFRESH_TOTAL, "outcome" => "already_running").increment(1);
            return Err(RefreshError::AlreadyRunning);
        };

        let started_at = Instant::now();
        let result = self.run_scoped(shutdown).await;
        histogram!(METRIC_REFRESH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(outcome) => {
                counter!(METRIC_REFRESH_TOTAL, "outcome" => "success").increment(1);
                gauge!(METRIC_CACHED_ITEMS).set(outcome.items as f64);
            }
            Err(err) => {
                counter!(METRIC_REFRESH_TOTAL, "outcome" => err.outcome_label()).increment(1);
            }
        }

        result
    }

    async fn run_scoped(&self, shutdown: &ShutdownSignal) -> Result<RefreshOutcome, RefreshError> {
        let refresher = self.scope.open().await?;
        let cycle = refresher.refresh(shutdown);

        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, cycle).await {
                Ok(result) => result,
                Err(_) => {
                    error!(
                        target = "sagebridge::inventory::refresh",
                        timeout_secs = limit.as_secs(),
                        "Inventory refresh timed out"
                    );
                    Err(RefreshError::TimedOut(limit))
                }
            },
            None => cycle.await,
        }
    }
}

struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
