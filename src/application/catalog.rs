//! Staleness-gated reads of the inventory cache.

use std::fmt;
use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{error, warn};

use crate::application::{
    clock::Clock,
    repos::{InventoryCacheRepo, RepoError},
};
use crate::domain::inventory::Product;

pub(crate) const METRIC_READ_REJECTED_TOTAL: &str = "sagebridge_inventory_read_rejected_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    Empty,
    NeverSynchronized,
    StoreFailure,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Empty => "the cache holds no products",
            Self::NeverSynchronized => "the cache has not been synchronized yet",
            Self::StoreFailure => "the cache store could not be read",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("inventory cache is not available: {reason}")]
    Unavailable {
        reason: UnavailableReason,
        #[source]
        source: Option<RepoError>,
    },
    #[error("inventory cache is stale: last synchronized at {last_synced_at}, older than {threshold}")]
    Stale {
        last_synced_at: OffsetDateTime,
        age: Duration,
        threshold: Duration,
    },
}

impl CatalogError {
    fn unavailable(reason: UnavailableReason) -> Self {
        Self::Unavailable {
            reason,
            source: None,
        }
    }

    fn store_failure(err: RepoError) -> Self {
        Self::Unavailable {
            reason: UnavailableReason::StoreFailure,
            source: Some(err),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Unavailable {
                reason: UnavailableReason::Empty,
                ..
            } => "empty",
            Self::Unavailable {
                reason: UnavailableReason::NeverSynchronized,
                ..
            } => "never_synchronized",
            Self::Unavailable {
                reason: UnavailableReason::StoreFailure,
                ..
            } => "store_failure",
            Self::Stale { .. } => "stale",
        }
    }
}

/// Snapshot of cache health for operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryStatus {
    pub item_count: u64,
    pub last_synced_at: Option<OffsetDateTime>,
    pub stale: bool,
}

#[derive(Clone)]
pub struct ProductCatalogService {
    repo: Arc<dyn InventoryCacheRepo>,
    clock: Arc<dyn Clock>,
    stale_after: Option<Duration>,
}

impl ProductCatalogService {
    pub fn new(
        repo: Arc<dyn InventoryCacheRepo>,
        clock: Arc<dyn Clock>,
        stale_after: Option<Duration>,
    ) -> Self {
        Self {
            repo,
            clock,
            stale_after,
        }
    }

    /// Cached products ordered by SKU, refused when the cache is empty or stale.
    pub async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        let result = self.load_checked().await;
        if let Err(err) = &result {
            counter!(METRIC_READ_REJECTED_TOTAL, "reason" => err.label()).increment(1);
            match err {
                CatalogError::Unavailable {
                    source: Some(source),
                    ..
                } => error!(
                    target = "sagebridge::inventory::catalog",
                    error = %source,
                    "Failed to read inventory cache"
                ),
                other => warn!(
                    target = "sagebridge::inventory::catalog",
                    reason = other.label(),
                    "Rejected inventory read"
                ),
            }
        }
        result
    }

    async fn load_checked(&self) -> Result<Vec<Product>, CatalogError> {
        let items = self
            .repo
            .list_items()
            .await
            .map_err(CatalogError::store_failure)?;
        if items.is_empty() {
            return Err(CatalogError::unavailable(UnavailableReason::Empty));
        }

        if let Some(threshold) = self.stale_after {
            let last_synced_at = self
                .repo
                .last_synced_at()
                .await
                .map_err(CatalogError::store_failure)?
                .ok_or_else(|| CatalogError::unavailable(UnavailableReason::NeverSynchronized))?;
            let age = self.clock.now_utc() - last_synced_at;
            if age > threshold {
                return Err(CatalogError::Stale {
                    last_synced_at,
                    age,
                    threshold,
                });
            }
        }

        Ok(items.into_iter().map(Product::from).collect())
    }

    pub async fn status(&self) -> Result<InventoryStatus, RepoError> {
        let item_count = self.repo.count_items().await?;
        let last_synced_at = self.repo.last_synced_at().await?;
        let stale = match (self.stale_after, last_synced_at) {
            (Some(threshold), Some(at)) => self.clock.now_utc() - at > threshold,
            _ => false,
        };
        Ok(InventoryStatus {
            item_count,
            last_synced_at,
            stale,
        })
    }
}
