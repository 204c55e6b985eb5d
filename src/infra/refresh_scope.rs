//! Per-cycle wiring for the refresh coordinator.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    application::{
        clock::Clock,
        jobs::{InventoryCacheRefresher, RefreshError, RefreshScope},
        repos::InventoryCacheRepo,
    },
    config::SourceSettings,
    domain::inventory::InsertBatching,
};

use super::sources::build_source;

/// Builds a fresh source client from settings at the start of every cycle,
/// so a long-running process does not carry HTTP connections or a stale
/// catalog file from one night to the next.
pub struct ConfiguredRefreshScope {
    source: SourceSettings,
    repo: Arc<dyn InventoryCacheRepo>,
    clock: Arc<dyn Clock>,
    batching: InsertBatching,
}

impl ConfiguredRefreshScope {
    pub fn new(
        source: SourceSettings,
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
impl RefreshScope for ConfiguredRefreshScope {
    async fn open(&self) -> Result<InventoryCacheRefresher, RefreshError> {
        let source = build_source(&self.source)
            .await
            .map_err(|err| RefreshError::scope(err.to_string()))?;
        debug!(
            target = "sagebridge::infra::refresh_scope",
            source = source.name(),
            "Opened inventory refresh scope"
        );

        Ok(InventoryCacheRefresher::new(
            source,
            self.repo.clone(),
            self.clock.clone(),
            self.batching,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::application::{clock::SystemClock, shutdown::shutdown_channel};
    use crate::infra::memory::InMemoryInventoryCache;

    #[tokio::test]
    async fn demo_catalog_scope_refreshes_cache() {
        let repo = Arc::new(InMemoryInventoryCache::new());
        let scope = ConfiguredRefreshScope::new(
            SourceSettings::Static { catalog_path: None },
            repo.clone(),
            Arc::new(SystemClock),
            InsertBatching::from_size(2),
        );
        let (_handle, signal) = shutdown_channel();

        let outcome = scope
            .open()
            .await
            .expect("scope")
            .refresh(&signal)
            .await
            .expect("refresh");

        assert_eq!(outcome.items, 3);
        assert_eq!(repo.count_items().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn unreadable_catalog_fails_to_open() {
        let scope = ConfiguredRefreshScope::new(
            SourceSettings::Static {
                catalog_path: Some(PathBuf::from("/nonexistent/catalog.json")),
            },
            Arc::new(InMemoryInventoryCache::new()),
            Arc::new(SystemClock),
            InsertBatching::Single,
        );

        assert!(matches!(scope.open().await, Err(RefreshError::Scope(_))));
    }
}
