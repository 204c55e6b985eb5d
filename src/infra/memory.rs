//! Process-local inventory cache used when no database is configured.

use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::{
    application::repos::{InventoryCacheRepo, RepoError},
    domain::inventory::{CacheInventoryItem, InsertBatching},
};

/// Snapshot map keyed by SKU.
///
/// There is no bulk delete: a replace removes rows one at a time from a
/// staged copy and publishes the copy only when every chunk succeeded.
#[derive(Debug, Default)]
pub struct InMemoryInventoryCache {
    rows: RwLock<BTreeMap<String, CacheInventoryItem>>,
    writer: Mutex<()>,
}

impl InMemoryInventoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryCacheRepo for InMemoryInventoryCache {
    async fn list_items(&self) -> Result<Vec<CacheInventoryItem>, RepoError> {
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn last_synced_at(&self) -> Result<Option<OffsetDateTime>, RepoError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .map(|item| item.synced_at)
            .max())
    }

    async fn count_items(&self) -> Result<u64, RepoError> {
        Ok(self.rows.read().await.len() as u64)
    }

    async fn replace_all(
        &self,
        items: Vec<CacheInventoryItem>,
        batching: InsertBatching,
    ) -> Result<usize, RepoError> {
        let _writer = self.writer.lock().await;
        let mut staged = self.rows.read().await.clone();

        let existing: Vec<String> = staged.keys().cloned().collect();
        for sku in existing {
            staged.remove(&sku);
        }

        let chunk_len = batching.chunk_len(items.len());
        let mut written = 0usize;
        for (index, chunk) in items.chunks(chunk_len).enumerate() {
            for item in chunk {
                if staged.contains_key(&item.sku) {
                    return Err(RepoError::Duplicate {
                        constraint: "cache_inventory_pkey".to_string(),
                    });
                }
                staged.insert(item.sku.clone(), item.clone());
            }
            written += chunk.len();
            debug!(
                target = "sagebridge::infra::memory",
                chunk = index,
                rows = chunk.len(),
                "Staged inventory chunk"
            );
        }

        *self.rows.write().await = staged;
        Ok(written)
    }
}
