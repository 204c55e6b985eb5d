//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::inventory::{CacheInventoryItem, InsertBatching};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Storage for the inventory snapshot.
///
/// Implementations must make [`InventoryCacheRepo::replace_all`] atomic from
/// the perspective of concurrent readers: a reader observes either the full
/// previous snapshot or the full new one.
#[async_trait]
pub trait InventoryCacheRepo: Send + Sync {
    /// All cached rows ordered by SKU ascending.
    async fn list_items(&self) -> Result<Vec<CacheInventoryItem>, RepoError>;

    /// Latest `synced_at` across all rows, `None` when the cache is empty.
    async fn last_synced_at(&self) -> Result<Option<OffsetDateTime>, RepoError>;

    async fn count_items(&self) -> Result<u64, RepoError>;

    /// Replace every cached row with `items`, inserting in chunks per `batching`.
    ///
    /// Returns the number of rows written. On error the previous contents
    /// remain untouched.
    async fn replace_all(
        &self,
        items: Vec<CacheInventoryItem>,
        batching: InsertBatching,
    ) -> Result<usize, RepoError>;
}
