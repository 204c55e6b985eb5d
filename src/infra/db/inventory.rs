use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::{
    application::repos::{InventoryCacheRepo, RepoError},
    domain::inventory::{CacheInventoryItem, InsertBatching},
};

use super::{PostgresRepositories, map_sqlx_error};

const INSERT_COLUMNS: usize = 6;
/// Postgres caps a statement at 65535 bind parameters.
const MAX_ROWS_PER_STATEMENT: usize = u16::MAX as usize / INSERT_COLUMNS;

#[derive(sqlx::FromRow)]
struct CacheInventoryRow {
    sku: String,
    name: String,
    description: String,
    price: Decimal,
    quantity_on_hand: i32,
    synced_at: OffsetDateTime,
}

impl From<CacheInventoryRow> for CacheInventoryItem {
    fn from(row: CacheInventoryRow) -> Self {
        Self {
            sku: row.sku,
            name: row.name,
            description: row.description,
            price: row.price,
            quantity_on_hand: row.quantity_on_hand,
            synced_at: row.synced_at,
        }
    }
}

#[async_trait]
impl InventoryCacheRepo for PostgresRepositories {
    async fn list_items(&self) -> Result<Vec<CacheInventoryItem>, RepoError> {
        let rows = sqlx::query_as::<_, CacheInventoryRow>(
            r#"
            SELECT sku, name, description, price, quantity_on_hand, synced_at
            FROM cache_inventory
            ORDER BY sku ASC
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CacheInventoryItem::from).collect())
    }

    async fn last_synced_at(&self) -> Result<Option<OffsetDateTime>, RepoError> {
        sqlx::query_scalar::<_, Option<OffsetDateTime>>(
            "SELECT MAX(synced_at) FROM cache_inventory",
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn count_items(&self) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache_inventory")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn replace_all(
        &self,
        items: Vec<CacheInventoryItem>,
        batching: InsertBatching,
    ) -> Result<usize, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        match replace_rows(&mut tx, &items, batching).await {
            Ok(written) => {
                tx.commit().await.map_err(map_sqlx_error)?;
                Ok(written)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(
                        target = "sagebridge::infra::db::inventory",
                        error = %rollback,
                        "Failed to roll back inventory replace"
                    );
                }
                Err(err)
            }
        }
    }
}

async fn replace_rows(
    conn: &mut PgConnection,
    items: &[CacheInventoryItem],
    batching: InsertBatching,
) -> Result<usize, RepoError> {
    let deleted = sqlx::query("DELETE FROM cache_inventory")
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

    let chunk_len = batching.chunk_len(items.len()).min(MAX_ROWS_PER_STATEMENT);
    let mut written = 0usize;

    for (index, chunk) in items.chunks(chunk_len).enumerate() {
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO cache_inventory (sku, name, description, price, quantity_on_hand, synced_at) ",
        );
        qb.push_values(chunk, |mut row, item| {
            row.push_bind(item.sku.clone())
                .push_bind(item.name.clone())
                .push_bind(item.description.clone())
                .push_bind(item.price)
                .push_bind(item.quantity_on_hand)
                .push_bind(item.synced_at);
        });

        let inserted = qb
            .build()
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();
        written += usize::try_from(inserted).unwrap_or(chunk.len());

        debug!(
            target = "sagebridge::infra::db::inventory",
            chunk = index,
            rows = chunk.len(),
            "Inserted inventory chunk"
        );
    }

    debug!(
        target = "sagebridge::infra::db::inventory",
        deleted,
        written,
        "Replaced inventory cache rows"
    );
    Ok(written)
}
