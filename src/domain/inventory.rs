//! Inventory snapshot rows and the caller-facing product projection.

use std::collections::HashSet;
use std::num::NonZeroUsize;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use time::OffsetDateTime;

use super::error::DomainError;

pub const SKU_MAX_LEN: usize = 64;
pub const NAME_MAX_LEN: usize = 255;
pub const DESCRIPTION_MAX_LEN: usize = 2048;
pub const PRICE_SCALE: u32 = 2;
/// Largest price a `NUMERIC(18, 2)` column holds: 9999999999999999.99.
pub const PRICE_MAX: Decimal =
    Decimal::from_parts(2_808_348_671, 232_830_643, 0, false, PRICE_SCALE);

/// A product record as reported by the ERP, before it is stamped for the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceProduct {
    pub sku: String,
    pub name: String,
    pub description: String,
    pub unit_price: Decimal,
    pub quantity_on_hand: i32,
}

/// One row of the inventory cache table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheInventoryItem {
    pub sku: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub quantity_on_hand: i32,
    pub synced_at: OffsetDateTime,
}

impl CacheInventoryItem {
    /// Stamp a source record with the cycle's sync time, validating field bounds.
    pub fn from_source(
        product: SourceProduct,
        synced_at: OffsetDateTime,
    ) -> Result<Self, DomainError> {
        let sku = product.sku.trim().to_string();
        if sku.is_empty() {
            return Err(DomainError::validation("product sku must not be empty"));
        }
        if sku.chars().count() > SKU_MAX_LEN {
            return Err(DomainError::validation(format!(
                "product sku `{sku}` exceeds {SKU_MAX_LEN} characters"
            )));
        }
        if product.quantity_on_hand < 0 {
            return Err(DomainError::validation(format!(
                "product `{sku}` reports negative quantity {}",
                product.quantity_on_hand
            )));
        }
        if product.unit_price.is_sign_negative() {
            return Err(DomainError::validation(format!(
                "product `{sku}` reports negative price {}",
                product.unit_price
            )));
        }

        let price = round_money(product.unit_price);
        if price > PRICE_MAX {
            return Err(DomainError::validation(format!(
                "product `{sku}` reports price {} above {PRICE_MAX}",
                product.unit_price
            )));
        }

        Ok(Self {
            name: truncate_chars(product.name, NAME_MAX_LEN),
            description: truncate_chars(product.description, DESCRIPTION_MAX_LEN),
            price,
            quantity_on_hand: product.quantity_on_hand,
            synced_at,
            sku,
        })
    }
}

/// Convert a fetched catalog into cache rows sharing one `synced_at`.
///
/// Rejects the whole catalog on the first invalid or duplicated record.
pub fn stamp_catalog(
    products: Vec<SourceProduct>,
    synced_at: OffsetDateTime,
) -> Result<Vec<CacheInventoryItem>, DomainError> {
    let mut seen = HashSet::with_capacity(products.len());
    let mut items = Vec::with_capacity(products.len());

    for product in products {
        let item = CacheInventoryItem::from_source(product, synced_at)?;
        if !seen.insert(item.sku.clone()) {
            return Err(DomainError::validation(format!(
                "product sku `{}` appears more than once",
                item.sku
            )));
        }
        items.push(item);
    }

    Ok(items)
}

/// Cached product as served to API callers; `synced_at` is not part of the public shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub quantity_on_hand: i32,
}

impl From<CacheInventoryItem> for Product {
    fn from(item: CacheInventoryItem) -> Self {
        Self {
            id: item.sku,
            name: item.name,
            description: item.description,
            price: item.price,
            quantity_on_hand: item.quantity_on_hand,
        }
    }
}

/// How rows are chunked while the cache table is repopulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertBatching {
    /// Insert every row in one batch.
    Single,
    Chunked(NonZeroUsize),
}

impl InsertBatching {
    /// Zero or negative sizes collapse to a single batch.
    pub fn from_size(size: i64) -> Self {
        usize::try_from(size)
            .ok()
            .and_then(NonZeroUsize::new)
            .map_or(Self::Single, Self::Chunked)
    }

    /// Number of rows to take per chunk for a list of `total` rows.
    pub fn chunk_len(&self, total: usize) -> usize {
        match self {
            Self::Single => total.max(1),
            Self::Chunked(size) => size.get(),
        }
    }
}

/// Round a monetary amount to cents, midpoint away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

fn truncate_chars(value: String, max: usize) -> String {
    if value.chars().count() <= max {
        value
    } else {
        value.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn source(sku: &str, qty: i32) -> SourceProduct {
        SourceProduct {
            sku: sku.to_string(),
            name: format!("Item {sku}"),
            description: String::new(),
            unit_price: Decimal::new(10_005, 3),
            quantity_on_hand: qty,
        }
    }

    #[test]
    fn stamping_rounds_price_and_shares_sync_time() {
        let at = datetime!(2024-01-01 02:00 UTC);
        let items = stamp_catalog(vec![source("A", 1), source("B", 2)], at).expect("valid");

        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.synced_at == at));
        assert_eq!(items[0].price, Decimal::new(1001, 2));
    }

    #[test]
    fn stamping_rejects_negative_quantity() {
        let at = datetime!(2024-01-01 02:00 UTC);
        let err = stamp_catalog(vec![source("A", -1)], at).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn stamping_rejects_out_of_range_price() {
        let at = datetime!(2024-01-01 02:00 UTC);
        let mut too_large = source("A", 1);
        too_large.unit_price = Decimal::from(10_i64.pow(16));
        let err = stamp_catalog(vec![too_large], at).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));

        let mut at_limit = source("B", 1);
        at_limit.unit_price = PRICE_MAX;
        let items = stamp_catalog(vec![at_limit], at).expect("limit fits the column");
        assert_eq!(items[0].price.to_string(), "9999999999999999.99");
    }

    #[test]
    fn stamping_rejects_duplicate_sku() {
        let at = datetime!(2024-01-01 02:00 UTC);
        let err = stamp_catalog(vec![source("A", 1), source(" A ", 2)], at).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn batching_from_size() {
        assert_eq!(InsertBatching::from_size(0), InsertBatching::Single);
        assert_eq!(InsertBatching::from_size(-5), InsertBatching::Single);
        assert_eq!(InsertBatching::from_size(3).chunk_len(10), 3);
        assert_eq!(InsertBatching::Single.chunk_len(10), 10);
        assert_eq!(InsertBatching::Single.chunk_len(0), 1);
    }
}
