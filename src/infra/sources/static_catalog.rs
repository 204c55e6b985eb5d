use std::path::Path;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    application::source::{InventorySource, SourceError},
    domain::inventory::SourceProduct,
    infra::error::InfraError,
};

use super::parse_catalog;

const SOURCE_NAME: &str = "static";

/// Fixed catalog for demos and environments without an ERP gateway.
#[derive(Debug, Clone)]
pub struct StaticInventorySource {
    products: Vec<SourceProduct>,
}

impl StaticInventorySource {
    pub fn new(products: Vec<SourceProduct>) -> Self {
        Self { products }
    }

    pub fn demo() -> Self {
        let product = |sku: &str, name: &str, cents: i64, quantity_on_hand: i32| SourceProduct {
            sku: sku.to_string(),
            name: name.to_string(),
            description: String::new(),
            unit_price: Decimal::new(cents, 2),
            quantity_on_hand,
        };

        Self::new(vec![
            product("ITEM-1001", "Hospital bed", 125_000, 12),
            product("ITEM-2002", "Patient lift", 49_999, 30),
            product("ITEM-3003", "Pressure cushion", 8_950, 250),
        ])
    }

    /// Load a gateway-shaped JSON array from disk.
    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let bytes = tokio::fs::read(path).await?;
        let products = parse_catalog(&bytes).map_err(|err| {
            InfraError::source(format!("catalog `{}` is invalid: {err}", path.display()))
        })?;
        Ok(Self::new(products))
    }
}

#[async_trait]
impl InventorySource for StaticInventorySource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch_products(&self) -> Result<Vec<SourceProduct>, SourceError> {
        Ok(self.products.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn demo_catalog_prices() {
        let products = StaticInventorySource::demo().fetch_products().await.unwrap();
        let prices: Vec<_> = products
            .iter()
            .map(|product| (product.sku.as_str(), product.unit_price))
            .collect();

        assert_eq!(
            prices,
            vec![
                ("ITEM-1001", dec!(1250.00)),
                ("ITEM-2002", dec!(499.99)),
                ("ITEM-3003", dec!(89.50)),
            ]
        );
    }

    #[tokio::test]
    async fn missing_catalog_file_fails_setup() {
        let err = StaticInventorySource::load(Path::new("/nonexistent/catalog.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, InfraError::Io(_)));
    }
}
