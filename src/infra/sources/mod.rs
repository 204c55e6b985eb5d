//! Inventory source adapters selected at wiring time.

mod http;
mod static_catalog;

pub use http::HttpInventorySource;
pub use static_catalog::StaticInventorySource;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    application::source::InventorySource, config::SourceSettings, domain::inventory::SourceProduct,
    infra::error::InfraError,
};

/// Product record as exchanged with the ERP gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SageInventoryProduct {
    stock_code: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    unit_price: Decimal,
    quantity_on_hand: i32,
}

impl From<SageInventoryProduct> for SourceProduct {
    fn from(product: SageInventoryProduct) -> Self {
        Self {
            sku: product.stock_code,
            name: product.name,
            description: product.description.unwrap_or_default(),
            unit_price: product.unit_price,
            quantity_on_hand: product.quantity_on_hand,
        }
    }
}

fn parse_catalog(bytes: &[u8]) -> Result<Vec<SourceProduct>, serde_json::Error> {
    let products: Vec<SageInventoryProduct> = serde_json::from_slice(bytes)?;
    Ok(products.into_iter().map(SourceProduct::from).collect())
}

pub async fn build_source(settings: &SourceSettings) -> Result<Arc<dyn InventorySource>, InfraError> {
    match settings {
        SourceSettings::Static {
            catalog_path: Some(path),
        } => Ok(Arc::new(StaticInventorySource::load(path).await?)),
        SourceSettings::Static { catalog_path: None } => Ok(Arc::new(StaticInventorySource::demo())),
        SourceSettings::Http(http) => Ok(Arc::new(HttpInventorySource::new(http)?)),
    }
}
