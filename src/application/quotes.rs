//! Quote pricing against the cached catalog.

use std::collections::HashMap;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::application::catalog::{CatalogError, ProductCatalogService};
use crate::domain::error::DomainError;
use crate::domain::inventory::round_money;

pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(15, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteLineItem {
    pub sku: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub customer_code: String,
    pub line_items: Vec<QuoteLineItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteLineTotal {
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotePricing {
    pub customer_code: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub lines: Vec<QuoteLineTotal>,
}

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Clone)]
pub struct QuotePricingService {
    catalog: ProductCatalogService,
    tax_rate: Decimal,
}

impl QuotePricingService {
    pub fn new(catalog: ProductCatalogService, tax_rate: Decimal) -> Self {
        Self { catalog, tax_rate }
    }

    pub async fn price_quote(&self, request: QuoteRequest) -> Result<QuotePricing, QuoteError> {
        let customer_code = request.customer_code.trim();
        if customer_code.is_empty() {
            return Err(DomainError::validation("customer code is required").into());
        }
        if request.line_items.is_empty() {
            return Err(DomainError::validation("at least one line item is required").into());
        }
        if let Some(line) = request.line_items.iter().find(|line| line.quantity <= 0) {
            return Err(DomainError::validation(format!(
                "quantity for `{}` must be greater than zero",
                line.sku
            ))
            .into());
        }

        let prices: HashMap<String, Decimal> = self
            .catalog
            .list_products()
            .await?
            .into_iter()
            .map(|product| (product.id.to_lowercase(), product.price))
            .collect();

        let mut lines = Vec::with_capacity(request.line_items.len());
        let mut subtotal = Decimal::ZERO;
        for line in request.line_items {
            let unit_price = *prices
                .get(&line.sku.trim().to_lowercase())
                .ok_or_else(|| DomainError::unknown_product(line.sku.clone()))?;
            let line_total = unit_price
                .checked_mul(Decimal::from(line.quantity))
                .map(round_money)
                .ok_or_else(out_of_range)?;
            subtotal = subtotal.checked_add(line_total).ok_or_else(out_of_range)?;
            lines.push(QuoteLineTotal {
                sku: line.sku,
                quantity: line.quantity,
                unit_price,
                line_total,
            });
        }

        let subtotal = round_money(subtotal);
        let tax = subtotal
            .checked_mul(self.tax_rate)
            .map(round_money)
            .ok_or_else(out_of_range)?;
        let total = subtotal.checked_add(tax).ok_or_else(out_of_range)?;
        Ok(QuotePricing {
            customer_code: customer_code.to_string(),
            subtotal,
            tax,
            total,
            lines,
        })
    }
}

fn out_of_range() -> DomainError {
    DomainError::validation("quote total exceeds supported range")
}
