use axum::{Json, extract::State};
use sagebridge_api_types::{QuoteLineTotalResponse, QuotePricingRequest, QuotePricingResponse};

use crate::application::quotes::{QuoteLineItem, QuotePricing, QuoteRequest};

use super::{ApiError, ApiState};

pub(super) async fn price_quote(
    State(state): State<ApiState>,
    Json(payload): Json<QuotePricingRequest>,
) -> Result<Json<QuotePricingResponse>, ApiError> {
    let request = QuoteRequest {
        customer_code: payload.customer_code,
        line_items: payload
            .line_items
            .into_iter()
            .map(|line| QuoteLineItem {
                sku: line.sku,
                quantity: line.quantity,
            })
            .collect(),
    };

    let pricing = state.quotes.price_quote(request).await?;
    Ok(Json(to_response(pricing)))
}

fn to_response(pricing: QuotePricing) -> QuotePricingResponse {
    QuotePricingResponse {
        customer_code: pricing.customer_code,
        subtotal: pricing.subtotal,
        tax: pricing.tax,
        total: pricing.total,
        lines: pricing
            .lines
            .into_iter()
            .map(|line| QuoteLineTotalResponse {
                sku: line.sku,
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total: line.line_total,
            })
            .collect(),
    }
}
