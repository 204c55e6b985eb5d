use axum::{Json, extract::State};
use sagebridge_api_types::ProductResponse;

use crate::domain::inventory::Product;

use super::{ApiError, ApiState};

pub(super) async fn list_products(
    State(state): State<ApiState>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.catalog.list_products().await?;
    Ok(Json(products.into_iter().map(to_response).collect()))
}

fn to_response(product: Product) -> ProductResponse {
    ProductResponse {
        id: product.id,
        name: product.name,
        description: product.description,
        price: product.price,
        quantity_on_hand: product.quantity_on_hand,
    }
}
