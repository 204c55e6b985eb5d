//! Public product API and the operator-only admin surface.

mod admin;
mod error;
mod middleware;
mod products;
mod quotes;
mod state;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};
pub use state::{AdminState, ApiState, StoreHealth};

pub(crate) use middleware::METRIC_HTTP_REQUEST_MS;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use middleware::{log_responses, set_request_context};

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/products", get(products::list_products))
        .route("/api/v1/quotes/price", post(quotes::price_quote))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/health", get(admin::health))
        .route("/admin/inventory/status", get(admin::inventory_status))
        .route("/admin/inventory/refresh", post(admin::refresh_inventory))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
