use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use time::macros::datetime;
use tower::ServiceExt;

use sagebridge::application::catalog::ProductCatalogService;
use sagebridge::application::clock::FixedClock;
use sagebridge::application::jobs::{RefreshCoordinator, SharedRefreshScope};
use sagebridge::application::quotes::{DEFAULT_TAX_RATE, QuotePricingService};
use sagebridge::application::shutdown::{ShutdownHandle, shutdown_channel};
use sagebridge::domain::inventory::InsertBatching;
use sagebridge::infra::http::{
    AdminState, ApiState, StoreHealth, build_admin_router, build_api_router,
};
use sagebridge::infra::memory::InMemoryInventoryCache;
use sagebridge::infra::sources::StaticInventorySource;
use sagebridge_api_types::{
    InventoryStatusResponse, ProductResponse, QuotePricingResponse, RefreshResponse,
};

struct TestApp {
    api: axum::Router,
    admin: axum::Router,
    clock: Arc<FixedClock>,
    _shutdown: ShutdownHandle,
}

fn app() -> TestApp {
    let repo = Arc::new(InMemoryInventoryCache::new());
    let clock = Arc::new(FixedClock::new(datetime!(2024-03-01 02:00 UTC)));
    let scope = SharedRefreshScope::new(
        Arc::new(StaticInventorySource::demo()),
        repo.clone(),
        clock.clone(),
        InsertBatching::from_size(2),
    );
    let coordinator = Arc::new(RefreshCoordinator::new(Arc::new(scope), None));
    let catalog =
        ProductCatalogService::new(repo, clock.clone(), Some(time::Duration::hours(24)));
    let (shutdown, signal) = shutdown_channel();

    let api = build_api_router(ApiState {
        catalog: catalog.clone(),
        quotes: QuotePricingService::new(catalog.clone(), DEFAULT_TAX_RATE),
    });
    let admin = build_admin_router(AdminState {
        catalog,
        coordinator,
        shutdown: signal,
        store: StoreHealth::InMemory,
    });

    TestApp {
        api,
        admin,
        clock,
        _shutdown: shutdown,
    }
}

async fn send(router: &axum::Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.expect("router response")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("json body")
}

async fn refresh(app: &TestApp) -> RefreshResponse {
    let response = send(&app.admin, post_json("/admin/inventory/refresh", json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn products_are_unavailable_before_first_refresh() {
    let app = app();

    let response = send(&app.api, get("/api/v1/products")).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.headers().get(header::RETRY_AFTER).unwrap(),
        "60"
    );
    let body: Value = body_json(response).await;
    assert_eq!(body["error"]["code"], "inventory_unavailable");
}

#[tokio::test]
async fn manual_refresh_populates_product_listing() {
    let app = app();

    let outcome = refresh(&app).await;
    assert_eq!(outcome.items, 3);
    assert_eq!(outcome.synced_at, datetime!(2024-03-01 02:00 UTC));

    let response = send(&app.api, get("/api/v1/products")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let products: Vec<ProductResponse> = body_json(response).await;
    let ids: Vec<_> = products.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["ITEM-1001", "ITEM-2002", "ITEM-3003"]);
    assert_eq!(products[0].price, dec!(1250));
    assert_eq!(products[0].quantity_on_hand, 12);
}

#[tokio::test]
async fn product_json_uses_camel_case_fields() {
    let app = app();
    refresh(&app).await;

    let response = send(&app.api, get("/api/v1/products")).await;
    let body: Value = body_json(response).await;

    assert_eq!(body[1]["id"], "ITEM-2002");
    assert_eq!(body[1]["quantityOnHand"], 30);
    assert_eq!(body[1]["price"], 499.99);
    assert!(body[1].get("syncedAt").is_none());
}

#[tokio::test]
async fn stale_snapshot_is_refused() {
    let app = app();
    refresh(&app).await;
    app.clock.advance(time::Duration::hours(30));

    let response = send(&app.api, get("/api/v1/products")).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.headers().get(header::RETRY_AFTER).unwrap(),
        "300"
    );
    let body: Value = body_json(response).await;
    assert_eq!(body["error"]["code"], "inventory_stale");
}

#[tokio::test]
async fn quote_is_priced_from_cached_products() {
    let app = app();
    refresh(&app).await;

    let response = send(
        &app.api,
        post_json(
            "/api/v1/quotes/price",
            json!({
                "customerCode": "CUST-01",
                "lineItems": [
                    { "sku": "item-1001", "quantity": 2 },
                    { "sku": "ITEM-3003", "quantity": 3 }
                ]
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let quote: QuotePricingResponse = body_json(response).await;
    assert_eq!(quote.customer_code, "CUST-01");
    assert_eq!(quote.subtotal, dec!(2768.50));
    assert_eq!(quote.tax, dec!(415.28));
    assert_eq!(quote.total, dec!(3183.78));
    assert_eq!(quote.lines.len(), 2);
}

#[tokio::test]
async fn quote_with_unknown_sku_is_bad_request() {
    let app = app();
    refresh(&app).await;

    let response = send(
        &app.api,
        post_json(
            "/api/v1/quotes/price",
            json!({
                "customerCode": "CUST-01",
                "lineItems": [{ "sku": "NOPE", "quantity": 1 }]
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = body_json(response).await;
    assert_eq!(body["error"]["code"], "unknown_product");
    assert_eq!(body["error"]["hint"], "NOPE");
}

#[tokio::test]
async fn status_reports_cache_contents() {
    let app = app();

    let before: InventoryStatusResponse =
        body_json(send(&app.admin, get("/admin/inventory/status")).await).await;
    assert_eq!(before.item_count, 0);
    assert_eq!(before.last_synced_at, None);
    assert!(!before.refresh_in_progress);

    refresh(&app).await;
    let after: InventoryStatusResponse =
        body_json(send(&app.admin, get("/admin/inventory/status")).await).await;
    assert_eq!(after.item_count, 3);
    assert_eq!(after.last_synced_at, Some(datetime!(2024-03-01 02:00 UTC)));
    assert!(!after.stale);
}

#[tokio::test]
async fn health_is_no_content_for_memory_store() {
    let app = app();

    let response = send(&app.admin, get("/admin/health")).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
