use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sagebridge_api_types::{InventoryStatusResponse, RefreshResponse};
use tracing::info;

use crate::application::error::ErrorReport;

use super::{AdminState, ApiError, codes};

pub(super) async fn inventory_status(
    State(state): State<AdminState>,
) -> Result<Json<InventoryStatusResponse>, ApiError> {
    let status = state.catalog.status().await?;
    Ok(Json(InventoryStatusResponse {
        item_count: status.item_count,
        last_synced_at: status.last_synced_at,
        stale: status.stale,
        refresh_in_progress: state.coordinator.is_running(),
    }))
}

pub(super) async fn refresh_inventory(
    State(state): State<AdminState>,
) -> Result<Json<RefreshResponse>, ApiError> {
    info!(
        target = "sagebridge::http::admin",
        "Manual inventory refresh requested"
    );
    // Runs detached: dropping the request must not cancel the cycle.
    let coordinator = state.coordinator.clone();
    let shutdown = state.shutdown.clone();
    let cycle = tokio::spawn(async move { coordinator.run_cycle(&shutdown).await });
    let outcome = cycle.await.map_err(|err| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REFRESH_FAILED,
            "Inventory refresh failed",
            None,
        )
        .caused_by(&err)
    })??;
    Ok(Json(RefreshResponse {
        items: outcome.items,
        synced_at: outcome.synced_at,
        elapsed_ms: u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX),
    }))
}

pub(super) async fn health(State(state): State<AdminState>) -> Response {
    match state.store.check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = ApiError::unavailable(
                codes::STORE_UNHEALTHY,
                "Inventory store is unreachable",
                30,
            )
            .into_response();
            ErrorReport::from_error(
                "infra::http::admin::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use rust_decimal::Decimal;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    use crate::application::{
        catalog::ProductCatalogService,
        clock::SystemClock,
        jobs::{RefreshCoordinator, SharedRefreshScope},
        repos::InventoryCacheRepo,
        shutdown::shutdown_channel,
        source::{InventorySource, SourceError},
    };
    use crate::domain::inventory::{InsertBatching, SourceProduct};
    use crate::infra::http::{StoreHealth, build_admin_router};
    use crate::infra::memory::InMemoryInventoryCache;

    use super::*;

    /// Blocks the fetch until the test releases it.
    #[derive(Default)]
    struct GatedSource {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl InventorySource for GatedSource {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn fetch_products(&self) -> Result<Vec<SourceProduct>, SourceError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(vec![SourceProduct {
                sku: "A".to_string(),
                name: "A".to_string(),
                description: String::new(),
                unit_price: Decimal::new(1000, 2),
                quantity_on_hand: 5,
            }])
        }
    }

    #[tokio::test]
    async fn refresh_survives_client_disconnect() {
        let source = Arc::new(GatedSource::default());
        let repo = Arc::new(InMemoryInventoryCache::new());
        let clock = Arc::new(SystemClock);
        let scope = SharedRefreshScope::new(
            source.clone(),
            repo.clone(),
            clock.clone(),
            InsertBatching::Single,
        );
        let coordinator = Arc::new(RefreshCoordinator::new(Arc::new(scope), None));
        let (_shutdown, signal) = shutdown_channel();
        let router = build_admin_router(AdminState {
            catalog: ProductCatalogService::new(repo.clone(), clock, None),
            coordinator: coordinator.clone(),
            shutdown: signal,
            store: StoreHealth::InMemory,
        });

        {
            let request = router.oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/inventory/refresh")
                    .body(Body::empty())
                    .unwrap(),
            );
            tokio::pin!(request);
            tokio::select! {
                _ = &mut request => panic!("refresh finished before the source was released"),
                () = source.started.notified() => {}
            }
        }

        source.release.notify_one();
        tokio::time::timeout(Duration::from_secs(5), async {
            while coordinator.is_running() || repo.count_items().await.unwrap() == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("detached refresh completes");

        assert_eq!(repo.count_items().await.unwrap(), 1);
    }
}
