use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal_macros::dec;
use time::macros::datetime;

use sagebridge::application::catalog::{CatalogError, ProductCatalogService, UnavailableReason};
use sagebridge::application::clock::FixedClock;
use sagebridge::application::jobs::{RefreshCoordinator, RefreshError, SharedRefreshScope};
use sagebridge::application::repos::InventoryCacheRepo;
use sagebridge::application::shutdown::shutdown_channel;
use sagebridge::application::source::{InventorySource, SourceError};
use sagebridge::domain::inventory::{InsertBatching, Product, SourceProduct};
use sagebridge::infra::memory::InMemoryInventoryCache;

/// Source whose catalog can be swapped between cycles.
#[derive(Default)]
struct ScriptedSource {
    next: Mutex<Option<Result<Vec<SourceProduct>, SourceError>>>,
}

impl ScriptedSource {
    fn serve(&self, result: Result<Vec<SourceProduct>, SourceError>) {
        *self.next.lock().unwrap() = Some(result);
    }
}

#[async_trait]
impl InventorySource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_products(&self) -> Result<Vec<SourceProduct>, SourceError> {
        self.next
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn source_product(sku: &str, price: rust_decimal::Decimal, quantity_on_hand: i32) -> SourceProduct {
    SourceProduct {
        sku: sku.to_string(),
        name: format!("Product {sku}"),
        description: String::new(),
        unit_price: price,
        quantity_on_hand,
    }
}

struct Harness {
    source: Arc<ScriptedSource>,
    repo: Arc<InMemoryInventoryCache>,
    clock: Arc<FixedClock>,
    coordinator: RefreshCoordinator,
    catalog: ProductCatalogService,
}

fn harness(batch_size: i64) -> Harness {
    let source = Arc::new(ScriptedSource::default());
    let repo = Arc::new(InMemoryInventoryCache::new());
    let clock = Arc::new(FixedClock::new(datetime!(2024-03-01 02:00 UTC)));
    let scope = SharedRefreshScope::new(
        source.clone(),
        repo.clone(),
        clock.clone(),
        InsertBatching::from_size(batch_size),
    );
    let coordinator = RefreshCoordinator::new(Arc::new(scope), None);
    let catalog = ProductCatalogService::new(
        repo.clone(),
        clock.clone(),
        Some(time::Duration::hours(24)),
    );

    Harness {
        source,
        repo,
        clock,
        coordinator,
        catalog,
    }
}

#[tokio::test]
async fn refreshed_catalog_is_served_to_readers() {
    let h = harness(1);
    let (_shutdown, signal) = shutdown_channel();
    h.source.serve(Ok(vec![source_product("A", dec!(10), 5)]));

    let outcome = h.coordinator.run_cycle(&signal).await.expect("refresh");

    assert_eq!(outcome.items, 1);
    assert_eq!(outcome.synced_at, datetime!(2024-03-01 02:00 UTC));
    assert_eq!(
        h.catalog.list_products().await.expect("products"),
        vec![Product {
            id: "A".into(),
            name: "Product A".into(),
            description: String::new(),
            price: dec!(10),
            quantity_on_hand: 5,
        }]
    );
}

#[tokio::test]
async fn empty_source_empties_cache_and_reads_become_unavailable() {
    let h = harness(1);
    let (_shutdown, signal) = shutdown_channel();
    h.source.serve(Ok(vec![source_product("A", dec!(10), 5)]));
    h.coordinator.run_cycle(&signal).await.expect("first refresh");

    h.source.serve(Ok(Vec::new()));
    let outcome = h.coordinator.run_cycle(&signal).await.expect("second refresh");

    assert_eq!(outcome.items, 0);
    assert_eq!(h.repo.count_items().await.unwrap(), 0);
    let err = h.catalog.list_products().await.unwrap_err();
    assert!(matches!(
        err,
        CatalogError::Unavailable {
            reason: UnavailableReason::Empty,
            ..
        }
    ));
}

#[tokio::test]
async fn failed_cycle_keeps_serving_previous_snapshot() {
    let h = harness(2);
    let (_shutdown, signal) = shutdown_channel();
    h.source.serve(Ok(vec![
        source_product("A", dec!(10), 5),
        source_product("B", dec!(2.5), 1),
        source_product("C", dec!(7.125), 9),
    ]));
    h.coordinator.run_cycle(&signal).await.expect("seed");
    let before = h.catalog.list_products().await.expect("before");

    h.clock.advance(time::Duration::hours(1));
    h.source.serve(Err(SourceError::unreachable("erp", "connection refused")));
    let err = h.coordinator.run_cycle(&signal).await.unwrap_err();

    assert!(matches!(err, RefreshError::Source(_)));
    assert_eq!(h.catalog.list_products().await.expect("after"), before);
    assert_eq!(before[2].price, dec!(7.13));
}

#[tokio::test]
async fn snapshot_goes_stale_without_a_successful_cycle() {
    let h = harness(0);
    let (_shutdown, signal) = shutdown_channel();
    h.source.serve(Ok(vec![source_product("A", dec!(10), 5)]));
    h.coordinator.run_cycle(&signal).await.expect("seed");

    h.clock.advance(time::Duration::hours(25));

    let err = h.catalog.list_products().await.unwrap_err();
    assert!(matches!(err, CatalogError::Stale { .. }));
    let status = h.catalog.status().await.expect("status");
    assert!(status.stale);
    assert_eq!(status.item_count, 1);
}
