use std::sync::Arc;

use crate::application::{
    catalog::ProductCatalogService, jobs::RefreshCoordinator, quotes::QuotePricingService,
    shutdown::ShutdownSignal,
};
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct ApiState {
    pub catalog: ProductCatalogService,
    pub quotes: QuotePricingService,
}

#[derive(Clone)]
pub struct AdminState {
    pub catalog: ProductCatalogService,
    pub coordinator: Arc<RefreshCoordinator>,
    pub shutdown: ShutdownSignal,
    pub store: StoreHealth,
}

/// Backing store probed by the admin health endpoint.
#[derive(Clone)]
pub enum StoreHealth {
    Postgres(PostgresRepositories),
    InMemory,
}

impl StoreHealth {
    pub async fn check(&self) -> Result<(), sqlx::Error> {
        match self {
            Self::Postgres(repositories) => repositories.health_check().await,
            Self::InMemory => Ok(()),
        }
    }
}
