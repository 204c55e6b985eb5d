//! Boundary to the ERP product catalog.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::inventory::SourceProduct;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("inventory source `{source_name}` is unreachable: {message}")]
    Unreachable {
        source_name: &'static str,
        message: String,
    },
    #[error("inventory source `{source_name}` answered with status {status}")]
    Status { source_name: &'static str, status: u16 },
    #[error("inventory source `{source_name}` returned malformed data: {message}")]
    Malformed {
        source_name: &'static str,
        message: String,
    },
}

impl SourceError {
    pub fn unreachable(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Unreachable {
            source_name,
            message: message.into(),
        }
    }

    pub fn malformed(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            source_name,
            message: message.into(),
        }
    }
}

/// Capability to fetch the authoritative product list.
///
/// Implementations are chosen at process wiring time (ERP gateway client,
/// static catalog, test doubles).
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &'static str;

    async fn fetch_products(&self) -> Result<Vec<SourceProduct>, SourceError>;
}
