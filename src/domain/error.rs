use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("product `{sku}` is not in the cached catalog")]
    UnknownProduct { sku: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn unknown_product(sku: impl Into<String>) -> Self {
        Self::UnknownProduct { sku: sku.into() }
    }
}
