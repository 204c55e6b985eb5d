use std::error::Error as StdError;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

use crate::application::{
    catalog::{CatalogError, UnavailableReason},
    error::ErrorReport,
    jobs::RefreshError,
    quotes::QuoteError,
    repos::RepoError,
};
use crate::domain::error::DomainError;

const REPORT_SOURCE: &str = "infra::http::error";
const UNAVAILABLE_RETRY_SECS: u64 = 60;
const STALE_RETRY_SECS: u64 = 300;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const VALIDATION: &str = "validation_failed";
    pub const UNKNOWN_PRODUCT: &str = "unknown_product";
    pub const INVENTORY_UNAVAILABLE: &str = "inventory_unavailable";
    pub const INVENTORY_STALE: &str = "inventory_stale";
    pub const REFRESH_IN_PROGRESS: &str = "refresh_in_progress";
    pub const REFRESH_FAILED: &str = "refresh_failed";
    pub const SOURCE_FAILED: &str = "source_failed";
    pub const SHUTTING_DOWN: &str = "shutting_down";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const STORE_UNHEALTHY: &str = "store_unhealthy";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// JSON error response; internal detail travels in an [`ErrorReport`] only.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    retry_after: Option<u64>,
    cause: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            retry_after: None,
            cause: None,
        }
    }

    pub fn bad_request(code: &'static str, message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message, hint)
    }

    pub fn unavailable(code: &'static str, message: &'static str, retry_after: u64) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, code, message, None).retry_after(retry_after)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    fn retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub(super) fn caused_by(mut self, error: &dyn StdError) -> Self {
        self.cause = Some(ErrorReport::from_error(REPORT_SOURCE, self.status, error));
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.cause.unwrap_or_else(|| {
            ErrorReport::from_message(
                REPORT_SOURCE,
                self.status,
                format!("{}: {}", self.code, self.hint.as_deref().unwrap_or(self.message)),
            )
        });
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };

        let mut response = (self.status, Json(body)).into_response();
        if let Some(seconds) = self.retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(seconds));
        }
        report.attach(&mut response);
        response
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let api = match &err {
            CatalogError::Unavailable { reason, .. } => {
                let api = ApiError::unavailable(
                    codes::INVENTORY_UNAVAILABLE,
                    "Inventory is not available yet",
                    UNAVAILABLE_RETRY_SECS,
                );
                match reason {
                    UnavailableReason::StoreFailure => api,
                    other => api.with_hint(other.to_string()),
                }
            }
            CatalogError::Stale { last_synced_at, .. } => {
                let api = ApiError::unavailable(
                    codes::INVENTORY_STALE,
                    "Inventory data is out of date",
                    STALE_RETRY_SECS,
                );
                match last_synced_at.format(&Rfc3339) {
                    Ok(at) => api.with_hint(format!("last synchronized at {at}")),
                    Err(_) => api,
                }
            }
        };
        api.caused_by(&err)
    }
}

impl From<QuoteError> for ApiError {
    fn from(err: QuoteError) -> Self {
        match err {
            QuoteError::Catalog(err) => err.into(),
            QuoteError::Domain(DomainError::Validation { message }) => ApiError::bad_request(
                codes::VALIDATION,
                "Quote request is invalid",
                Some(message),
            ),
            QuoteError::Domain(DomainError::UnknownProduct { sku }) => ApiError::bad_request(
                codes::UNKNOWN_PRODUCT,
                "Quote references an unknown product",
                Some(sku),
            ),
        }
    }
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        let api = match &err {
            RefreshError::AlreadyRunning => ApiError::new(
                StatusCode::CONFLICT,
                codes::REFRESH_IN_PROGRESS,
                "An inventory refresh is already running",
                None,
            ),
            RefreshError::Cancelled => ApiError::unavailable(
                codes::SHUTTING_DOWN,
                "Service is shutting down",
                UNAVAILABLE_RETRY_SECS,
            ),
            RefreshError::TimedOut(limit) => ApiError::new(
                StatusCode::GATEWAY_TIMEOUT,
                codes::REFRESH_FAILED,
                "Inventory refresh timed out",
                Some(format!("cycle exceeded {}s", limit.as_secs())),
            ),
            RefreshError::Source(_) => ApiError::new(
                StatusCode::BAD_GATEWAY,
                codes::SOURCE_FAILED,
                "Inventory source could not be read",
                None,
            ),
            RefreshError::Replace(_) | RefreshError::Scope(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::REFRESH_FAILED,
                "Inventory refresh failed",
                None,
            ),
        };
        api.caused_by(&err)
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        let api = match &err {
            RepoError::Timeout => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::DB_TIMEOUT,
                "Database timeout",
                None,
            ),
            _ => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::REPO,
                "Persistence error",
                None,
            ),
        };
        api.caused_by(&err)
    }
}
