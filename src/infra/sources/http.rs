use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, error};

use crate::{
    application::source::{InventorySource, SourceError},
    config::HttpSourceSettings,
    domain::inventory::SourceProduct,
    infra::error::InfraError,
};

use super::parse_catalog;

const SOURCE_NAME: &str = "sage-http";
const PRODUCTS_PATH: &str = "inventory/products";

/// Client for the ERP gateway's inventory endpoint.
#[derive(Debug, Clone)]
pub struct HttpInventorySource {
    client: Client,
    endpoint: Url,
    api_token: Option<String>,
}

impl HttpInventorySource {
    pub fn new(settings: &HttpSourceSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("sagebridge/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::source(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            endpoint: products_endpoint(&settings.base_url)?,
            api_token: settings.api_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn products_endpoint(base_url: &Url) -> Result<Url, InfraError> {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(PRODUCTS_PATH)
        .map_err(|err| InfraError::source(format!("invalid inventory endpoint: {err}")))
}

#[async_trait]
impl InventorySource for HttpInventorySource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch_products(&self) -> Result<Vec<SourceProduct>, SourceError> {
        let mut request = self.client.get(self.endpoint.clone());
        if let Some(token) = self.api_token.as_ref() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|err| {
            error!(
                target = "sagebridge::infra::sources::http",
                endpoint = %self.endpoint,
                error = %err,
                "Failed to retrieve inventory from ERP gateway"
            );
            SourceError::unreachable(SOURCE_NAME, err.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                target = "sagebridge::infra::sources::http",
                endpoint = %self.endpoint,
                status = status.as_u16(),
                "ERP gateway rejected inventory request"
            );
            return Err(SourceError::Status {
                source_name: SOURCE_NAME,
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| SourceError::unreachable(SOURCE_NAME, err.to_string()))?;
        let products = parse_catalog(&bytes)
            .map_err(|err| SourceError::malformed(SOURCE_NAME, err.to_string()))?;

        debug!(
            target = "sagebridge::infra::sources::http",
            items = products.len(),
            "Fetched inventory from ERP gateway"
        );
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{Router, http::HeaderMap, http::StatusCode, routing::get};
    use rust_decimal_macros::dec;

    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        Url::parse(&format!("http://{addr}/gateway")).expect("url")
    }

    fn settings(base_url: Url, api_token: Option<&str>) -> HttpSourceSettings {
        HttpSourceSettings {
            base_url,
            api_token: api_token.map(str::to_string),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let base = Url::parse("https://erp.example.com/gateway").unwrap();
        let source = HttpInventorySource::new(&settings(base, None)).unwrap();
        assert_eq!(
            source.endpoint().as_str(),
            "https://erp.example.com/gateway/inventory/products"
        );
    }

    #[tokio::test]
    async fn fetches_products_with_bearer_token() {
        let router = Router::new().route(
            "/gateway/inventory/products",
            get(|headers: HeaderMap| async move {
                if headers
                    .get("authorization")
                    .and_then(|value| value.to_str().ok())
                    != Some("Bearer secret")
                {
                    return (StatusCode::UNAUTHORIZED, String::new());
                }
                (
                    StatusCode::OK,
                    r#"[{"stockCode":"SKU-1","name":"Widget","description":"","unitPrice":10,"quantityOnHand":5}]"#
                        .to_string(),
                )
            }),
        );
        let base = serve(router).await;

        let source = HttpInventorySource::new(&settings(base, Some("secret"))).unwrap();
        let products = source.fetch_products().await.expect("fetch");

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].unit_price, dec!(10));
        assert_eq!(products[0].quantity_on_hand, 5);
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let router = Router::new().route(
            "/gateway/inventory/products",
            get(|| async { StatusCode::BAD_GATEWAY }),
        );
        let base = serve(router).await;

        let source = HttpInventorySource::new(&settings(base, None)).unwrap();
        let err = source.fetch_products().await.unwrap_err();

        assert!(matches!(err, SourceError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn malformed_payload_is_reported() {
        let router = Router::new().route(
            "/gateway/inventory/products",
            get(|| async { "{\"not\":\"a list\"}" }),
        );
        let base = serve(router).await;

        let source = HttpInventorySource::new(&settings(base, None)).unwrap();
        let err = source.fetch_products().await.unwrap_err();

        assert!(matches!(err, SourceError::Malformed { .. }));
    }
}
