//! Client for the generic entity API that holds the depot's records
//!
//! Collections are listed with `GET {base}/entities/{Entity}?limit=&skip=` and
//! single records are read and updated at `{base}/entities/{Entity}/{id}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::decimal::round2;
use shared::models::{
    Container, ContainerStockUpdate, Counterparty, MovementDocument, OutboundShipment, Product,
    ProductStockUpdate,
};
use shared::types::{Page, PageRequest};

use crate::config::EntityApiConfig;
use crate::error::{AppError, AppResult};
use crate::services::ledger_store::LedgerStore;

const PRODUCTS: &str = "Product";
const CONTAINERS: &str = "Container";
const MOVEMENTS: &str = "Movement";
const SHIPMENTS: &str = "OutboundShipment";
const COUNTERPARTIES: &str = "Counterparty";

/// Entity API client
#[derive(Clone)]
pub struct EntityApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl EntityApiClient {
    pub fn new(config: &EntityApiConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, entity: &str) -> String {
        format!("{}/entities/{}", self.base_url, entity)
    }

    fn record_url(&self, entity: &str, id: &str) -> String {
        format!("{}/entities/{}/{}", self.base_url, entity, id)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> AppResult<Response> {
        let response = request
            .header("api_key", &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::TransientIo(format!("{} request failed: {}", what, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, what, &body))
    }

    /// One page of a collection, decoding rows one at a time.
    ///
    /// Rows that fail to decode are logged and dropped but still count as
    /// fetched, so pagination keeps going past them and the pass can tell the
    /// history is incomplete.
    async fn list<T: DeserializeOwned>(&self, entity: &str, page: PageRequest) -> AppResult<Page<T>> {
        let request = self
            .client
            .get(self.collection_url(entity))
            .query(&[("limit", page.limit as u64), ("skip", page.offset)]);
        let rows: Vec<serde_json::Value> = self
            .send(request, entity)
            .await?
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Unreadable {} page: {}", entity, e)))?;

        let fetched = rows.len();
        let mut records = Vec::with_capacity(fetched);
        for row in rows {
            let id = row.get("id").and_then(|v| v.as_str()).unwrap_or("?").to_string();
            match serde_json::from_value::<T>(row) {
                Ok(record) => records.push(record),
                Err(err) => tracing::warn!(entity, id = %id, error = %err, "Skipping undecodable record"),
            }
        }
        tracing::debug!(entity, offset = page.offset, fetched, "Page fetched");
        Ok(Page { records, fetched })
    }

    async fn get<T: DeserializeOwned>(&self, entity: &str, id: &str) -> AppResult<T> {
        let request = self.client.get(self.record_url(entity, id));
        self.send(request, entity)
            .await?
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Unreadable {} {}: {}", entity, id, e)))
    }

    async fn put<B: Serialize + Sync>(&self, entity: &str, id: &str, body: &B) -> AppResult<()> {
        let request = self.client.put(self.record_url(entity, id)).json(body);
        self.send(request, entity).await?;
        Ok(())
    }
}

fn status_error(status: StatusCode, what: &str, body: &str) -> AppError {
    if status == StatusCode::NOT_FOUND {
        AppError::NotFound(what.to_string())
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        AppError::TransientIo(format!("{} returned {}: {}", what, status, body))
    } else {
        AppError::ExternalService(format!("{} returned {}: {}", what, status, body))
    }
}

#[async_trait]
impl LedgerStore for EntityApiClient {
    async fn list_products(&self, page: PageRequest) -> AppResult<Page<Product>> {
        self.list(PRODUCTS, page).await
    }

    async fn list_containers(&self, page: PageRequest) -> AppResult<Page<Container>> {
        self.list(CONTAINERS, page).await
    }

    async fn list_movements(&self, page: PageRequest) -> AppResult<Page<MovementDocument>> {
        self.list(MOVEMENTS, page).await
    }

    async fn list_shipments(&self, page: PageRequest) -> AppResult<Page<OutboundShipment>> {
        self.list(SHIPMENTS, page).await
    }

    async fn list_counterparties(&self, page: PageRequest) -> AppResult<Page<Counterparty>> {
        self.list(COUNTERPARTIES, page).await
    }

    /// The API has no conditional update, so the record is re-read first and
    /// the write is skipped when its stock has moved.
    async fn update_product_stock(
        &self,
        id: &str,
        expected: Decimal,
        update: ProductStockUpdate,
    ) -> AppResult<()> {
        let current: Product = self.get(PRODUCTS, id).await?;
        if round2(current.stock) != round2(expected) {
            return Err(AppError::ConcurrentModification {
                entity: PRODUCTS.to_string(),
                id: id.to_string(),
            });
        }
        self.put(PRODUCTS, id, &update).await
    }

    async fn update_container_stock(
        &self,
        id: &str,
        expected: ContainerStockUpdate,
        update: ContainerStockUpdate,
    ) -> AppResult<()> {
        let current: Container = self.get(CONTAINERS, id).await?;
        if current.occupied_stock != expected.occupied_stock
            || current.empty_stock != expected.empty_stock
        {
            return Err(AppError::ConcurrentModification {
                entity: CONTAINERS.to_string(),
                id: id.to_string(),
            });
        }
        self.put(CONTAINERS, id, &update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> EntityApiConfig {
        EntityApiConfig {
            base_url: base_url.to_string(),
            api_key: "key".to_string(),
            page_size: 100,
            max_pages: 10,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_urls_trim_trailing_slash() {
        let client = EntityApiClient::new(&config("https://api.example.com/apps/acopio/")).unwrap();
        assert_eq!(
            client.collection_url(PRODUCTS),
            "https://api.example.com/apps/acopio/entities/Product"
        );
        assert_eq!(
            client.record_url(CONTAINERS, "bin-a"),
            "https://api.example.com/apps/acopio/entities/Container/bin-a"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, "Product", ""),
            AppError::TransientIo(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "Product", ""),
            AppError::TransientIo(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "Product", ""),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "Product", "bad"),
            AppError::ExternalService(_)
        ));
    }
}
