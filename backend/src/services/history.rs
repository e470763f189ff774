//! History reader: loads whole record collections through exhaustive pagination
//!
//! A balance fold is only correct over *every* event ever recorded, so each
//! collection is read page after page until the API returns an empty page, or
//! a page shorter than one it already returned. Running into the page ceiling
//! is an error, never a silent cut.

use std::future::Future;
use std::sync::Arc;

use shared::models::{Container, Counterparty, MovementDocument, OutboundShipment, Product};
use shared::types::{Page, PageRequest};
use shared::validation::{movement_issues, shipment_issues};

use crate::error::{AppError, AppResult};
use crate::services::ledger_store::LedgerStore;

/// Records read from one collection
#[derive(Debug, Clone)]
pub struct Collection<T> {
    pub records: Vec<T>,
    pub pages: u32,
    /// Rows the adapter received but could not decode
    pub rejected: usize,
}

/// Request pages until the collection is exhausted.
///
/// The next offset advances by the rows actually received. A server that caps
/// pages below `page_size` is walked to the end: its largest page is taken as
/// the real page size, and the walk stops at a page shorter than that or at an
/// empty page.
pub async fn fetch_all_pages<T, F, Fut>(
    collection: &str,
    page_size: u32,
    max_pages: u32,
    mut fetch_page: F,
) -> AppResult<Collection<T>>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = AppResult<Page<T>>>,
{
    if page_size == 0 {
        return Err(AppError::Configuration(
            "entity_api.page_size must be at least 1".to_string(),
        ));
    }

    let mut request = PageRequest::first(page_size);
    let mut records = Vec::new();
    let mut rejected = 0;
    let mut pages = 0;
    let mut largest_page = 0;

    loop {
        if pages >= max_pages {
            return Err(AppError::HistoryTooLarge {
                collection: collection.to_string(),
                max_pages,
            });
        }
        let page = fetch_page(request).await?;
        pages += 1;

        let fetched = page.fetched;
        rejected += fetched.saturating_sub(page.records.len());
        records.extend(page.records);

        if request.is_last(fetched, largest_page) {
            break;
        }
        largest_page = largest_page.max(fetched);
        request = request.next(fetched);
    }

    tracing::debug!(collection, pages, records = records.len(), rejected, "Collection loaded");
    Ok(Collection {
        records,
        pages,
        rejected,
    })
}

/// Full history plus the rosters being reconciled
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub products: Vec<Product>,
    pub containers: Vec<Container>,
    pub movements: Vec<MovementDocument>,
    pub shipments: Vec<OutboundShipment>,
    /// Rows dropped across all collections because they could not be decoded
    pub rejected_records: usize,
}

/// Reads complete collections from a [`LedgerStore`]
#[derive(Clone)]
pub struct HistoryReader {
    store: Arc<dyn LedgerStore>,
    page_size: u32,
    max_pages: u32,
}

impl HistoryReader {
    pub fn new(store: Arc<dyn LedgerStore>, page_size: u32, max_pages: u32) -> Self {
        Self {
            store,
            page_size,
            max_pages,
        }
    }

    pub async fn products(&self) -> AppResult<Collection<Product>> {
        let store = &self.store;
        fetch_all_pages("products", self.page_size, self.max_pages, move |page| {
            store.list_products(page)
        })
        .await
    }

    pub async fn containers(&self) -> AppResult<Collection<Container>> {
        let store = &self.store;
        fetch_all_pages("containers", self.page_size, self.max_pages, move |page| {
            store.list_containers(page)
        })
        .await
    }

    pub async fn movements(&self) -> AppResult<Collection<MovementDocument>> {
        let store = &self.store;
        let collection = fetch_all_pages("movements", self.page_size, self.max_pages, move |page| {
            store.list_movements(page)
        })
        .await?;
        for document in &collection.records {
            for issue in movement_issues(document) {
                tracing::warn!(document_id = %document.id, "Movement document: {}", issue);
            }
        }
        Ok(collection)
    }

    pub async fn shipments(&self) -> AppResult<Collection<OutboundShipment>> {
        let store = &self.store;
        let collection = fetch_all_pages("shipments", self.page_size, self.max_pages, move |page| {
            store.list_shipments(page)
        })
        .await?;
        for shipment in &collection.records {
            for issue in shipment_issues(shipment) {
                tracing::warn!(shipment_id = %shipment.id, "Shipment: {}", issue);
            }
        }
        Ok(collection)
    }

    pub async fn counterparties(&self) -> AppResult<Collection<Counterparty>> {
        let store = &self.store;
        fetch_all_pages("counterparties", self.page_size, self.max_pages, move |page| {
            store.list_counterparties(page)
        })
        .await
    }

    /// Read rosters and the whole history, each collection to exhaustion
    pub async fn load(&self) -> AppResult<LedgerSnapshot> {
        let products = self.products().await?;
        let containers = self.containers().await?;
        let movements = self.movements().await?;
        let shipments = self.shipments().await?;

        let rejected_records =
            products.rejected + containers.rejected + movements.rejected + shipments.rejected;
        if rejected_records > 0 {
            tracing::warn!(rejected_records, "Some records could not be decoded and were skipped");
        }

        tracing::info!(
            products = products.records.len(),
            containers = containers.records.len(),
            movements = movements.records.len(),
            shipments = shipments.records.len(),
            "Ledger history loaded"
        );

        Ok(LedgerSnapshot {
            products: products.records,
            containers: containers.records,
            movements: movements.records,
            shipments: shipments.records,
            rejected_records,
        })
    }
}
