//! Persistence port for ledger records
//!
//! The reconciliation engines read products, containers and history through
//! [`LedgerStore`] and write back only the two derived aggregates. The HTTP
//! adapter lives in `external::entity_api`; [`InMemoryLedgerStore`] backs tests
//! and local runs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::decimal::round2;
use shared::models::{
    Container, ContainerStockUpdate, Counterparty, MovementDocument, OutboundShipment, Product,
    ProductStockUpdate,
};
use shared::types::{Page, PageRequest};

use crate::error::{AppError, AppResult};

/// Record collections and targeted writes used by reconciliation
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn list_products(&self, page: PageRequest) -> AppResult<Page<Product>>;

    async fn list_containers(&self, page: PageRequest) -> AppResult<Page<Container>>;

    async fn list_movements(&self, page: PageRequest) -> AppResult<Page<MovementDocument>>;

    async fn list_shipments(&self, page: PageRequest) -> AppResult<Page<OutboundShipment>>;

    async fn list_counterparties(&self, page: PageRequest) -> AppResult<Page<Counterparty>>;

    /// Overwrite a product's stock.
    ///
    /// `expected` is the stock observed when the fold started; adapters that
    /// can check it reject the write with `ConcurrentModification` when the
    /// stored value has moved since.
    async fn update_product_stock(
        &self,
        id: &str,
        expected: Decimal,
        update: ProductStockUpdate,
    ) -> AppResult<()>;

    /// Overwrite both custody counters of a container in one write
    async fn update_container_stock(
        &self,
        id: &str,
        expected: ContainerStockUpdate,
        update: ContainerStockUpdate,
    ) -> AppResult<()>;
}

#[derive(Debug, Default)]
struct MemoryState {
    products: Vec<Product>,
    containers: Vec<Container>,
    movements: Vec<MovementDocument>,
    shipments: Vec<OutboundShipment>,
    counterparties: Vec<Counterparty>,
    failing_writes: HashSet<String>,
    offline: bool,
    page_requests: HashMap<&'static str, usize>,
    undecodable: HashMap<&'static str, usize>,
    writes: usize,
}

/// Ledger store held in memory.
///
/// Enforces a server-side page ceiling like the real entity API, and can be
/// told to fail writes for given ids or to go offline entirely.
#[derive(Debug, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
    page_ceiling: usize,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::with_page_ceiling(1000)
    }

    pub fn with_page_ceiling(page_ceiling: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            page_ceiling: page_ceiling.max(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panicked test thread must not wedge the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_product(&self, product: Product) {
        self.state().products.push(product);
    }

    pub fn insert_container(&self, container: Container) {
        self.state().containers.push(container);
    }

    pub fn insert_movement(&self, movement: MovementDocument) {
        self.state().movements.push(movement);
    }

    pub fn insert_shipment(&self, shipment: OutboundShipment) {
        self.state().shipments.push(shipment);
    }

    pub fn insert_counterparty(&self, counterparty: Counterparty) {
        self.state().counterparties.push(counterparty);
    }

    /// Make every write to this id fail as if the API were unreachable
    pub fn fail_writes_for(&self, id: impl Into<String>) {
        self.state().failing_writes.insert(id.into());
    }

    /// Append rows to a collection that the adapter receives but cannot decode
    pub fn insert_undecodable(&self, collection: &'static str, rows: usize) {
        *self.state().undecodable.entry(collection).or_insert(0) += rows;
    }

    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    pub fn product(&self, id: &str) -> Option<Product> {
        self.state().products.iter().find(|p| p.id == id).cloned()
    }

    pub fn container(&self, id: &str) -> Option<Container> {
        self.state().containers.iter().find(|c| c.id == id).cloned()
    }

    /// Simulate an incremental adjustment made at transaction time
    pub fn adjust_product_stock(&self, id: &str, delta: Decimal) {
        if let Some(product) = self.state().products.iter_mut().find(|p| p.id == id) {
            product.stock = round2(product.stock + delta);
        }
    }

    pub fn page_requests(&self, collection: &'static str) -> usize {
        self.state().page_requests.get(collection).copied().unwrap_or(0)
    }

    pub fn write_count(&self) -> usize {
        self.state().writes
    }

    fn page_of<T: Clone>(
        &self,
        collection: &'static str,
        page: PageRequest,
        pick: impl FnOnce(&MemoryState) -> &Vec<T>,
    ) -> AppResult<Page<T>> {
        let mut state = self.state();
        if state.offline {
            return Err(AppError::TransientIo(format!("{} is offline", collection)));
        }
        *state.page_requests.entry(collection).or_insert(0) += 1;
        let rows = pick(&state);
        let total = rows.len() + state.undecodable.get(collection).copied().unwrap_or(0);
        let start = (page.offset as usize).min(total);
        let end = start + (page.limit as usize).min(self.page_ceiling).min(total - start);
        let records = rows
            .iter()
            .take(end)
            .skip(start)
            .cloned()
            .collect();
        Ok(Page {
            records,
            fetched: end - start,
        })
    }

    fn check_write(state: &MemoryState, id: &str) -> AppResult<()> {
        if state.offline || state.failing_writes.contains(id) {
            return Err(AppError::TransientIo(format!("write to {} failed", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn list_products(&self, page: PageRequest) -> AppResult<Page<Product>> {
        self.page_of("products", page, |s| &s.products)
    }

    async fn list_containers(&self, page: PageRequest) -> AppResult<Page<Container>> {
        self.page_of("containers", page, |s| &s.containers)
    }

    async fn list_movements(&self, page: PageRequest) -> AppResult<Page<MovementDocument>> {
        self.page_of("movements", page, |s| &s.movements)
    }

    async fn list_shipments(&self, page: PageRequest) -> AppResult<Page<OutboundShipment>> {
        self.page_of("shipments", page, |s| &s.shipments)
    }

    async fn list_counterparties(&self, page: PageRequest) -> AppResult<Page<Counterparty>> {
        self.page_of("counterparties", page, |s| &s.counterparties)
    }

    async fn update_product_stock(
        &self,
        id: &str,
        expected: Decimal,
        update: ProductStockUpdate,
    ) -> AppResult<()> {
        let mut state = self.state();
        Self::check_write(&state, id)?;
        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Product {}", id)))?;
        if round2(product.stock) != round2(expected) {
            return Err(AppError::ConcurrentModification {
                entity: "Product".to_string(),
                id: id.to_string(),
            });
        }
        product.stock = update.stock;
        state.writes += 1;
        Ok(())
    }

    async fn update_container_stock(
        &self,
        id: &str,
        expected: ContainerStockUpdate,
        update: ContainerStockUpdate,
    ) -> AppResult<()> {
        let mut state = self.state();
        Self::check_write(&state, id)?;
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Container {}", id)))?;
        if container.occupied_stock != expected.occupied_stock
            || container.empty_stock != expected.empty_stock
        {
            return Err(AppError::ConcurrentModification {
                entity: "Container".to_string(),
                id: id.to_string(),
            });
        }
        container.occupied_stock = update.occupied_stock;
        container.empty_stock = update.empty_stock;
        state.writes += 1;
        Ok(())
    }
}
