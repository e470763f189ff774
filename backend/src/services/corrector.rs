//! Corrector: writes recomputed balances back to the persistence API

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::ledger::{CustodyDrift, StockDrift};
use shared::models::{Container, ContainerStockUpdate, Product, ProductStockUpdate};

use crate::error::AppResult;
use crate::services::ledger_store::LedgerStore;

/// Issues whole-value overwrites for drifted aggregates
#[derive(Clone)]
pub struct Corrector {
    store: Arc<dyn LedgerStore>,
}

impl Corrector {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Overwrite a product's stock with the recomputed value
    pub async fn correct_product(
        &self,
        product: &Product,
        drift: &StockDrift,
    ) -> AppResult<DateTime<Utc>> {
        self.store
            .update_product_stock(
                &product.id,
                drift.before,
                ProductStockUpdate { stock: drift.after },
            )
            .await?;

        tracing::info!(
            product_id = %product.id,
            product = %product.name,
            before = %drift.before,
            after = %drift.after,
            diff = %drift.diff,
            "Product stock corrected"
        );
        Ok(Utc::now())
    }

    /// Overwrite both custody counters of a container in a single write
    pub async fn correct_container(
        &self,
        container: &Container,
        drift: &CustodyDrift,
    ) -> AppResult<DateTime<Utc>> {
        let expected = ContainerStockUpdate {
            occupied_stock: drift.before_occupied,
            empty_stock: drift.before_empty,
        };
        let update = ContainerStockUpdate {
            occupied_stock: drift.after_occupied,
            empty_stock: drift.after_empty,
        };
        self.store
            .update_container_stock(&container.id, expected, update)
            .await?;

        tracing::info!(
            container_id = %container.id,
            container = %container.container_type,
            occupied = %format!("{} -> {}", drift.before_occupied, drift.after_occupied),
            empty = %format!("{} -> {}", drift.before_empty, drift.after_empty),
            "Container custody corrected"
        );
        Ok(Utc::now())
    }
}
