//! Reusable crate/bin types and their custody counters

use serde::{Deserialize, Serialize};

use crate::decimal::lenient;

/// A reusable container type (crate, bin, tote)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    #[serde(default, alias = "name")]
    pub container_type: String,
    /// Units out in the field, full of produce
    #[serde(default, deserialize_with = "lenient::count")]
    pub occupied_stock: i64,
    /// Units in the depot, available for reuse
    #[serde(default, deserialize_with = "lenient::count")]
    pub empty_stock: i64,
}

impl Container {
    pub fn new(
        id: impl Into<String>,
        container_type: impl Into<String>,
        occupied_stock: i64,
        empty_stock: i64,
    ) -> Self {
        Self {
            id: id.into(),
            container_type: container_type.into(),
            occupied_stock,
            empty_stock,
        }
    }
}

/// Combined counter overwrite; both values always travel together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStockUpdate {
    pub occupied_stock: i64,
    pub empty_stock: i64,
}

/// One container line inside a movement document or a shipment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerLine {
    #[serde(default, deserialize_with = "lenient::reference")]
    pub container_id: String,
    /// Units returned to / received by the depot
    #[serde(default, deserialize_with = "lenient::count")]
    pub quantity_in: i64,
    /// Units delivered out to the counterparty
    #[serde(default, deserialize_with = "lenient::count")]
    pub quantity_out: i64,
    /// Shipment lines only: the incoming unit still holds produce
    #[serde(default, deserialize_with = "lenient::flag")]
    pub returned_full: bool,
}

impl ContainerLine {
    pub fn new(container_id: impl Into<String>, quantity_in: i64, quantity_out: i64) -> Self {
        Self {
            container_id: container_id.into(),
            quantity_in,
            quantity_out,
            returned_full: false,
        }
    }

    pub fn returned_full(mut self, full: bool) -> Self {
        self.returned_full = full;
        self
    }
}
