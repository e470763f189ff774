//! Produce SKUs and their on-hand stock

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::lenient;

/// A produce variety tracked in kilograms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Net mass on hand in kg, as currently stored
    #[serde(default, deserialize_with = "lenient::amount")]
    pub stock: Decimal,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, stock: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stock,
        }
    }
}

/// Whole-value stock overwrite sent to the persistence API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStockUpdate {
    /// Sent as a JSON number, which is what the entity API stores
    #[serde(with = "rust_decimal::serde::float")]
    pub stock: Decimal,
}
