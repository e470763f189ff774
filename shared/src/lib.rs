//! Shared types and ledger logic for the Acopio produce depot
//!
//! This crate contains the domain models, the exact-decimal arithmetic and
//! the pure balance folds shared between the backend and the browser (via
//! WASM). It performs no I/O.

pub mod decimal;
pub mod ledger;
pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
