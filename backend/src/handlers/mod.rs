//! HTTP handlers

pub mod health;
pub mod reconciliation;

pub use health::*;
pub use reconciliation::*;
