//! Ledger folds: balances derived from the full transaction history

mod balances;
mod custody;
mod history;
mod holdings;
mod stock;

pub use balances::*;
pub use custody::*;
pub use history::*;
pub use holdings::*;
pub use stock::*;
