//! Reconciliation services for the Acopio ledger

pub mod container_reconciliation;
pub mod corrector;
pub mod counterparty_audit;
pub mod history;
pub mod ledger_store;
pub mod reconciliation;
pub mod run_tracker;
pub mod stock_reconciliation;
pub mod task_group;

pub use container_reconciliation::ContainerReconciler;
pub use corrector::Corrector;
pub use history::HistoryReader;
pub use ledger_store::{InMemoryLedgerStore, LedgerStore};
pub use reconciliation::{ReconciliationService, RunOutcome};
pub use run_tracker::{MemoryRunTracker, PgRunTracker, RunTracker};
pub use stock_reconciliation::StockReconciler;
pub use task_group::CancelHandle;
