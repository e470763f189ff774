//! HTTP handlers for reconciliation endpoints

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::services::container_reconciliation::ContainerReconciliationSummary;
use crate::services::counterparty_audit::CounterpartyAuditSummary;
use crate::services::reconciliation::{ReconciliationStatus, ReconciliationSummary};
use crate::services::stock_reconciliation::StockReconciliationSummary;
use crate::AppState;

/// Run both engines now, regardless of the run marker
pub async fn run_reconciliation(
    State(state): State<AppState>,
) -> AppResult<Json<ReconciliationSummary>> {
    let summary = state.reconciliation.run().await?;
    Ok(Json(summary))
}

/// Recompute and correct product stock
pub async fn reconcile_stock(
    State(state): State<AppState>,
) -> AppResult<Json<StockReconciliationSummary>> {
    let summary = state.reconciliation.reconcile_stock().await?;
    Ok(Json(summary))
}

/// Recompute and correct container custody counters
pub async fn reconcile_containers(
    State(state): State<AppState>,
) -> AppResult<Json<ContainerReconciliationSummary>> {
    let summary = state.reconciliation.reconcile_containers().await?;
    Ok(Json(summary))
}

/// Compare counterparty container balances with history
pub async fn audit_counterparties(
    State(state): State<AppState>,
) -> AppResult<Json<CounterpartyAuditSummary>> {
    let summary = state.reconciliation.audit_counterparties().await?;
    Ok(Json(summary))
}

/// Whether the configured run key has completed, plus the last pass seen
pub async fn reconciliation_status(
    State(state): State<AppState>,
) -> AppResult<Json<ReconciliationStatus>> {
    let status = state.reconciliation.status().await?;
    Ok(Json(status))
}
