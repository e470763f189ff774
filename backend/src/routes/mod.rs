//! Route definitions for the Acopio reconciliation service

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/reconciliation", reconciliation_routes())
}

/// Reconciliation routes
fn reconciliation_routes() -> Router<AppState> {
    Router::new()
        .route("/run", post(handlers::run_reconciliation))
        .route("/stock", post(handlers::reconcile_stock))
        .route("/containers", post(handlers::reconcile_containers))
        .route("/audit/counterparties", get(handlers::audit_counterparties))
        .route("/status", get(handlers::reconciliation_status))
}
