//! Reconciliation orchestrator
//!
//! Reads the whole history once per pass and hands it to both engines. The
//! automatic pass runs once per run key; on-demand passes always run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::container_reconciliation::{ContainerReconciler, ContainerReconciliationSummary};
use crate::services::corrector::Corrector;
use crate::services::counterparty_audit::{audit_counterparties, CounterpartyAuditSummary};
use crate::services::history::HistoryReader;
use crate::services::ledger_store::LedgerStore;
use crate::services::run_tracker::RunTracker;
use crate::services::stock_reconciliation::{StockReconciler, StockReconciliationSummary};
use crate::services::task_group::CancelHandle;

/// Result of a pass over both engines
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationSummary {
    pub run_id: Uuid,
    pub run_key: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
    pub stock: StockReconciliationSummary,
    pub containers: ContainerReconciliationSummary,
}

impl ReconciliationSummary {
    pub fn failures(&self) -> usize {
        self.stock.failures + self.containers.failures
    }

    pub fn skipped(&self) -> usize {
        self.stock.skipped + self.containers.skipped
    }

    /// Totals recorded with the run marker; per-entity reports are left out
    pub fn totals(&self) -> serde_json::Value {
        serde_json::json!({
            "run_id": self.run_id,
            "started_at": self.started_at,
            "finished_at": self.finished_at,
            "products_corrected": self.stock.corrected_count,
            "total_kg_adjusted": self.stock.total_kg_adjusted,
            "total_loss_recognized": self.stock.total_loss_recognized,
            "containers_corrected": self.containers.corrected_count,
            "total_units_adjusted": self.containers.total_units_adjusted,
            "deficits": self.stock.deficits + self.containers.deficits,
        })
    }
}

/// What `run_once` did
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    AlreadyRan { run_key: String },
    Completed(ReconciliationSummary),
}

/// Whether the configured run key has been completed
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationStatus {
    pub run_key: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub recorded_totals: Option<serde_json::Value>,
    pub last_summary: Option<ReconciliationSummary>,
}

/// Corrections are only written over fully decoded history
fn ensure_complete(rejected: usize) -> AppResult<()> {
    if rejected > 0 {
        tracing::error!(rejected, "History is incomplete; no corrections will be written");
        return Err(AppError::IncompleteHistory { rejected });
    }
    Ok(())
}

/// Runs reconciliation passes against a ledger store
#[derive(Clone)]
pub struct ReconciliationService {
    reader: HistoryReader,
    stock: StockReconciler,
    containers: ContainerReconciler,
    tracker: Arc<dyn RunTracker>,
    run_key: String,
    cancel: CancelHandle,
    pass_lock: Arc<Mutex<()>>,
    last_summary: Arc<RwLock<Option<ReconciliationSummary>>>,
}

impl ReconciliationService {
    pub fn new(store: Arc<dyn LedgerStore>, tracker: Arc<dyn RunTracker>, config: &Config) -> Self {
        let settings = &config.reconciliation;
        let corrector = Corrector::new(store.clone());
        Self {
            reader: HistoryReader::new(
                store,
                config.entity_api.page_size,
                config.entity_api.max_pages,
            ),
            stock: StockReconciler::new(
                corrector.clone(),
                settings.stock_tolerance_kg,
                settings.concurrency,
            ),
            containers: ContainerReconciler::new(corrector, settings.concurrency),
            tracker,
            run_key: settings.run_key.clone(),
            cancel: CancelHandle::new(),
            pass_lock: Arc::new(Mutex::new(())),
            last_summary: Arc::new(RwLock::new(None)),
        }
    }

    pub fn run_key(&self) -> &str {
        &self.run_key
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Stop launching new corrections; corrections already started finish
    pub fn cancel(&self) {
        tracing::info!("Reconciliation cancellation requested");
        self.cancel.cancel();
    }

    /// Run both engines over the full history, whether or not the run key is marked
    pub async fn run(&self) -> AppResult<ReconciliationSummary> {
        let _pass = self.pass_lock.lock().await;
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(%run_id, run_key = %self.run_key, "Reconciliation pass started");

        let snapshot = self.reader.load().await?;
        ensure_complete(snapshot.rejected_records)?;
        let stock = self
            .stock
            .reconcile_product_stock(
                &snapshot.products,
                &snapshot.movements,
                &snapshot.shipments,
                &self.cancel,
            )
            .await;
        let containers = self
            .containers
            .reconcile_container_custody(
                &snapshot.containers,
                &snapshot.movements,
                &snapshot.shipments,
                &self.cancel,
            )
            .await;

        let summary = ReconciliationSummary {
            run_id,
            run_key: self.run_key.clone(),
            started_at,
            finished_at: Utc::now(),
            cancelled: self.cancel.is_cancelled(),
            stock,
            containers,
        };

        tracing::info!(
            %run_id,
            products_corrected = summary.stock.corrected_count,
            containers_corrected = summary.containers.corrected_count,
            failures = summary.failures(),
            skipped = summary.skipped(),
            "Reconciliation pass finished"
        );
        *self.last_summary.write().await = Some(summary.clone());
        Ok(summary)
    }

    /// Run both engines unless the configured run key is already marked.
    ///
    /// The key is marked only after a pass in which every correction landed.
    pub async fn run_once(&self) -> AppResult<RunOutcome> {
        if self.tracker.has_run(&self.run_key).await? {
            tracing::info!(run_key = %self.run_key, "Reconciliation already ran for this key; skipping");
            return Ok(RunOutcome::AlreadyRan {
                run_key: self.run_key.clone(),
            });
        }

        let summary = self.run().await?;
        if summary.cancelled || summary.skipped() > 0 {
            return Err(AppError::Cancelled);
        }
        if summary.failures() > 0 {
            return Err(AppError::ReconciliationIncomplete {
                failed: summary.failures(),
            });
        }

        self.tracker.mark_run(&self.run_key, summary.totals()).await?;
        tracing::info!(run_key = %self.run_key, "Reconciliation run marked complete");
        Ok(RunOutcome::Completed(summary))
    }

    /// Product stock engine alone
    pub async fn reconcile_stock(&self) -> AppResult<StockReconciliationSummary> {
        let _pass = self.pass_lock.lock().await;
        let products = self.reader.products().await?;
        let movements = self.reader.movements().await?;
        let shipments = self.reader.shipments().await?;
        ensure_complete(products.rejected + movements.rejected + shipments.rejected)?;
        Ok(self
            .stock
            .reconcile_product_stock(
                &products.records,
                &movements.records,
                &shipments.records,
                &self.cancel,
            )
            .await)
    }

    /// Container custody engine alone
    pub async fn reconcile_containers(&self) -> AppResult<ContainerReconciliationSummary> {
        let _pass = self.pass_lock.lock().await;
        let containers = self.reader.containers().await?;
        let movements = self.reader.movements().await?;
        let shipments = self.reader.shipments().await?;
        ensure_complete(containers.rejected + movements.rejected + shipments.rejected)?;
        Ok(self
            .containers
            .reconcile_container_custody(
                &containers.records,
                &movements.records,
                &shipments.records,
                &self.cancel,
            )
            .await)
    }

    /// Compare recorded counterparty container balances with history
    pub async fn audit_counterparties(&self) -> AppResult<CounterpartyAuditSummary> {
        let counterparties = self.reader.counterparties().await?;
        let movements = self.reader.movements().await?;
        let shipments = self.reader.shipments().await?;
        Ok(audit_counterparties(
            &counterparties.records,
            &movements.records,
            &shipments.records,
        ))
    }

    pub async fn status(&self) -> AppResult<ReconciliationStatus> {
        let record = self.tracker.last_run(&self.run_key).await?;
        Ok(ReconciliationStatus {
            run_key: self.run_key.clone(),
            completed: record.is_some(),
            completed_at: record.as_ref().map(|r| r.completed_at),
            recorded_totals: record.map(|r| r.summary),
            last_summary: self.last_summary.read().await.clone(),
        })
    }
}
