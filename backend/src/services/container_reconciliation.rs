//! Container custody reconciliation: recompute occupied and empty counters per
//! container type and overwrite drifted pairs in a single write

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::ledger::{
    detect_custody_drift, history_lines, CounterDeficit, CustodyLedger, CustodyTraceEntry,
    UnknownReference,
};
use shared::models::{Container, MovementDocument, OutboundShipment};

use crate::services::corrector::Corrector;
use crate::services::task_group::{run_bounded, CancelHandle};

#[derive(Debug, Clone, Serialize)]
pub struct ContainerCustodyReport {
    pub container_id: String,
    pub container_type: String,
    pub before_occupied: i64,
    pub before_empty: i64,
    pub after_occupied: i64,
    pub after_empty: i64,
    pub diff_occupied: i64,
    pub diff_empty: i64,
    pub source_line_count: usize,
    pub deficits: Vec<CounterDeficit>,
    pub drifted: bool,
    pub corrected: bool,
    pub corrected_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Line-by-line fold, only filled in when tracing was requested
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<CustodyTraceEntry>,
}

impl ContainerCustodyReport {
    fn units_adjusted(&self) -> i64 {
        self.diff_occupied
            .saturating_abs()
            .saturating_add(self.diff_empty.saturating_abs())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContainerReconciliationSummary {
    pub corrected_count: usize,
    pub total_units_adjusted: i64,
    pub deficits: usize,
    pub unknown_references: Vec<UnknownReference>,
    pub failures: usize,
    pub skipped: usize,
    pub containers: Vec<ContainerCustodyReport>,
}

/// Custody engine
#[derive(Clone)]
pub struct ContainerReconciler {
    corrector: Corrector,
    concurrency: usize,
    with_trace: bool,
}

impl ContainerReconciler {
    pub fn new(corrector: Corrector, concurrency: usize) -> Self {
        Self {
            corrector,
            concurrency,
            with_trace: false,
        }
    }

    /// Keep the per-line fold in every report
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.with_trace = enabled;
        self
    }

    pub async fn reconcile_container_custody(
        &self,
        containers: &[Container],
        movements: &[MovementDocument],
        shipments: &[OutboundShipment],
        cancel: &CancelHandle,
    ) -> ContainerReconciliationSummary {
        let ledger = CustodyLedger::fold(
            containers.iter().map(|c| c.id.as_str()),
            history_lines(movements, shipments),
        );
        for unknown in ledger.unknown_references() {
            tracing::warn!(
                document_id = %unknown.document_id,
                container_id = %unknown.entity_id,
                origin = ?unknown.origin,
                "History line references an unknown container type; skipped"
            );
        }
        let unknown_references = ledger.unknown_references().to_vec();
        let ledger = Arc::new(ledger);
        let with_trace = self.with_trace;

        let outcome = run_bounded(containers.to_vec(), self.concurrency, cancel, |container| {
            let ledger = ledger.clone();
            let corrector = self.corrector.clone();
            async move { reconcile_one(&ledger, &corrector, container, with_trace).await }
        })
        .await;

        let reports = outcome.completed;
        let summary = ContainerReconciliationSummary {
            corrected_count: reports.iter().filter(|r| r.corrected).count(),
            total_units_adjusted: reports
                .iter()
                .filter(|r| r.corrected)
                .map(ContainerCustodyReport::units_adjusted)
                .fold(0, i64::saturating_add),
            deficits: reports.iter().map(|r| r.deficits.len()).sum(),
            unknown_references,
            failures: reports.iter().filter(|r| r.error.is_some()).count() + outcome.panicked,
            skipped: outcome.skipped,
            containers: reports,
        };

        tracing::info!(
            containers = containers.len(),
            corrected = summary.corrected_count,
            units_adjusted = summary.total_units_adjusted,
            deficits = summary.deficits,
            failures = summary.failures,
            skipped = summary.skipped,
            "Container reconciliation finished"
        );
        summary
    }
}

async fn reconcile_one(
    ledger: &CustodyLedger,
    corrector: &Corrector,
    container: Container,
    with_trace: bool,
) -> ContainerCustodyReport {
    let computed = ledger.compute(&container.id);
    for entry in &computed.trace {
        tracing::debug!(
            container_id = %container.id,
            document_id = %entry.document_id,
            origin = ?entry.origin,
            occupied = entry.occupied_after,
            empty = entry.empty_after,
            "Custody line applied"
        );
    }
    for deficit in &computed.deficits {
        tracing::warn!(
            container_id = %container.id,
            container = %container.container_type,
            counter = %deficit.counter,
            shortfall = deficit.shortfall,
            "Recomputed custody counter is negative; clamping to zero"
        );
    }

    let mut report = ContainerCustodyReport {
        container_id: container.id.clone(),
        container_type: container.container_type.clone(),
        before_occupied: container.occupied_stock,
        before_empty: container.empty_stock,
        after_occupied: container.occupied_stock,
        after_empty: container.empty_stock,
        diff_occupied: 0,
        diff_empty: 0,
        source_line_count: computed.source_line_count,
        deficits: computed.deficits,
        drifted: false,
        corrected: false,
        corrected_at: None,
        error: None,
        trace: if with_trace { computed.trace } else { Vec::new() },
    };

    let Some(drift) = detect_custody_drift(
        container.occupied_stock,
        container.empty_stock,
        computed.occupied,
        computed.empty,
    ) else {
        return report;
    };
    report.after_occupied = drift.after_occupied;
    report.after_empty = drift.after_empty;
    report.diff_occupied = drift.diff_occupied;
    report.diff_empty = drift.diff_empty;
    report.drifted = true;

    match corrector.correct_container(&container, &drift).await {
        Ok(at) => {
            report.corrected = true;
            report.corrected_at = Some(at);
        }
        Err(err) => {
            tracing::error!(
                container_id = %container.id,
                error = %err,
                "Failed to correct container custody"
            );
            report.error = Some(err.to_string());
        }
    }
    report
}
