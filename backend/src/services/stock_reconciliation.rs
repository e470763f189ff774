//! Stock reconciliation: recompute every product's stock from full history,
//! correct the ones that drifted, and report what was found
//!
//! Recomputation is a pure function of immutable history, so running the pass
//! again right after a successful run finds nothing to correct.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::decimal::{add, round2};
use shared::ledger::{detect_stock_drift, history_lines, StockLedger, UnknownReference};
use shared::models::{MovementDocument, OutboundShipment, Product};

use crate::services::corrector::Corrector;
use crate::services::task_group::{run_bounded, CancelHandle};

/// Per-product outcome of a pass
#[derive(Debug, Clone, Serialize)]
pub struct ProductStockReport {
    pub product_id: String,
    pub product_name: String,
    pub before: Decimal,
    pub after: Decimal,
    /// `after − before`; zero when no drift was found
    pub diff: Decimal,
    pub ingested: Decimal,
    pub shipped: Decimal,
    pub loss_recognized: Decimal,
    pub source_line_count: usize,
    /// Shortfall hidden by clamping a negative balance to zero
    pub deficit: Option<Decimal>,
    pub drifted: bool,
    pub corrected: bool,
    pub corrected_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Totals of a stock pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct StockReconciliationSummary {
    pub corrected_count: usize,
    pub total_loss_recognized: Decimal,
    pub total_kg_adjusted: Decimal,
    pub deficits: usize,
    pub unknown_references: Vec<UnknownReference>,
    pub failures: usize,
    /// Products not visited because the pass was cancelled
    pub skipped: usize,
    pub products: Vec<ProductStockReport>,
}

/// Stock engine
#[derive(Clone)]
pub struct StockReconciler {
    corrector: Corrector,
    tolerance: Decimal,
    concurrency: usize,
}

impl StockReconciler {
    pub fn new(corrector: Corrector, tolerance: Decimal, concurrency: usize) -> Self {
        Self {
            corrector,
            tolerance,
            concurrency,
        }
    }

    /// Recompute, compare and correct every product in the roster
    pub async fn reconcile_product_stock(
        &self,
        products: &[Product],
        movements: &[MovementDocument],
        shipments: &[OutboundShipment],
        cancel: &CancelHandle,
    ) -> StockReconciliationSummary {
        let ledger = StockLedger::fold(
            products.iter().map(|p| p.id.as_str()),
            history_lines(movements, shipments),
        );
        for unknown in ledger.unknown_references() {
            tracing::warn!(
                document_id = %unknown.document_id,
                product_id = %unknown.entity_id,
                origin = ?unknown.origin,
                "History line references an unknown product; skipped"
            );
        }
        for mismatch in ledger.weight_mismatches() {
            tracing::warn!(
                document_id = %mismatch.document_id,
                product_id = %mismatch.product_id,
                stored = %mismatch.stored,
                derived = %mismatch.derived,
                "Stored net weight differs from gross minus tare; keeping stored value"
            );
        }
        let unknown_references = ledger.unknown_references().to_vec();
        let ledger = Arc::new(ledger);

        let outcome = run_bounded(products.to_vec(), self.concurrency, cancel, |product| {
            let ledger = ledger.clone();
            let corrector = self.corrector.clone();
            let tolerance = self.tolerance;
            async move { reconcile_one(&ledger, &corrector, tolerance, product).await }
        })
        .await;

        let reports = outcome.completed;
        let corrected: Vec<&ProductStockReport> = reports.iter().filter(|r| r.corrected).collect();
        let summary = StockReconciliationSummary {
            corrected_count: corrected.len(),
            total_loss_recognized: add(reports.iter().map(|r| r.loss_recognized)),
            total_kg_adjusted: add(corrected.iter().map(|r| r.diff.abs())),
            deficits: reports.iter().filter(|r| r.deficit.is_some()).count(),
            unknown_references,
            failures: reports.iter().filter(|r| r.error.is_some()).count() + outcome.panicked,
            skipped: outcome.skipped,
            products: reports,
        };

        tracing::info!(
            products = products.len(),
            corrected = summary.corrected_count,
            kg_adjusted = %summary.total_kg_adjusted,
            loss_recognized = %summary.total_loss_recognized,
            deficits = summary.deficits,
            failures = summary.failures,
            skipped = summary.skipped,
            "Stock reconciliation finished"
        );
        summary
    }
}

async fn reconcile_one(
    ledger: &StockLedger,
    corrector: &Corrector,
    tolerance: Decimal,
    product: Product,
) -> ProductStockReport {
    let computed = ledger.compute(&product.id);
    if let Some(deficit) = computed.deficit {
        tracing::warn!(
            product_id = %product.id,
            product = %product.name,
            deficit = %deficit,
            "Recomputed stock is negative; clamping to zero"
        );
    }

    let mut report = ProductStockReport {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        before: product.stock,
        after: product.stock,
        diff: round2(Decimal::ZERO),
        ingested: computed.ingested,
        shipped: computed.shipped,
        loss_recognized: computed.loss_recognized,
        source_line_count: computed.source_line_count,
        deficit: computed.deficit,
        drifted: false,
        corrected: false,
        corrected_at: None,
        error: None,
    };

    let Some(drift) = detect_stock_drift(product.stock, computed.correct, tolerance) else {
        return report;
    };
    report.after = drift.after;
    report.diff = drift.diff;
    report.drifted = true;

    match corrector.correct_product(&product, &drift).await {
        Ok(at) => {
            report.corrected = true;
            report.corrected_at = Some(at);
        }
        Err(err) => {
            tracing::error!(
                product_id = %product.id,
                error = %err,
                "Failed to correct product stock"
            );
            report.error = Some(err.to_string());
        }
    }
    report
}
