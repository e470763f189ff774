//! Product stock recomputed from intake weighings and outbound shipments
//!
//! `stock = Σ net_weight(intakes) − Σ quantity_shipped(shipments)`, clamped at
//! zero. Shipments count from the moment they leave, confirmed or not.
//! Confirmation losses (scale variance + quality discount) are tallied for
//! reporting and never credited back.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use super::history::{HistoryLine, LineOrigin};
use crate::decimal::{add, net_weight, round2, sub};

/// Smallest stock difference treated as drift, in kg
pub const DEFAULT_STOCK_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// A line pointing at an entity missing from the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownReference {
    pub document_id: String,
    pub entity_id: String,
    pub origin: LineOrigin,
}

/// An intake whose stored net weight disagrees with gross minus tare
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightMismatch {
    pub document_id: String,
    pub product_id: String,
    pub stored: Decimal,
    pub derived: Decimal,
}

#[derive(Debug, Clone, Default)]
struct StockTally {
    ingested: Decimal,
    shipped: Decimal,
    loss: Decimal,
    lines: usize,
}

/// Result of folding one product's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockComputation {
    pub product_id: String,
    pub ingested: Decimal,
    pub shipped: Decimal,
    /// `ingested − shipped` before clamping
    pub raw_balance: Decimal,
    /// Value the stored stock should hold
    pub correct: Decimal,
    pub loss_recognized: Decimal,
    pub source_line_count: usize,
    /// Shortfall hidden by the clamp, when the raw balance was negative
    pub deficit: Option<Decimal>,
}

/// Per-product tallies over the whole history
#[derive(Debug, Clone, Default)]
pub struct StockLedger {
    tallies: HashMap<String, StockTally>,
    unknown: Vec<UnknownReference>,
    mismatches: Vec<WeightMismatch>,
}

impl StockLedger {
    /// Fold every history line for the given roster of product ids.
    ///
    /// Lines for products outside the roster are set aside as unknown.
    pub fn fold<'a, P, L>(product_ids: P, lines: L) -> Self
    where
        P: IntoIterator<Item = &'a str>,
        L: IntoIterator<Item = HistoryLine<'a>>,
    {
        let mut ledger = Self {
            tallies: product_ids
                .into_iter()
                .map(|id| (id.to_string(), StockTally::default()))
                .collect(),
            ..Self::default()
        };
        for line in lines {
            ledger.apply(line);
        }
        ledger
    }

    fn apply(&mut self, line: HistoryLine<'_>) {
        match line {
            HistoryLine::ProduceIntake { document, line: weighing } => {
                if let (Some(gross), Some(tare)) = (weighing.gross_weight, weighing.tare) {
                    let derived = net_weight(gross, tare);
                    if derived != round2(weighing.net_weight) {
                        self.mismatches.push(WeightMismatch {
                            document_id: document.id.clone(),
                            product_id: weighing.product_id.clone(),
                            stored: round2(weighing.net_weight),
                            derived,
                        });
                    }
                }
                if let Some(tally) = self.tally_for(&line) {
                    tally.ingested = add([tally.ingested, weighing.net_weight]);
                    tally.lines += 1;
                }
            }
            HistoryLine::ShipmentProduct { shipment, line: shipped } => {
                if let Some(tally) = self.tally_for(&line) {
                    tally.shipped = add([tally.shipped, shipped.quantity_shipped]);
                    if shipment.is_confirmed() {
                        tally.loss = add([tally.loss, shipped.permanent_loss()]);
                    }
                    tally.lines += 1;
                }
            }
            HistoryLine::DocumentContainer { .. } | HistoryLine::ShipmentContainer { .. } => {}
        }
    }

    fn tally_for(&mut self, line: &HistoryLine<'_>) -> Option<&mut StockTally> {
        let product_id = line.product_id()?;
        if !self.tallies.contains_key(product_id) {
            self.unknown.push(UnknownReference {
                document_id: line.document_id().to_string(),
                entity_id: product_id.to_string(),
                origin: line.origin(),
            });
            return None;
        }
        self.tallies.get_mut(product_id)
    }

    /// Correct stock for one product. Unknown ids compute as empty history.
    pub fn compute(&self, product_id: &str) -> StockComputation {
        let tally = self.tallies.get(product_id).cloned().unwrap_or_default();
        let raw_balance = sub(tally.ingested, tally.shipped);
        let (correct, deficit) = if raw_balance < Decimal::ZERO {
            (round2(Decimal::ZERO), Some(round2(-raw_balance)))
        } else {
            (raw_balance, None)
        };

        StockComputation {
            product_id: product_id.to_string(),
            ingested: round2(tally.ingested),
            shipped: round2(tally.shipped),
            raw_balance,
            correct,
            loss_recognized: round2(tally.loss),
            source_line_count: tally.lines,
            deficit,
        }
    }

    pub fn unknown_references(&self) -> &[UnknownReference] {
        &self.unknown
    }

    pub fn weight_mismatches(&self) -> &[WeightMismatch] {
        &self.mismatches
    }
}

/// A stored stock that needs overwriting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockDrift {
    pub before: Decimal,
    pub after: Decimal,
    /// `after − before`
    pub diff: Decimal,
}

/// Compare stored against computed; drift only when `|diff| > tolerance`
pub fn detect_stock_drift(stored: Decimal, correct: Decimal, tolerance: Decimal) -> Option<StockDrift> {
    let diff = sub(correct, stored);
    if diff.abs() > tolerance {
        Some(StockDrift {
            before: stored,
            after: correct,
            diff,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::history_lines;
    use crate::models::{
        DocumentType, IntakeLine, MovementDocument, OutboundShipment, ShipmentLine, ShipmentStatus,
    };
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn apple_history() -> (Vec<MovementDocument>, Vec<OutboundShipment>) {
        let movements = vec![
            MovementDocument::new("m1", DocumentType::ProduceIntake)
                .with_intake(IntakeLine::new("apple-red", dec("500.00")))
                .with_intake(IntakeLine::new("apple-red", dec("300.25"))),
            MovementDocument::new("m2", DocumentType::ProduceIntake)
                .with_intake(IntakeLine::new("apple-red", dec("199.75"))),
        ];
        let shipments = vec![OutboundShipment::new("s1", ShipmentStatus::Confirmed).with_line(
            ShipmentLine::new("apple-red", dec("400.00")).confirmed(dec("395.00"), dec("10.00")),
        )];
        (movements, shipments)
    }

    #[test]
    fn test_apple_red_scenario() {
        let (movements, shipments) = apple_history();
        let ledger = StockLedger::fold(["apple-red"], history_lines(&movements, &shipments));
        let computed = ledger.compute("apple-red");

        assert_eq!(computed.ingested, dec("1000.00"));
        assert_eq!(computed.shipped, dec("400.00"));
        assert_eq!(computed.correct, dec("600.00"));
        assert_eq!(computed.loss_recognized, dec("15.00"));
        assert_eq!(computed.source_line_count, 4);
        assert_eq!(computed.deficit, None);

        let drift = detect_stock_drift(dec("615.00"), computed.correct, DEFAULT_STOCK_TOLERANCE).unwrap();
        assert_eq!(drift.diff, dec("-15.00"));
        assert_eq!(drift.after, dec("600.00"));
    }

    #[test]
    fn test_loss_is_never_credited_back() {
        let movements = vec![MovementDocument::new("m1", DocumentType::ProduceIntake)
            .with_intake(IntakeLine::new("p", dec("100")))];
        let shipments = vec![OutboundShipment::new("s1", ShipmentStatus::Confirmed)
            .with_line(ShipmentLine::new("p", dec("100")).confirmed(dec("95"), dec("3")))];
        let computed = StockLedger::fold(["p"], history_lines(&movements, &shipments)).compute("p");
        assert_eq!(computed.shipped, dec("100.00"));
        assert_eq!(computed.correct, dec("0.00"));
        assert_eq!(computed.loss_recognized, dec("8.00"));
    }

    #[test]
    fn test_pending_shipments_deduct_without_loss() {
        let movements = vec![MovementDocument::new("m1", DocumentType::ProduceIntake)
            .with_intake(IntakeLine::new("p", dec("50")))];
        let shipments = vec![OutboundShipment::new("s1", ShipmentStatus::PendingConfirmation)
            .with_line(ShipmentLine::new("p", dec("20")).confirmed(dec("10"), dec("5")))];
        let computed = StockLedger::fold(["p"], history_lines(&movements, &shipments)).compute("p");
        assert_eq!(computed.correct, dec("30.00"));
        assert_eq!(computed.loss_recognized, dec("0.00"));
    }

    #[test]
    fn test_negative_balance_is_clamped_with_deficit() {
        let shipments = vec![OutboundShipment::new("s1", ShipmentStatus::Confirmed)
            .with_line(ShipmentLine::new("p", dec("12.5")))];
        let computed = StockLedger::fold(["p"], history_lines(&[], &shipments)).compute("p");
        assert_eq!(computed.raw_balance, dec("-12.50"));
        assert_eq!(computed.correct, dec("0.00"));
        assert_eq!(computed.deficit, Some(dec("12.50")));
    }

    #[test]
    fn test_unknown_products_are_set_aside() {
        let movements = vec![MovementDocument::new("m1", DocumentType::ProduceIntake)
            .with_intake(IntakeLine::new("ghost", dec("10")))];
        let ledger = StockLedger::fold(["p"], history_lines(&movements, &[]));
        assert_eq!(ledger.unknown_references().len(), 1);
        assert_eq!(ledger.unknown_references()[0].entity_id, "ghost");
        assert_eq!(ledger.compute("p").correct, dec("0.00"));
    }

    #[test]
    fn test_weight_mismatch_keeps_stored_net() {
        let mut weighing = IntakeLine::new("p", dec("90"));
        weighing.gross_weight = Some(dec("100"));
        weighing.tare = Some(dec("5"));
        let movements = vec![MovementDocument::new("m1", DocumentType::ProduceIntake).with_intake(weighing)];
        let ledger = StockLedger::fold(["p"], history_lines(&movements, &[]));
        assert_eq!(ledger.weight_mismatches().len(), 1);
        assert_eq!(ledger.weight_mismatches()[0].derived, dec("95.00"));
        assert_eq!(ledger.compute("p").correct, dec("90.00"));
    }

    #[test]
    fn test_drift_tolerance() {
        assert!(detect_stock_drift(dec("10.00"), dec("10.01"), DEFAULT_STOCK_TOLERANCE).is_none());
        assert!(detect_stock_drift(dec("10.00"), dec("10.02"), DEFAULT_STOCK_TOLERANCE).is_some());
        assert!(detect_stock_drift(dec("10.00"), dec("10.00"), Decimal::ZERO).is_none());
    }

    /// A line missing its product id is set aside; its siblings still count
    #[test]
    fn test_line_without_product_keeps_the_document() {
        let document: MovementDocument = serde_json::from_value(serde_json::json!({
            "id": "m1",
            "document_type": "Produce Intake",
            "intake_lines": [
                {"product_id": "apple", "net_weight": 500},
                {"net_weight": 3},
                {"product_id": null, "net_weight": 4}
            ]
        }))
        .unwrap();
        assert_eq!(document.intake_lines.len(), 3);

        let ledger = StockLedger::fold(["apple"], history_lines(&[document], &[]));
        assert_eq!(ledger.compute("apple").correct, dec("500.00"));
        assert_eq!(ledger.unknown_references().len(), 2);
        assert_eq!(ledger.unknown_references()[0].entity_id, "");
    }
}
