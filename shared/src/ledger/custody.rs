//! Container custody recomputed from every container line
//!
//! Two independent counters per container type:
//! - `occupied`: units out in the field, full of produce
//! - `empty`: units in the depot, available for reuse
//!
//! Rules per line:
//! - movement document, `quantity_in`: credits `empty` unless the document is
//!   a produce intake (a supplier taking back its own units is not depot stock)
//! - shipment, `quantity_in`: credits `occupied` when returned full, else `empty`
//! - any source, `quantity_out`: debits `empty`

use std::collections::HashMap;

use serde::Serialize;

use super::history::{HistoryLine, LineOrigin};
use super::stock::UnknownReference;
use crate::models::DocumentType;

/// Which of the two custody counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CustodyCounter {
    Occupied,
    Empty,
}

impl std::fmt::Display for CustodyCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CustodyCounter::Occupied => write!(f, "occupied"),
            CustodyCounter::Empty => write!(f, "empty"),
        }
    }
}

/// Counter deltas produced by one line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CustodyEffect {
    pub occupied: i64,
    pub empty: i64,
}

/// Effect of a single history line on its container's counters.
///
/// `None` for lines that carry no container.
pub fn custody_effect(line: &HistoryLine<'_>) -> Option<CustodyEffect> {
    match *line {
        HistoryLine::DocumentContainer { document, line } => {
            let mut effect = CustodyEffect::default();
            if line.quantity_in > 0 && document.document_type != DocumentType::ProduceIntake {
                effect.empty = effect.empty.saturating_add(line.quantity_in);
            }
            if line.quantity_out > 0 {
                effect.empty = effect.empty.saturating_sub(line.quantity_out);
            }
            Some(effect)
        }
        HistoryLine::ShipmentContainer { line, .. } => {
            let mut effect = CustodyEffect::default();
            if line.quantity_in > 0 {
                if line.returned_full {
                    effect.occupied = effect.occupied.saturating_add(line.quantity_in);
                } else {
                    effect.empty = effect.empty.saturating_add(line.quantity_in);
                }
            }
            if line.quantity_out > 0 {
                effect.empty = effect.empty.saturating_sub(line.quantity_out);
            }
            Some(effect)
        }
        HistoryLine::ProduceIntake { .. } | HistoryLine::ShipmentProduct { .. } => None,
    }
}

/// One step of a container's fold, in encounter order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustodyTraceEntry {
    pub document_id: String,
    pub origin: LineOrigin,
    pub quantity_in: i64,
    pub quantity_out: i64,
    pub returned_full: bool,
    pub effect: CustodyEffect,
    pub occupied_after: i64,
    pub empty_after: i64,
}

/// A counter that folded below zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterDeficit {
    pub counter: CustodyCounter,
    /// Units missing, positive
    pub shortfall: i64,
}

#[derive(Debug, Clone, Default)]
struct CustodyTally {
    occupied: i64,
    empty: i64,
    trace: Vec<CustodyTraceEntry>,
}

/// Result of folding one container type's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustodyComputation {
    pub container_id: String,
    pub raw_occupied: i64,
    pub raw_empty: i64,
    pub occupied: i64,
    pub empty: i64,
    pub deficits: Vec<CounterDeficit>,
    pub source_line_count: usize,
    pub trace: Vec<CustodyTraceEntry>,
}

/// Per-container tallies over the whole history
#[derive(Debug, Clone, Default)]
pub struct CustodyLedger {
    tallies: HashMap<String, CustodyTally>,
    unknown: Vec<UnknownReference>,
}

impl CustodyLedger {
    /// Fold every history line for the given roster of container ids
    pub fn fold<'a, C, L>(container_ids: C, lines: L) -> Self
    where
        C: IntoIterator<Item = &'a str>,
        L: IntoIterator<Item = HistoryLine<'a>>,
    {
        let mut ledger = Self {
            tallies: container_ids
                .into_iter()
                .map(|id| (id.to_string(), CustodyTally::default()))
                .collect(),
            unknown: Vec::new(),
        };
        for line in lines {
            ledger.apply(line);
        }
        ledger
    }

    fn apply(&mut self, line: HistoryLine<'_>) {
        let (Some(effect), Some(container_line)) = (custody_effect(&line), line.container_line()) else {
            return;
        };
        let Some(tally) = self.tallies.get_mut(&container_line.container_id) else {
            self.unknown.push(UnknownReference {
                document_id: line.document_id().to_string(),
                entity_id: container_line.container_id.clone(),
                origin: line.origin(),
            });
            return;
        };

        tally.occupied = tally.occupied.saturating_add(effect.occupied);
        tally.empty = tally.empty.saturating_add(effect.empty);
        tally.trace.push(CustodyTraceEntry {
            document_id: line.document_id().to_string(),
            origin: line.origin(),
            quantity_in: container_line.quantity_in,
            quantity_out: container_line.quantity_out,
            returned_full: container_line.returned_full,
            effect,
            occupied_after: tally.occupied,
            empty_after: tally.empty,
        });
    }

    /// Corrected counters for one container; each counter clamps on its own
    pub fn compute(&self, container_id: &str) -> CustodyComputation {
        let tally = self.tallies.get(container_id).cloned().unwrap_or_default();
        let mut deficits = Vec::new();
        let occupied = clamp_counter(tally.occupied, CustodyCounter::Occupied, &mut deficits);
        let empty = clamp_counter(tally.empty, CustodyCounter::Empty, &mut deficits);

        CustodyComputation {
            container_id: container_id.to_string(),
            raw_occupied: tally.occupied,
            raw_empty: tally.empty,
            occupied,
            empty,
            deficits,
            source_line_count: tally.trace.len(),
            trace: tally.trace,
        }
    }

    pub fn unknown_references(&self) -> &[UnknownReference] {
        &self.unknown
    }
}

fn clamp_counter(raw: i64, counter: CustodyCounter, deficits: &mut Vec<CounterDeficit>) -> i64 {
    if raw < 0 {
        deficits.push(CounterDeficit {
            counter,
            shortfall: raw.saturating_neg(),
        });
        0
    } else {
        raw
    }
}

/// Stored counters that need overwriting, always as a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CustodyDrift {
    pub before_occupied: i64,
    pub before_empty: i64,
    pub after_occupied: i64,
    pub after_empty: i64,
    pub diff_occupied: i64,
    pub diff_empty: i64,
}

impl CustodyDrift {
    /// Units moved across both counters
    pub fn units_adjusted(&self) -> i64 {
        self.diff_occupied
            .saturating_abs()
            .saturating_add(self.diff_empty.saturating_abs())
    }
}

/// Compare stored counters against computed ones; any difference is drift
pub fn detect_custody_drift(
    stored_occupied: i64,
    stored_empty: i64,
    occupied: i64,
    empty: i64,
) -> Option<CustodyDrift> {
    if stored_occupied == occupied && stored_empty == empty {
        return None;
    }
    Some(CustodyDrift {
        before_occupied: stored_occupied,
        before_empty: stored_empty,
        after_occupied: occupied,
        after_empty: empty,
        diff_occupied: occupied.saturating_sub(stored_occupied),
        diff_empty: empty.saturating_sub(stored_empty),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::history_lines;
    use crate::models::{
        ContainerLine, CounterpartyRole, MovementDocument, OutboundShipment, ShipmentStatus,
    };

    fn fold_one(movements: &[MovementDocument], shipments: &[OutboundShipment]) -> CustodyComputation {
        CustodyLedger::fold(["bin-a"], history_lines(movements, shipments)).compute("bin-a")
    }

    #[test]
    fn test_supplier_return_on_intake_does_not_credit_empty() {
        let intake = vec![MovementDocument::new("m1", DocumentType::ProduceIntake)
            .with_counterparty(CounterpartyRole::Supplier, "sup-1")
            .with_container(ContainerLine::new("bin-a", 10, 0))];
        assert_eq!(fold_one(&intake, &[]).raw_empty, 0);

        let movement = vec![MovementDocument::new("m1", DocumentType::ContainerMovement)
            .with_counterparty(CounterpartyRole::Supplier, "sup-1")
            .with_container(ContainerLine::new("bin-a", 10, 0))];
        assert_eq!(fold_one(&movement, &[]).empty, 10);
    }

    #[test]
    fn test_other_document_types_credit_empty() {
        let movement = vec![MovementDocument::new("m1", DocumentType::Other)
            .with_container(ContainerLine::new("bin-a", 6, 1))];
        assert_eq!(fold_one(&movement, &[]).empty, 5);
    }

    #[test]
    fn test_shipment_full_and_empty_returns() {
        let full = vec![OutboundShipment::new("s1", ShipmentStatus::Confirmed)
            .with_container(ContainerLine::new("bin-a", 4, 0).returned_full(true))];
        let computed = fold_one(&[], &full);
        assert_eq!((computed.occupied, computed.empty), (4, 0));

        let emptied = vec![OutboundShipment::new("s1", ShipmentStatus::Confirmed)
            .with_container(ContainerLine::new("bin-a", 4, 0))];
        let computed = fold_one(&[], &emptied);
        assert_eq!((computed.occupied, computed.empty), (0, 4));
    }

    #[test]
    fn test_bin_a_scenario() {
        let movements = vec![
            MovementDocument::new("doc-1", DocumentType::ContainerMovement)
                .with_counterparty(CounterpartyRole::Supplier, "sup-1")
                .with_container(ContainerLine::new("bin-a", 0, 20)),
            MovementDocument::new("doc-2", DocumentType::ProduceIntake)
                .with_counterparty(CounterpartyRole::Supplier, "sup-1")
                .with_container(ContainerLine::new("bin-a", 20, 0)),
        ];
        let shipments = vec![OutboundShipment::new("doc-3", ShipmentStatus::Confirmed)
            .for_client("cli-1")
            .with_container(ContainerLine::new("bin-a", 5, 0).returned_full(true))];

        let computed = fold_one(&movements, &shipments);
        assert_eq!(computed.raw_empty, -20);
        assert_eq!(computed.empty, 0);
        assert_eq!(computed.occupied, 5);
        assert_eq!(
            computed.deficits,
            vec![CounterDeficit {
                counter: CustodyCounter::Empty,
                shortfall: 20
            }]
        );
        assert_eq!(computed.source_line_count, 3);
        let trace_docs: Vec<_> = computed.trace.iter().map(|t| t.document_id.as_str()).collect();
        assert_eq!(trace_docs, vec!["doc-1", "doc-2", "doc-3"]);
        assert_eq!(computed.trace[0].empty_after, -20);
    }

    #[test]
    fn test_counters_clamp_independently() {
        let shipments = vec![OutboundShipment::new("s1", ShipmentStatus::Confirmed)
            .with_container(ContainerLine::new("bin-a", 3, 5).returned_full(true))];
        let computed = fold_one(&[], &shipments);
        assert_eq!((computed.occupied, computed.empty), (3, 0));
        assert_eq!(computed.deficits.len(), 1);
    }

    #[test]
    fn test_unknown_containers_are_set_aside() {
        let movements = vec![MovementDocument::new("m1", DocumentType::ContainerMovement)
            .with_container(ContainerLine::new("ghost", 1, 0))];
        let ledger = CustodyLedger::fold(["bin-a"], history_lines(&movements, &[]));
        assert_eq!(ledger.unknown_references().len(), 1);
        assert_eq!(ledger.compute("bin-a").source_line_count, 0);
    }

    #[test]
    fn test_drift_detection() {
        assert_eq!(detect_custody_drift(5, 0, 5, 0), None);
        let drift = detect_custody_drift(2, 9, 5, 0).unwrap();
        assert_eq!((drift.diff_occupied, drift.diff_empty), (3, -9));
        assert_eq!(drift.units_adjusted(), 12);
    }

    #[test]
    fn test_oversized_counts_saturate() {
        let movements = vec![
            MovementDocument::new("m1", DocumentType::ContainerMovement)
                .with_container(ContainerLine::new("bin-a", i64::MAX, 0)),
            MovementDocument::new("m2", DocumentType::ContainerMovement)
                .with_container(ContainerLine::new("bin-a", i64::MAX, 0)),
        ];
        assert_eq!(fold_one(&movements, &[]).empty, i64::MAX);

        let drained = vec![MovementDocument::new("m1", DocumentType::ContainerMovement)
            .with_container(ContainerLine::new("bin-a", 0, i64::MAX))
            .with_container(ContainerLine::new("bin-a", 0, i64::MAX))];
        let computed = fold_one(&drained, &[]);
        assert_eq!(computed.raw_empty, i64::MIN);
        assert_eq!(computed.empty, 0);
        assert_eq!(computed.deficits[0].shortfall, i64::MAX);

        let drift = detect_custody_drift(i64::MAX, 0, i64::MIN, 0).unwrap();
        assert_eq!(drift.diff_occupied, i64::MIN);
        assert_eq!(drift.units_adjusted(), i64::MAX);
    }
}
