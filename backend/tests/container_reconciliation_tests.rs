//! Container custody reconciliation tests
//!
//! Tests for occupied/empty counter recomputation including:
//! - Supplier returns on produce intakes never credit depot stock
//! - Full returns on shipments credit occupied, empty returns credit empty
//! - Both counters are written together, and only when they drifted
//! - Counters are never negative after correction

use std::sync::Arc;

use acopio_backend::services::container_reconciliation::{
    ContainerReconciler, ContainerReconciliationSummary,
};
use acopio_backend::services::corrector::Corrector;
use acopio_backend::services::history::HistoryReader;
use acopio_backend::services::{CancelHandle, InMemoryLedgerStore};
use proptest::prelude::*;
use shared::ledger::CustodyCounter;
use shared::models::{
    Container, ContainerLine, CounterpartyRole, DocumentType, MovementDocument, OutboundShipment,
    ShipmentStatus,
};

async fn reconcile_with(store: &InMemoryLedgerStore, with_trace: bool) -> ContainerReconciliationSummary {
    let snapshot = HistoryReader::new(Arc::new(store.clone()), 3, 1000)
        .load()
        .await
        .unwrap();
    ContainerReconciler::new(Corrector::new(Arc::new(store.clone())), 3)
        .with_trace(with_trace)
        .reconcile_container_custody(
            &snapshot.containers,
            &snapshot.movements,
            &snapshot.shipments,
            &CancelHandle::new(),
        )
        .await
}

async fn reconcile(store: &InMemoryLedgerStore) -> ContainerReconciliationSummary {
    reconcile_with(store, false).await
}

fn bin_a_store(occupied: i64, empty: i64) -> InMemoryLedgerStore {
    let store = InMemoryLedgerStore::new();
    store.insert_container(Container::new("bin-a", "Bin-A", occupied, empty));
    store.insert_movement(
        MovementDocument::new("doc-1", DocumentType::ContainerMovement)
            .with_counterparty(CounterpartyRole::Supplier, "sup-1")
            .with_container(ContainerLine::new("bin-a", 0, 20)),
    );
    store.insert_movement(
        MovementDocument::new("doc-2", DocumentType::ProduceIntake)
            .with_counterparty(CounterpartyRole::Supplier, "sup-1")
            .with_container(ContainerLine::new("bin-a", 20, 0)),
    );
    store.insert_shipment(
        OutboundShipment::new("doc-3", ShipmentStatus::Confirmed)
            .for_client("cli-1")
            .with_container(ContainerLine::new("bin-a", 5, 0).returned_full(true)),
    );
    store
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Supplier bins returned on an intake leave a clamped empty deficit
    #[tokio::test]
    async fn test_bin_a_is_corrected() {
        let store = bin_a_store(0, 20);
        let summary = reconcile(&store).await;

        assert_eq!(summary.corrected_count, 1);
        assert_eq!(summary.total_units_adjusted, 25);
        assert_eq!(summary.deficits, 1);

        let report = &summary.containers[0];
        assert_eq!((report.after_occupied, report.after_empty), (5, 0));
        assert_eq!((report.diff_occupied, report.diff_empty), (5, -20));
        assert_eq!(report.deficits[0].counter, CustodyCounter::Empty);
        assert_eq!(report.deficits[0].shortfall, 20);
        assert_eq!(report.source_line_count, 3);
        assert!(report.trace.is_empty());

        let stored = store.container("bin-a").unwrap();
        assert_eq!((stored.occupied_stock, stored.empty_stock), (5, 0));
        // One combined write for both counters
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_trace_follows_encounter_order() {
        let store = bin_a_store(5, 0);
        let summary = reconcile_with(&store, true).await;

        let report = &summary.containers[0];
        let documents: Vec<_> = report.trace.iter().map(|t| t.document_id.as_str()).collect();
        assert_eq!(documents, vec!["doc-1", "doc-2", "doc-3"]);
        assert_eq!(report.trace[0].empty_after, -20);
        assert_eq!(report.trace[1].effect.empty, 0);
        assert_eq!(report.trace[2].occupied_after, 5);
        assert!(!report.drifted);
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let store = bin_a_store(0, 20);
        reconcile(&store).await;
        let summary = reconcile(&store).await;
        assert_eq!(summary.corrected_count, 0);
        assert_eq!(summary.total_units_adjusted, 0);
        assert_eq!(store.write_count(), 1);
    }

    /// Only the empty counter drifted, but both are written together
    #[tokio::test]
    async fn test_single_counter_drift_writes_both() {
        let store = InMemoryLedgerStore::new();
        store.insert_container(Container::new("crate", "Crate", 2, 9));
        store.insert_movement(
            MovementDocument::new("m1", DocumentType::ContainerMovement)
                .with_container(ContainerLine::new("crate", 10, 0)),
        );
        store.insert_shipment(
            OutboundShipment::new("s1", ShipmentStatus::Confirmed)
                .with_container(ContainerLine::new("crate", 2, 0).returned_full(true)),
        );

        let summary = reconcile(&store).await;
        let report = &summary.containers[0];
        assert_eq!((report.diff_occupied, report.diff_empty), (0, 1));
        let stored = store.container("crate").unwrap();
        assert_eq!((stored.occupied_stock, stored.empty_stock), (2, 10));
    }

    #[tokio::test]
    async fn test_failed_write_is_reported_per_container() {
        let store = bin_a_store(0, 20);
        store.insert_container(Container::new("crate", "Crate", 0, 4));
        store.fail_writes_for("bin-a");

        let summary = reconcile(&store).await;
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.corrected_count, 1);
        assert_eq!(summary.total_units_adjusted, 4);

        let bin = summary.containers.iter().find(|r| r.container_id == "bin-a").unwrap();
        assert!(bin.error.is_some());
        assert_eq!(store.container("bin-a").unwrap().empty_stock, 20);
        assert_eq!(store.container("crate").unwrap().empty_stock, 0);
    }

    #[tokio::test]
    async fn test_unknown_containers_are_reported() {
        let store = bin_a_store(5, 0);
        store.insert_movement(
            MovementDocument::new("m9", DocumentType::ContainerMovement)
                .with_container(ContainerLine::new("retired-box", 3, 0)),
        );
        let summary = reconcile(&store).await;
        assert_eq!(summary.unknown_references.len(), 1);
        assert_eq!(summary.unknown_references[0].entity_id, "retired-box");
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    #[derive(Debug, Clone)]
    enum Line {
        Movement { intake: bool, quantity_in: i64, quantity_out: i64 },
        Shipment { full: bool, quantity_in: i64, quantity_out: i64 },
    }

    fn line_strategy() -> impl Strategy<Value = Line> {
        prop_oneof![
            (any::<bool>(), 0i64..50, 0i64..50).prop_map(|(intake, quantity_in, quantity_out)| {
                Line::Movement { intake, quantity_in, quantity_out }
            }),
            (any::<bool>(), 0i64..50, 0i64..50).prop_map(|(full, quantity_in, quantity_out)| {
                Line::Shipment { full, quantity_in, quantity_out }
            }),
        ]
    }

    fn build_store(occupied: i64, empty: i64, lines: &[Line]) -> InMemoryLedgerStore {
        let store = InMemoryLedgerStore::new();
        store.insert_container(Container::new("bin", "Bin", occupied, empty));
        for (i, line) in lines.iter().enumerate() {
            match *line {
                Line::Movement { intake, quantity_in, quantity_out } => {
                    let document_type = if intake {
                        DocumentType::ProduceIntake
                    } else {
                        DocumentType::ContainerMovement
                    };
                    store.insert_movement(
                        MovementDocument::new(format!("m{}", i), document_type)
                            .with_container(ContainerLine::new("bin", quantity_in, quantity_out)),
                    );
                }
                Line::Shipment { full, quantity_in, quantity_out } => {
                    store.insert_shipment(
                        OutboundShipment::new(format!("s{}", i), ShipmentStatus::Confirmed)
                            .with_container(
                                ContainerLine::new("bin", quantity_in, quantity_out).returned_full(full),
                            ),
                    );
                }
            }
        }
        store
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Counters are non-negative after correction and a second pass changes nothing
        #[test]
        fn prop_custody_is_non_negative_and_idempotent(
            occupied in 0i64..100,
            empty in 0i64..100,
            lines in prop::collection::vec(line_strategy(), 0..12),
        ) {
            let store = build_store(occupied, empty, &lines);
            let first = block_on(reconcile(&store));
            prop_assert_eq!(first.failures, 0);

            let stored = store.container("bin").unwrap();
            prop_assert!(stored.occupied_stock >= 0);
            prop_assert!(stored.empty_stock >= 0);

            let second = block_on(reconcile(&store));
            prop_assert_eq!(second.corrected_count, 0);
        }

        /// Quantities returned on produce intakes never reach the empty counter
        #[test]
        fn prop_intake_returns_never_credit_empty(quantity_in in 1i64..100) {
            let store = build_store(0, 0, &[Line::Movement { intake: true, quantity_in, quantity_out: 0 }]);
            block_on(reconcile(&store));
            let stored = store.container("bin").unwrap();
            prop_assert_eq!((stored.occupied_stock, stored.empty_stock), (0, 0));
        }
    }
}
