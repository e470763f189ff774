//! Counterparty container-balance audit
//!
//! Compares each counterparty's recorded `container_balances` with the holdings
//! recomputed from history. Report-only: nothing is written back.

use std::collections::BTreeMap;

use serde::Serialize;
use shared::ledger::{compare_holdings, fold_holdings, history_lines, ContainerBalances, HoldingDiscrepancy};
use shared::models::{Counterparty, CounterpartyRole, MovementDocument, OutboundShipment};

#[derive(Debug, Clone, Serialize)]
pub struct CounterpartyAuditEntry {
    pub counterparty_id: String,
    pub name: String,
    pub role: Option<CounterpartyRole>,
    pub recorded: ContainerBalances,
    pub computed: ContainerBalances,
    pub discrepancies: Vec<HoldingDiscrepancy>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CounterpartyAuditSummary {
    pub audited: usize,
    pub with_discrepancies: usize,
    /// Counterparty ids named by history but absent from the roster
    pub unknown_counterparties: Vec<String>,
    pub counterparties: Vec<CounterpartyAuditEntry>,
}

/// Audit every counterparty in the roster against history
pub fn audit_counterparties(
    counterparties: &[Counterparty],
    movements: &[MovementDocument],
    shipments: &[OutboundShipment],
) -> CounterpartyAuditSummary {
    let mut holdings: BTreeMap<String, ContainerBalances> =
        fold_holdings(history_lines(movements, shipments));

    let mut entries = Vec::with_capacity(counterparties.len());
    for counterparty in counterparties {
        let computed = holdings.remove(&counterparty.id).unwrap_or_default();
        let discrepancies = compare_holdings(&counterparty.container_balances, &computed);
        if !discrepancies.is_empty() {
            tracing::warn!(
                counterparty_id = %counterparty.id,
                counterparty = %counterparty.name,
                discrepancies = discrepancies.len(),
                "Recorded container balances disagree with history"
            );
        }
        entries.push(CounterpartyAuditEntry {
            counterparty_id: counterparty.id.clone(),
            name: counterparty.name.clone(),
            role: counterparty.role,
            recorded: counterparty.container_balances.clone(),
            computed,
            discrepancies,
        });
    }

    // Whatever is left was never claimed by a roster entry
    let unknown_counterparties: Vec<String> = holdings.into_keys().collect();
    for id in &unknown_counterparties {
        tracing::warn!(counterparty_id = %id, "History names a counterparty missing from the roster");
    }

    let summary = CounterpartyAuditSummary {
        audited: entries.len(),
        with_discrepancies: entries.iter().filter(|e| !e.discrepancies.is_empty()).count(),
        unknown_counterparties,
        counterparties: entries,
    };
    tracing::info!(
        audited = summary.audited,
        with_discrepancies = summary.with_discrepancies,
        unknown = summary.unknown_counterparties.len(),
        "Counterparty audit finished"
    );
    summary
}
