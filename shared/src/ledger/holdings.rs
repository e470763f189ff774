//! Containers held by each counterparty, recomputed from history
//!
//! A unit delivered out to a counterparty is in its custody until it comes
//! back: `held = Σ quantity_out − Σ quantity_in` over every container line of
//! every document naming that counterparty.

use std::collections::BTreeMap;

use serde::Serialize;

use super::balances::ContainerBalances;
use super::history::HistoryLine;

/// Fold container lines into per-counterparty holdings
pub fn fold_holdings<'a, L>(lines: L) -> BTreeMap<String, ContainerBalances>
where
    L: IntoIterator<Item = HistoryLine<'a>>,
{
    let mut holdings: BTreeMap<String, ContainerBalances> = BTreeMap::new();
    for line in lines {
        let (Some(container_line), Some((counterparty_id, _))) =
            (line.container_line(), line.counterparty())
        else {
            continue;
        };
        if container_line.container_id.is_empty() {
            continue;
        }
        holdings
            .entry(counterparty_id.to_string())
            .or_default()
            .adjust(
                &container_line.container_id,
                container_line.quantity_out.saturating_sub(container_line.quantity_in),
            );
    }
    holdings
}

/// One container whose recorded holding disagrees with history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldingDiscrepancy {
    pub container_id: String,
    pub recorded: i64,
    pub computed: i64,
    /// `computed − recorded`
    pub diff: i64,
}

/// Compare recorded balances with computed ones over the union of containers
pub fn compare_holdings(
    recorded: &ContainerBalances,
    computed: &ContainerBalances,
) -> Vec<HoldingDiscrepancy> {
    let mut container_ids: Vec<&str> = recorded
        .container_ids()
        .chain(computed.container_ids())
        .collect();
    container_ids.sort_unstable();
    container_ids.dedup();

    container_ids
        .into_iter()
        .filter_map(|container_id| {
            let recorded_units = recorded.get(container_id);
            let computed_units = computed.get(container_id);
            (recorded_units != computed_units).then(|| HoldingDiscrepancy {
                container_id: container_id.to_string(),
                recorded: recorded_units,
                computed: computed_units,
                diff: computed_units.saturating_sub(recorded_units),
            })
        })
        .collect()
}
