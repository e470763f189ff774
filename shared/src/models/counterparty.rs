//! Suppliers and clients

use serde::{Deserialize, Serialize};

use super::CounterpartyRole;
use crate::ledger::ContainerBalances;

/// A supplier or client, with the containers it is recorded as holding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counterparty {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Option<CounterpartyRole>,
    /// Legacy field; any historical shape is normalized on read
    #[serde(default)]
    pub container_balances: ContainerBalances,
}

impl Counterparty {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: CounterpartyRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: Some(role),
            container_balances: ContainerBalances::default(),
        }
    }
}
