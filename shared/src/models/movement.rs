//! Movement documents: produce intakes and container movements

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ContainerLine;
use crate::decimal::lenient;

/// Discriminator of a movement document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "Produce Intake")]
    ProduceIntake,
    #[serde(rename = "Container Movement")]
    ContainerMovement,
    /// Any other document kind; container lines follow the non-intake rules
    #[serde(other)]
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::ProduceIntake => "Produce Intake",
            DocumentType::ContainerMovement => "Container Movement",
            DocumentType::Other => "Other",
        }
    }
}

/// Who is on the other side of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterpartyRole {
    Supplier,
    Client,
}

impl CounterpartyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterpartyRole::Supplier => "Supplier",
            CounterpartyRole::Client => "Client",
        }
    }
}

/// A single weighing at intake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeLine {
    #[serde(default, deserialize_with = "lenient::reference")]
    pub product_id: String,
    #[serde(default, deserialize_with = "lenient::optional_amount")]
    pub gross_weight: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::optional_amount")]
    pub tare: Option<Decimal>,
    /// Authoritative mass added to stock
    #[serde(default, deserialize_with = "lenient::amount")]
    pub net_weight: Decimal,
}

impl IntakeLine {
    pub fn new(product_id: impl Into<String>, net_weight: Decimal) -> Self {
        Self {
            product_id: product_id.into(),
            gross_weight: None,
            tare: None,
            net_weight,
        }
    }
}

/// Parent document of intake weighings and container lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementDocument {
    pub id: String,
    pub document_type: DocumentType,
    #[serde(default)]
    pub counterparty_role: Option<CounterpartyRole>,
    #[serde(default)]
    pub counterparty_id: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub intake_lines: Vec<IntakeLine>,
    #[serde(default)]
    pub container_lines: Vec<ContainerLine>,
}

impl MovementDocument {
    pub fn new(id: impl Into<String>, document_type: DocumentType) -> Self {
        Self {
            id: id.into(),
            document_type,
            counterparty_role: None,
            counterparty_id: None,
            date: None,
            intake_lines: Vec::new(),
            container_lines: Vec::new(),
        }
    }

    pub fn with_counterparty(mut self, role: CounterpartyRole, id: impl Into<String>) -> Self {
        self.counterparty_role = Some(role);
        self.counterparty_id = Some(id.into());
        self
    }

    pub fn with_intake(mut self, line: IntakeLine) -> Self {
        self.intake_lines.push(line);
        self
    }

    pub fn with_container(mut self, line: ContainerLine) -> Self {
        self.container_lines.push(line);
        self
    }
}
