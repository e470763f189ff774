//! Outbound shipments to clients

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ContainerLine;
use crate::decimal::{add, lenient, round2, sub};

/// Shipment lifecycle: Pending Confirmation -> Confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShipmentStatus {
    #[default]
    #[serde(rename = "Pending Confirmation")]
    PendingConfirmation,
    #[serde(rename = "Confirmed")]
    Confirmed,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::PendingConfirmation => "Pending Confirmation",
            ShipmentStatus::Confirmed => "Confirmed",
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produce line of a shipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentLine {
    #[serde(default, deserialize_with = "lenient::reference")]
    pub product_id: String,
    /// Deducted from stock when the shipment left; never changes
    #[serde(default, deserialize_with = "lenient::amount")]
    pub quantity_shipped: Decimal,
    /// Counterparty's scale reading, set at confirmation
    #[serde(default, deserialize_with = "lenient::optional_amount")]
    pub quantity_received: Option<Decimal>,
    /// Quality/grading deduction, set at confirmation
    #[serde(default, deserialize_with = "lenient::optional_amount")]
    pub quality_discount: Option<Decimal>,
}

impl ShipmentLine {
    pub fn new(product_id: impl Into<String>, quantity_shipped: Decimal) -> Self {
        Self {
            product_id: product_id.into(),
            quantity_shipped,
            quantity_received: None,
            quality_discount: None,
        }
    }

    pub fn confirmed(mut self, received: Decimal, discount: Decimal) -> Self {
        self.quantity_received = Some(received);
        self.quality_discount = Some(discount);
        self
    }

    /// Scale variance plus quality discount. Informational only: it is never
    /// credited back to stock.
    ///
    /// A line confirmed without a received figure is taken as received in full.
    pub fn permanent_loss(&self) -> Decimal {
        let received = self.quantity_received.unwrap_or(self.quantity_shipped);
        add([sub(self.quantity_shipped, received), round2(self.quality_discount)])
    }
}

/// Outbound transfer of produce (and containers) to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundShipment {
    pub id: String,
    #[serde(default)]
    pub status: ShipmentStatus,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub lines: Vec<ShipmentLine>,
    #[serde(default)]
    pub container_lines: Vec<ContainerLine>,
}

impl OutboundShipment {
    pub fn new(id: impl Into<String>, status: ShipmentStatus) -> Self {
        Self {
            id: id.into(),
            status,
            client_id: None,
            date: None,
            lines: Vec::new(),
            container_lines: Vec::new(),
        }
    }

    pub fn for_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_line(mut self, line: ShipmentLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn with_container(mut self, line: ContainerLine) -> Self {
        self.container_lines.push(line);
        self
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == ShipmentStatus::Confirmed
    }
}
