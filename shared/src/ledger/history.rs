//! Flattened view of the transaction history
//!
//! Every embedded line of every document becomes one [`HistoryLine`], tagged
//! with the kind of document it came from. Balance folds match on the variant
//! instead of inspecting document-type strings.

use crate::models::{
    ContainerLine, CounterpartyRole, DocumentType, IntakeLine, MovementDocument, OutboundShipment,
    ShipmentLine, ShipmentStatus,
};

/// One line item of history, tagged by origin
#[derive(Debug, Clone, Copy)]
pub enum HistoryLine<'a> {
    /// Weighing inside a produce intake document
    ProduceIntake {
        document: &'a MovementDocument,
        line: &'a IntakeLine,
    },
    /// Container line inside a movement document (intake or container movement)
    DocumentContainer {
        document: &'a MovementDocument,
        line: &'a ContainerLine,
    },
    /// Produce line of an outbound shipment
    ShipmentProduct {
        shipment: &'a OutboundShipment,
        line: &'a ShipmentLine,
    },
    /// Container line attached to an outbound shipment
    ShipmentContainer {
        shipment: &'a OutboundShipment,
        line: &'a ContainerLine,
    },
}

impl<'a> HistoryLine<'a> {
    /// Id of the parent document
    pub fn document_id(&self) -> &'a str {
        match *self {
            HistoryLine::ProduceIntake { document, .. }
            | HistoryLine::DocumentContainer { document, .. } => &document.id,
            HistoryLine::ShipmentProduct { shipment, .. }
            | HistoryLine::ShipmentContainer { shipment, .. } => &shipment.id,
        }
    }

    pub fn product_id(&self) -> Option<&'a str> {
        match *self {
            HistoryLine::ProduceIntake { line, .. } => Some(&line.product_id),
            HistoryLine::ShipmentProduct { line, .. } => Some(&line.product_id),
            _ => None,
        }
    }

    pub fn container_line(&self) -> Option<&'a ContainerLine> {
        match *self {
            HistoryLine::DocumentContainer { line, .. }
            | HistoryLine::ShipmentContainer { line, .. } => Some(line),
            _ => None,
        }
    }

    pub fn container_id(&self) -> Option<&'a str> {
        self.container_line().map(|line| line.container_id.as_str())
    }

    /// Counterparty named by the parent document, with its role
    pub fn counterparty(&self) -> Option<(&'a str, Option<CounterpartyRole>)> {
        match *self {
            HistoryLine::ProduceIntake { document, .. }
            | HistoryLine::DocumentContainer { document, .. } => document
                .counterparty_id
                .as_deref()
                .map(|id| (id, document.counterparty_role)),
            HistoryLine::ShipmentProduct { shipment, .. }
            | HistoryLine::ShipmentContainer { shipment, .. } => shipment
                .client_id
                .as_deref()
                .map(|id| (id, Some(CounterpartyRole::Client))),
        }
    }

    /// Short label for traces and logs
    pub fn origin(&self) -> LineOrigin {
        match *self {
            HistoryLine::ProduceIntake { .. } => LineOrigin::ProduceIntake,
            HistoryLine::DocumentContainer { document, .. } => match document.document_type {
                DocumentType::ProduceIntake => LineOrigin::ProduceIntake,
                DocumentType::ContainerMovement => LineOrigin::ContainerMovement,
                DocumentType::Other => LineOrigin::OtherDocument,
            },
            HistoryLine::ShipmentProduct { shipment, .. }
            | HistoryLine::ShipmentContainer { shipment, .. } => match shipment.status {
                ShipmentStatus::PendingConfirmation => LineOrigin::PendingShipment,
                ShipmentStatus::Confirmed => LineOrigin::ConfirmedShipment,
            },
        }
    }
}

/// Where a history line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineOrigin {
    ProduceIntake,
    ContainerMovement,
    OtherDocument,
    PendingShipment,
    ConfirmedShipment,
}

/// All history lines in encounter order: movement documents first, then
/// shipments, each in stored order with their lines in stored order.
pub fn history_lines<'a>(
    movements: &'a [MovementDocument],
    shipments: &'a [OutboundShipment],
) -> impl Iterator<Item = HistoryLine<'a>> + 'a {
    let from_documents = movements.iter().flat_map(|document| {
        let intakes = document
            .intake_lines
            .iter()
            .filter(move |_| document.document_type == DocumentType::ProduceIntake)
            .map(move |line| HistoryLine::ProduceIntake { document, line });
        let containers = document
            .container_lines
            .iter()
            .map(move |line| HistoryLine::DocumentContainer { document, line });
        intakes.chain(containers)
    });

    let from_shipments = shipments.iter().flat_map(|shipment| {
        let products = shipment
            .lines
            .iter()
            .map(move |line| HistoryLine::ShipmentProduct { shipment, line });
        let containers = shipment
            .container_lines
            .iter()
            .map(move |line| HistoryLine::ShipmentContainer { shipment, line });
        products.chain(containers)
    });

    from_documents.chain(from_shipments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_encounter_order_and_tags() {
        let movements = vec![
            MovementDocument::new("m1", DocumentType::ProduceIntake)
                .with_intake(IntakeLine::new("apple", Decimal::from(10)))
                .with_container(ContainerLine::new("bin", 3, 0)),
            MovementDocument::new("m2", DocumentType::ContainerMovement)
                .with_container(ContainerLine::new("bin", 0, 2)),
        ];
        let shipments = vec![OutboundShipment::new("s1", ShipmentStatus::Confirmed)
            .with_line(ShipmentLine::new("apple", Decimal::from(4)))
            .with_container(ContainerLine::new("bin", 1, 0))];

        let lines: Vec<_> = history_lines(&movements, &shipments).collect();
        let origins: Vec<_> = lines.iter().map(|l| (l.document_id(), l.origin())).collect();
        assert_eq!(
            origins,
            vec![
                ("m1", LineOrigin::ProduceIntake),
                ("m1", LineOrigin::ProduceIntake),
                ("m2", LineOrigin::ContainerMovement),
                ("s1", LineOrigin::ConfirmedShipment),
                ("s1", LineOrigin::ConfirmedShipment),
            ]
        );
        assert!(matches!(lines[0], HistoryLine::ProduceIntake { .. }));
        assert!(matches!(lines[1], HistoryLine::DocumentContainer { .. }));
        assert_eq!(lines[3].product_id(), Some("apple"));
        assert_eq!(lines[4].container_id(), Some("bin"));
    }

    #[test]
    fn test_weighings_outside_intake_documents_are_ignored() {
        let movements = vec![MovementDocument::new("m1", DocumentType::ContainerMovement)
            .with_intake(IntakeLine::new("apple", Decimal::from(10)))];
        assert_eq!(history_lines(&movements, &[]).count(), 0);
    }
}
