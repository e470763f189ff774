//! Sanity checks for history records read from the persistence API
//!
//! None of these abort a reconciliation pass: findings are logged by the
//! caller and the records are folded as stored.

use rust_decimal::Decimal;

use crate::models::{ContainerLine, DocumentType, MovementDocument, OutboundShipment};

// ============================================================================
// Field Validations
// ============================================================================

/// Validate a mass in kg is not negative
pub fn validate_weight(weight: Decimal) -> Result<(), &'static str> {
    if weight < Decimal::ZERO {
        return Err("Weight cannot be negative");
    }
    Ok(())
}

/// Validate container quantities are not negative
pub fn validate_container_line(line: &ContainerLine) -> Result<(), &'static str> {
    if line.quantity_in < 0 || line.quantity_out < 0 {
        return Err("Container quantities cannot be negative");
    }
    if line.container_id.trim().is_empty() {
        return Err("Container line has no container");
    }
    Ok(())
}

/// Validate an entity id is present
pub fn validate_record_id(id: &str) -> Result<(), &'static str> {
    if id.trim().is_empty() {
        return Err("Record id cannot be empty");
    }
    Ok(())
}

// ============================================================================
// Document Validations
// ============================================================================

/// Problems found in a movement document, as human-readable strings
pub fn movement_issues(document: &MovementDocument) -> Vec<String> {
    let mut issues = Vec::new();
    if let Err(msg) = validate_record_id(&document.id) {
        issues.push(msg.to_string());
    }
    if document.document_type != DocumentType::ProduceIntake && !document.intake_lines.is_empty() {
        issues.push(format!(
            "{} weighing(s) on a {} document are ignored",
            document.intake_lines.len(),
            document.document_type.as_str()
        ));
    }
    for (index, line) in document.intake_lines.iter().enumerate() {
        if let Err(msg) = validate_weight(line.net_weight) {
            issues.push(format!("intake line {}: {}", index + 1, msg));
        }
    }
    for (index, line) in document.container_lines.iter().enumerate() {
        if let Err(msg) = validate_container_line(line) {
            issues.push(format!("container line {}: {}", index + 1, msg));
        }
    }
    issues
}

/// Problems found in a shipment, as human-readable strings
pub fn shipment_issues(shipment: &OutboundShipment) -> Vec<String> {
    let mut issues = Vec::new();
    if let Err(msg) = validate_record_id(&shipment.id) {
        issues.push(msg.to_string());
    }
    for (index, line) in shipment.lines.iter().enumerate() {
        if let Err(msg) = validate_weight(line.quantity_shipped) {
            issues.push(format!("shipment line {}: {}", index + 1, msg));
        }
        if shipment.is_confirmed() && line.quantity_received.is_none() {
            issues.push(format!(
                "shipment line {}: confirmed without a received quantity",
                index + 1
            ));
        }
    }
    for (index, line) in shipment.container_lines.iter().enumerate() {
        if let Err(msg) = validate_container_line(line) {
            issues.push(format!("container line {}: {}", index + 1, msg));
        }
    }
    issues
}
