//! WebAssembly module for the Acopio depot
//!
//! Lets the browser preview what a reconciliation pass would compute:
//! - Exact 2-decimal rounding and net weights
//! - Normalized legacy container balances
//! - Recomputed product stock and container custody for one entity

use rust_decimal::Decimal;
use shared::decimal::{net_weight, parse_amount, round2};
use shared::ledger::{history_lines, ContainerBalances, CustodyLedger, StockLedger};
use shared::models::{MovementDocument, OutboundShipment};
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;

fn js_error(message: String) -> JsValue {
    js_sys::Error::new(&message).into()
}

fn decode_history(movements_json: &str, shipments_json: &str) -> Result<(Vec<MovementDocument>, Vec<OutboundShipment>), String> {
    let movements = serde_json::from_str(movements_json)
        .map_err(|e| format!("Invalid movements JSON: {}", e))?;
    let shipments = serde_json::from_str(shipments_json)
        .map_err(|e| format!("Invalid shipments JSON: {}", e))?;
    Ok((movements, shipments))
}

/// Round a decimal amount to 2 places, half away from zero
#[wasm_bindgen]
pub fn round_amount(value: &str) -> String {
    round2(parse_amount(value)).to_string()
}

/// Net weight of a weighing, never below zero
#[wasm_bindgen]
pub fn compute_net_weight(gross: &str, tare: &str) -> String {
    net_weight(parse_amount(gross), parse_amount(tare)).to_string()
}

fn normalize_balances(raw: &str) -> Result<String, String> {
    let balances = ContainerBalances::parse_str(raw).map_err(|e| e.to_string())?;
    serde_json::to_string(&balances).map_err(|e| e.to_string())
}

/// Canonical `{container_id: units}` JSON for any legacy balance shape.
///
/// Unreadable input yields `{}` and a console warning.
#[wasm_bindgen]
pub fn normalize_container_balances(raw: &str) -> String {
    match normalize_balances(raw) {
        Ok(json) => json,
        Err(err) => {
            web_sys::console::warn_1(&format!("Unreadable container balances: {}", err).into());
            "{}".to_string()
        }
    }
}

fn product_stock_json(movements_json: &str, shipments_json: &str, product_id: &str) -> Result<String, String> {
    let (movements, shipments) = decode_history(movements_json, shipments_json)?;
    let computed = StockLedger::fold([product_id], history_lines(&movements, &shipments)).compute(product_id);
    serde_json::to_string(&computed).map_err(|e| e.to_string())
}

/// Recompute one product's stock from movement and shipment JSON arrays
#[wasm_bindgen]
pub fn compute_product_stock(
    movements_json: &str,
    shipments_json: &str,
    product_id: &str,
) -> Result<String, JsValue> {
    product_stock_json(movements_json, shipments_json, product_id).map_err(js_error)
}

fn container_custody_json(movements_json: &str, shipments_json: &str, container_id: &str) -> Result<String, String> {
    let (movements, shipments) = decode_history(movements_json, shipments_json)?;
    let computed =
        CustodyLedger::fold([container_id], history_lines(&movements, &shipments)).compute(container_id);
    serde_json::to_string(&computed).map_err(|e| e.to_string())
}

/// Recompute one container type's occupied and empty counters
#[wasm_bindgen]
pub fn compute_container_custody(
    movements_json: &str,
    shipments_json: &str,
    container_id: &str,
) -> Result<String, JsValue> {
    container_custody_json(movements_json, shipments_json, container_id).map_err(js_error)
}

/// Whether a stored stock value is within tolerance of a recomputed one
#[wasm_bindgen]
pub fn stock_matches(stored: &str, computed: &str, tolerance: &str) -> bool {
    let diff: Decimal = round2(parse_amount(computed)) - round2(parse_amount(stored));
    diff.abs() <= parse_amount(tolerance)
}
