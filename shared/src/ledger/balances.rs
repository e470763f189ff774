//! Normalization of the legacy "container balances" field
//!
//! Counterparty records have carried this field in several shapes over time:
//! a JSON object, a JSON-encoded string of that object, a single-quoted
//! pseudo-JSON string, or nothing at all. Everything is folded here into one
//! canonical map of container id -> signed unit count.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::decimal::{count_from_f64, parse_count};

/// Reasons a legacy balances value could not be read
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BalancesParseError {
    #[error("unreadable balances text: {0}")]
    Unreadable(String),

    #[error("unsupported balances shape: {0}")]
    UnsupportedShape(&'static str),
}

/// Canonical per-container balance map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerBalances(BTreeMap<String, i64>);

impl ContainerBalances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse any of the historical shapes
    pub fn from_value(value: &Value) -> Result<Self, BalancesParseError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Ok(Self(
                map.iter()
                    .map(|(container, units)| (container.trim().to_string(), units_of(units)))
                    .filter(|(container, _)| !container.is_empty())
                    .collect(),
            )),
            Value::String(text) => Self::parse_str(text),
            Value::Array(_) => Err(BalancesParseError::UnsupportedShape("array")),
            Value::Bool(_) => Err(BalancesParseError::UnsupportedShape("boolean")),
            Value::Number(_) => Err(BalancesParseError::UnsupportedShape("number")),
        }
    }

    /// Parse the text forms: JSON object, double-encoded JSON, single quotes
    pub fn parse_str(text: &str) -> Result<Self, BalancesParseError> {
        let text = text.trim();
        if text.is_empty() || text == "null" || text == "{}" {
            return Ok(Self::default());
        }

        if let Ok(value) = serde_json::from_str::<Value>(text) {
            return match value {
                // A JSON string holding JSON: unwrap one level only
                Value::String(inner) => match serde_json::from_str::<Value>(inner.trim()) {
                    Ok(decoded @ (Value::Object(_) | Value::Null)) => Self::from_value(&decoded),
                    _ => Self::parse_single_quoted(&inner),
                },
                other => Self::from_value(&other),
            };
        }

        Self::parse_single_quoted(text)
    }

    fn parse_single_quoted(text: &str) -> Result<Self, BalancesParseError> {
        let requoted = text.trim().replace('\'', "\"");
        match serde_json::from_str::<Value>(&requoted) {
            Ok(value @ Value::Object(_)) => Self::from_value(&value),
            _ => Err(BalancesParseError::Unreadable(text.to_string())),
        }
    }

    /// Parse, falling back to an empty map with a warning
    pub fn lenient(value: &Value) -> Self {
        match Self::from_value(value) {
            Ok(balances) => balances,
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring unreadable container balances");
                Self::default()
            }
        }
    }

    /// Units of a container, zero when absent
    pub fn get(&self, container_id: &str) -> i64 {
        self.0.get(container_id).copied().unwrap_or(0)
    }

    pub fn set(&mut self, container_id: impl Into<String>, units: i64) {
        self.0.insert(container_id.into(), units);
    }

    pub fn adjust(&mut self, container_id: &str, delta: i64) {
        let units = self.0.entry(container_id.to_string()).or_insert(0);
        *units = units.saturating_add(delta);
    }

    pub fn container_ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, i64)> for ContainerBalances {
    fn from_iter<T: IntoIterator<Item = (String, i64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn units_of(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .unwrap_or_else(|| n.as_f64().map(count_from_f64).unwrap_or(0)),
        Value::String(s) => parse_count(s),
        _ => 0,
    }
}

impl Serialize for ContainerBalances {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContainerBalances {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::lenient(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_shape() {
        let balances = ContainerBalances::from_value(&json!({"bin-a": 12, "crate": "-3"})).unwrap();
        assert_eq!(balances.get("bin-a"), 12);
        assert_eq!(balances.get("crate"), -3);
        assert_eq!(balances.get("missing"), 0);
    }

    #[test]
    fn test_json_string_shape() {
        let balances = ContainerBalances::from_value(&json!("{\"bin-a\": 4}")).unwrap();
        assert_eq!(balances.get("bin-a"), 4);
    }

    #[test]
    fn test_double_encoded_shape() {
        let balances = ContainerBalances::parse_str(r#""{\"bin-a\": 9}""#).unwrap();
        assert_eq!(balances.get("bin-a"), 9);
    }

    #[test]
    fn test_single_quoted_shape() {
        let balances = ContainerBalances::parse_str("{'bin-a': 7, 'crate': 2.0}").unwrap();
        assert_eq!(balances.get("bin-a"), 7);
        assert_eq!(balances.get("crate"), 2);
    }

    #[test]
    fn test_empty_shapes() {
        assert!(ContainerBalances::from_value(&Value::Null).unwrap().is_empty());
        assert!(ContainerBalances::parse_str("").unwrap().is_empty());
        assert!(ContainerBalances::parse_str("{}").unwrap().is_empty());
    }

    #[test]
    fn test_garbage_is_rejected_strictly_and_emptied_leniently() {
        assert!(ContainerBalances::parse_str("bin-a=3").is_err());
        assert_eq!(
            ContainerBalances::from_value(&json!([1, 2])),
            Err(BalancesParseError::UnsupportedShape("array"))
        );
        assert!(ContainerBalances::lenient(&json!("bin-a=3")).is_empty());
    }

    #[test]
    fn test_deserialize_never_fails() {
        #[derive(Deserialize)]
        struct Holder {
            balances: ContainerBalances,
        }
        let holder: Holder = serde_json::from_str(r#"{"balances": true}"#).unwrap();
        assert!(holder.balances.is_empty());
        let holder: Holder = serde_json::from_str(r#"{"balances": "{'x': 1}"}"#).unwrap();
        assert_eq!(holder.balances.get("x"), 1);
    }
}
