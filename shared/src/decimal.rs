//! Exact two-decimal arithmetic for masses and money
//!
//! Every operation rounds its *result* to 2 decimal places (half away from
//! zero), and running totals are re-rounded after each step so that folding
//! thousands of weighings never accumulates drift. Missing operands count as
//! zero.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept for kilograms and currency
pub const SCALE: u32 = 2;

/// An operand accepted by the arithmetic helpers.
///
/// `None` behaves as zero.
pub trait Amount {
    fn amount(&self) -> Decimal;
}

impl Amount for Decimal {
    fn amount(&self) -> Decimal {
        *self
    }
}

impl Amount for Option<Decimal> {
    fn amount(&self) -> Decimal {
        self.unwrap_or(Decimal::ZERO)
    }
}

impl<T: Amount + ?Sized> Amount for &T {
    fn amount(&self) -> Decimal {
        (**self).amount()
    }
}

impl Amount for i64 {
    fn amount(&self) -> Decimal {
        Decimal::from(*self)
    }
}

/// Round to 2 decimal places, midpoints away from zero
pub fn round2(x: impl Amount) -> Decimal {
    let mut rounded = x
        .amount()
        .round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(SCALE);
    rounded
}

/// Sum all values, re-rounding the running total after every addition
pub fn add<I>(values: I) -> Decimal
where
    I: IntoIterator,
    I::Item: Amount,
{
    values
        .into_iter()
        .fold(round2(Decimal::ZERO), |total, value| {
            round2(total.saturating_add(round2(value.amount())))
        })
}

/// `a - b`, rounded
pub fn sub(a: impl Amount, b: impl Amount) -> Decimal {
    round2(round2(a.amount()).saturating_sub(round2(b.amount())))
}

/// `a * b`, rounded
pub fn mul(a: impl Amount, b: impl Amount) -> Decimal {
    round2(a.amount().saturating_mul(b.amount()))
}

/// Net weight of a weighing: `gross - tare`, never below zero
pub fn net_weight(gross: impl Amount, tare: impl Amount) -> Decimal {
    sub(gross, tare).max(round2(Decimal::ZERO))
}

/// Lenient amount parsing: whatever numeric prefix the text carries, else zero.
///
/// `"12.5"`, `" 12.5 kg"`, `"1e2"` all parse; `""` and `"abc"` are zero. A
/// number too large for a `Decimal` (`"1e30"`) is zero, not its leading digit.
pub fn parse_amount(text: &str) -> Decimal {
    let text = text.trim();
    if let Ok(value) = Decimal::from_str(text) {
        return value;
    }
    if let Ok(value) = Decimal::from_scientific(text) {
        return value;
    }
    let prefix = numeric_prefix(text, true);
    if prefix.is_empty() {
        return Decimal::ZERO;
    }
    match Decimal::from_str(prefix) {
        Ok(value) if !starts_with_exponent(&text[prefix.len()..]) => value,
        _ => {
            tracing::warn!(value = text, "Amount out of range; counted as zero");
            Decimal::ZERO
        }
    }
}

/// Lenient integer parsing for container counts: leading integer, else zero
pub fn parse_count(text: &str) -> i64 {
    let prefix = numeric_prefix(text.trim(), false);
    prefix.parse::<i64>().unwrap_or(0)
}

/// Convert a JSON number to a count, truncating any fraction.
///
/// Values outside the `i64` range are zero.
pub fn count_from_f64(value: f64) -> i64 {
    let truncated = value.trunc();
    if value.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
        truncated as i64
    } else {
        tracing::warn!(value, "Count out of range; counted as zero");
        0
    }
}

fn starts_with_exponent(rest: &str) -> bool {
    let mut chars = rest.chars();
    if !matches!(chars.next(), Some('e' | 'E')) {
        return false;
    }
    let rest = chars.as_str();
    let rest = rest.strip_prefix(&['+', '-'][..]).unwrap_or(rest);
    rest.starts_with(|c: char| c.is_ascii_digit())
}

fn numeric_prefix(text: &str, allow_fraction: bool) -> &str {
    let bytes = text.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if allow_fraction && end < bytes.len() && bytes[end] == b'.' {
        let dot = end;
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end == dot + 1 {
            end = dot;
        }
    }
    if end == digits_start {
        return "";
    }
    &text[..end]
}

/// Serde adapters that coerce malformed line fields instead of failing the record
pub mod lenient {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{count_from_f64, parse_amount, parse_count};

    fn value_to_amount(value: &Value) -> Option<Decimal> {
        match value {
            Value::Number(n) => Some(parse_amount(&n.to_string())),
            Value::String(s) => Some(parse_amount(s)),
            Value::Bool(_) | Value::Array(_) | Value::Object(_) => Some(Decimal::ZERO),
            Value::Null => None,
        }
    }

    fn value_to_count(value: &Value) -> i64 {
        match value {
            Value::Number(n) => n
                .as_i64()
                .unwrap_or_else(|| n.as_f64().map(count_from_f64).unwrap_or(0)),
            Value::String(s) => parse_count(s),
            _ => 0,
        }
    }

    /// Decimal field; null, missing or malformed become zero
    pub fn amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value_to_amount(&value).unwrap_or(Decimal::ZERO))
    }

    /// Optional decimal field; null stays `None`, malformed becomes zero
    pub fn optional_amount<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value_to_amount(&value))
    }

    /// Integer count; null, missing or malformed become zero
    pub fn count<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value_to_count(&value))
    }

    /// Referenced record id; null, missing or non-scalar become `""`.
    ///
    /// An empty id matches no roster entry, so the line is reported as an
    /// unknown reference instead of failing its whole document.
    pub fn reference<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        })
    }

    /// Boolean flag that also accepts `"true"`, `1` and friends
    pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "si" | "sí"),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_round2_half_away_from_zero() {
        assert_eq!(round2(dec("1.005")), dec("1.01"));
        assert_eq!(round2(dec("-1.005")), dec("-1.01"));
        assert_eq!(round2(dec("2.344")), dec("2.34"));
        assert_eq!(round2(None::<Decimal>), dec("0.00"));
    }

    #[test]
    fn test_add_treats_none_as_zero() {
        let values = [Some(dec("1.10")), None, Some(dec("2.20"))];
        assert_eq!(add(values), dec("3.30"));
    }

    #[test]
    fn test_ten_thousand_tenths_sum_exactly() {
        let weighings = vec![dec("0.1"); 10_000];
        assert_eq!(add(&weighings), dec("1000.00"));
    }

    #[test]
    fn test_sub_and_mul() {
        assert_eq!(sub(dec("400.00"), dec("395.00")), dec("5.00"));
        assert_eq!(mul(dec("2.5"), dec("3.333")), dec("8.33"));
        assert_eq!(sub(None::<Decimal>, dec("1.5")), dec("-1.50"));
    }

    #[test]
    fn test_net_weight_never_negative() {
        assert_eq!(net_weight(dec("520.40"), dec("20.15")), dec("500.25"));
        assert_eq!(net_weight(dec("10"), dec("12")), dec("0.00"));
        assert_eq!(net_weight(None::<Decimal>, None::<Decimal>), dec("0.00"));
    }

    #[test]
    fn test_parse_amount_lenient() {
        assert_eq!(parse_amount("12.5"), dec("12.5"));
        assert_eq!(parse_amount(" 12.5 kg"), dec("12.5"));
        assert_eq!(parse_amount("1e2"), dec("100"));
        assert_eq!(parse_amount("abc"), Decimal::ZERO);
        assert_eq!(parse_amount(""), Decimal::ZERO);
        assert_eq!(parse_amount("7."), dec("7"));
    }

    #[test]
    fn test_out_of_range_amounts_are_zero() {
        assert_eq!(parse_amount("1e30"), Decimal::ZERO);
        assert_eq!(parse_amount("-2E+40 kg"), Decimal::ZERO);
        assert_eq!(parse_amount("1000000000000000000000000000000000000000"), Decimal::ZERO);
        assert_eq!(parse_amount("2.5e1"), dec("25"));
        assert_eq!(parse_amount("3 each"), dec("3"));
    }

    #[test]
    fn test_out_of_range_counts_are_zero() {
        assert_eq!(count_from_f64(1e30), 0);
        assert_eq!(count_from_f64(-1e19), 0);
        assert_eq!(count_from_f64(f64::NAN), 0);
        assert_eq!(count_from_f64(42.9), 42);
        assert_eq!(parse_count("99999999999999999999"), 0);
    }

    #[test]
    fn test_parse_count_lenient() {
        assert_eq!(parse_count("12"), 12);
        assert_eq!(parse_count("12abc"), 12);
        assert_eq!(parse_count("-3"), -3);
        assert_eq!(parse_count("4.9"), 4);
        assert_eq!(parse_count("x"), 0);
    }

    #[test]
    fn test_lenient_serde_fields() {
        #[derive(serde::Deserialize)]
        struct Row {
            #[serde(deserialize_with = "lenient::amount")]
            weight: Decimal,
            #[serde(default, deserialize_with = "lenient::optional_amount")]
            discount: Option<Decimal>,
            #[serde(deserialize_with = "lenient::count")]
            units: i64,
            #[serde(deserialize_with = "lenient::flag")]
            full: bool,
        }

        let row: Row = serde_json::from_str(
            r#"{"weight": "300.25", "discount": null, "units": "7", "full": "true"}"#,
        )
        .unwrap();
        assert_eq!(row.weight, dec("300.25"));
        assert_eq!(row.discount, None);
        assert_eq!(row.units, 7);
        assert!(row.full);

        let row: Row =
            serde_json::from_str(r#"{"weight": 0.1, "units": 3.0, "full": 0}"#).unwrap();
        assert_eq!(row.weight, dec("0.1"));
        assert_eq!(row.units, 3);
        assert!(!row.full);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Results always carry exactly two decimal places
        #[test]
        fn prop_results_have_two_places(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
            let x = Decimal::new(a, 3);
            let y = Decimal::new(b, 3);
            prop_assert_eq!(add([x, y]).scale(), 2);
            prop_assert_eq!(sub(x, y).scale(), 2);
            prop_assert_eq!(mul(x, y).scale(), 2);
        }

        /// Cent-valued inputs sum exactly regardless of order
        #[test]
        fn prop_cent_sum_is_order_independent(cents in prop::collection::vec(-100_000i64..100_000, 0..50)) {
            let values: Vec<Decimal> = cents.iter().map(|c| Decimal::new(*c, 2)).collect();
            let mut reversed = values.clone();
            reversed.reverse();
            let exact: i64 = cents.iter().sum();
            prop_assert_eq!(add(&values), Decimal::new(exact, 2));
            prop_assert_eq!(add(&values), add(&reversed));
        }
    }
}
