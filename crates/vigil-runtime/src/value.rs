//! Variable values and decimal coercion.
//!
//! Namespace variables and change-event payloads carry JSON values. Specifier
//! predicates compare them as decimals, never as binary floats.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::{Error, Result};

pub use serde_json::Value;

/// Coerces a value to a decimal.
///
/// Numbers and numeric strings are accepted (`"10.0"` and `10` both coerce to
/// ten). Anything else is [`Error::NotNumeric`].
pub fn numeric(value: &Value) -> Result<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s.trim()),
        other => Err(Error::NotNumeric(other.to_string())),
    }
}

fn parse_decimal(text: &str) -> Result<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| Error::NotNumeric(text.to_string()))
}

/// Absolute difference between two numeric values.
pub fn change_delta(previous: &Value, current: &Value) -> Result<Decimal> {
    let previous = numeric(previous)?;
    let current = numeric(current)?;
    previous
        .checked_sub(current)
        .map(|delta| delta.abs())
        .ok_or_else(|| Error::Overflow(format!("{previous} - {current}")))
}

/// `percent` percent of a numeric value.
pub fn percentage_of(base: &Value, percent: Decimal) -> Result<Decimal> {
    let base = numeric(base)?;
    percent
        .checked_div(Decimal::ONE_HUNDRED)
        .and_then(|ratio| base.checked_mul(ratio))
        .ok_or_else(|| Error::Overflow(format!("{percent}% of {base}")))
}

/// Converts a decimal into a JSON value, keeping integral values integral.
pub fn from_decimal(value: Decimal) -> Value {
    let normalized = value.normalize();
    if normalized.scale() == 0 {
        if let Ok(int) = i64::try_from(normalized) {
            return Value::from(int);
        }
    }
    Value::String(normalized.to_string())
}
