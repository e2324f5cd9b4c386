//! Serde helpers that tolerate the format quirks of generated payloads.
//!
//! Upstream generators emit numbers as strings, with a leading `+`, or as
//! floats where an integer is expected. None of these are fatal.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::numbers::round_f64_to_i64;

/// Parse a loosely formatted integer, returning `None` for unusable input.
#[must_use]
pub fn parse_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(round_f64_to_i64)),
        Value::String(raw) => {
            let trimmed = raw.trim().trim_start_matches('+');
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(round_f64_to_i64))
        }
        Value::Bool(flag) => Some(i64::from(*flag)),
        _ => None,
    }
}

/// Deserialize an `i64`, defaulting to 0 for anything unparseable.
///
/// # Errors
///
/// Only fails when the underlying deserializer itself fails.
pub fn i64_or_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_i64(&value).unwrap_or(0))
}

/// Deserialize an optional `i64`, treating unparseable input as absent.
///
/// # Errors
///
/// Only fails when the underlying deserializer itself fails.
pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_i64(&value))
}

/// Deserialize a boolean that may arrive as a string or number.
///
/// # Errors
///
/// Only fails when the underlying deserializer itself fails.
pub fn opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(flag) => Some(flag),
        Value::Number(number) => number.as_i64().map(|n| n != 0),
        Value::String(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Deserialize a flag, treating anything unrecognized as `false`.
///
/// # Errors
///
/// Only fails when the underlying deserializer itself fails.
pub fn bool_or_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_bool(deserializer)?.unwrap_or(false))
}

/// Deserialize a nested value, dropping it instead of failing when it does not fit.
///
/// # Errors
///
/// Only fails when the underlying deserializer itself fails.
pub fn opt_value<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Deserialize a list, keeping only the elements that decode.
///
/// A single object where a list was expected is accepted as a one-element list.
///
/// # Errors
///
/// Only fails when the underlying deserializer itself fails.
pub fn vec_skip_invalid<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single @ Value::Object(_) => vec![single],
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}
