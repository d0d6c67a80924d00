//! # Lenient Decoding
//!
//! The Fastly API is loose about scalar types: integers come back as numbers
//! or strings, booleans as `true`, `"1"`, `1` or `"true"`, and absent strings
//! as `null`. [`Record`] wraps one JSON object from a collection listing and
//! exposes typed accessors that tolerate all of those spellings. The
//! `deserialize_with` helpers do the same for typed response structs.

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One remote object as returned by a list or create call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// String field; `null` and missing become the empty string
    #[must_use]
    pub fn string(&self, key: &str) -> String {
        self.0.get(key).map(value_to_string).unwrap_or_default()
    }

    /// String field with empty values pruned
    #[must_use]
    pub fn opt_string(&self, key: &str) -> Option<String> {
        Some(self.string(key)).filter(|s| !s.is_empty())
    }

    /// Unsigned integer field, zero when absent or unparseable
    #[must_use]
    pub fn uint(&self, key: &str) -> u32 {
        self.opt_uint(key).unwrap_or_default()
    }

    #[must_use]
    pub fn opt_uint(&self, key: &str) -> Option<u32> {
        self.0.get(key).and_then(value_to_u64).and_then(|n| u32::try_from(n).ok())
    }

    /// Boolean field, false when absent
    #[must_use]
    pub fn boolean(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(value_to_bool)
    }

    /// Enumerated string field parsed through the enum's serde names.
    /// Absent or empty is `None`; a value the enum does not know is an error.
    ///
    /// # Errors
    /// Returns an error if the field holds an unknown variant
    pub fn enumeration<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        let Some(raw) = self.opt_string(key) else {
            return Ok(None);
        };
        serde_json::from_value(Value::String(raw.clone()))
            .map(Some)
            .with_context(|| format!("Unexpected value {raw:?} for {key}"))
    }

    /// Whitespace separated list field
    #[must_use]
    pub fn words(&self, key: &str) -> Vec<String> {
        self.string(key)
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Insert a raw value, used by tests and in-memory stores
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Wire name of a serde-named enum variant
#[must_use]
pub fn enum_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        _ => String::new(),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(u64::from(*b)),
        _ => None,
    }
}

fn value_to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_u64().is_some_and(|n| n != 0),
        Value::String(s) => matches!(s.trim(), "1" | "true" | "True" | "TRUE"),
        _ => false,
    }
}

/// `deserialize_with` for strings that may be `null`
///
/// # Errors
/// Never fails for scalar input; returns the deserializer's error otherwise
pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_to_string(&Value::deserialize(deserializer)?))
}

/// `deserialize_with` for integers that may be strings
///
/// # Errors
/// Returns an error when the value is not numeric
pub fn uint<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(0);
    }
    value_to_u64(&value)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| serde::de::Error::custom(format!("expected an integer, got {value}")))
}

/// `deserialize_with` for 64-bit sizes that may be strings
///
/// # Errors
/// Returns an error when the value is not numeric
pub fn ulong<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(0);
    }
    value_to_u64(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected an integer, got {value}")))
}

/// `deserialize_with` for booleans spelled as numbers or strings
///
/// # Errors
/// Never fails for scalar input; returns the deserializer's error otherwise
pub fn boolean<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(value_to_bool(&Value::deserialize(deserializer)?))
}
