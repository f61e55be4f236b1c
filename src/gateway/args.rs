//! Argument parsing shared by the tool executors
//!
//! Every check here runs before any request reaches kintone.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::error::{GatewayError, Result};

/// Decode a tool's `arguments` object into its argument struct
pub fn parse<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments)
        .map_err(|e| GatewayError::params(format!("Failed to parse parameters: {}", e)))
}

/// Fail with `message` unless every value is non-empty
pub fn require(values: &[&str], message: &str) -> Result<()> {
    if values.iter().any(|v| v.trim().is_empty()) {
        return Err(GatewayError::params(message));
    }
    Ok(())
}

/// A record ID given either as a string or as an integer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordId(String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(RecordId(s.trim().to_string())),
            Value::Number(n) if n.is_u64() => Ok(RecordId(n.to_string())),
            Value::Null => Ok(RecordId::default()),
            other => Err(de::Error::custom(format!(
                "record ID must be a string or a non-negative integer, got {}",
                other
            ))),
        }
    }
}

/// Range-checked page size; absent or zero means `default`
pub fn limit(value: Option<i64>, default: i64, max: i64, message: &str) -> Result<i64> {
    match value {
        None | Some(0) => Ok(default),
        Some(n) if (1..=max).contains(&n) => Ok(n),
        Some(_) => Err(GatewayError::params(message)),
    }
}

/// Range-checked offset; absent means zero
pub fn offset(value: Option<i64>, max: Option<i64>, message: &str) -> Result<i64> {
    let n = value.unwrap_or(0);
    if n < 0 || max.is_some_and(|m| n > m) {
        return Err(GatewayError::params(message));
    }
    Ok(n)
}
