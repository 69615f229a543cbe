//! Typed accessors over the flat persisted dictionary.

use serde_json::{Map, Value};

use crate::error::{MixLoraError, Result};

fn malformed(field: &'static str, message: &str) -> MixLoraError {
    MixLoraError::MalformedField {
        field,
        message: message.into(),
    }
}

pub(crate) fn require<'a>(config: &'a Map<String, Value>, key: &'static str) -> Result<&'a Value> {
    config.get(key).ok_or(MixLoraError::MissingField(key))
}

fn as_usize(value: &Value, key: &'static str) -> Result<usize> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| malformed(key, "expected a non-negative integer"))
}

fn as_f64(value: &Value, key: &'static str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| malformed(key, "expected a number"))
}

fn as_bool(value: &Value, key: &'static str) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| malformed(key, "expected a boolean"))
}

fn as_str<'a>(value: &'a Value, key: &'static str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| malformed(key, "expected a string"))
}

pub(crate) fn require_usize(config: &Map<String, Value>, key: &'static str) -> Result<usize> {
    as_usize(require(config, key)?, key)
}

pub(crate) fn require_f64(config: &Map<String, Value>, key: &'static str) -> Result<f64> {
    as_f64(require(config, key)?, key)
}

pub(crate) fn require_str<'a>(
    config: &'a Map<String, Value>,
    key: &'static str,
) -> Result<&'a str> {
    as_str(require(config, key)?, key)
}

pub(crate) fn opt_usize(
    config: &Map<String, Value>,
    key: &'static str,
    default: usize,
) -> Result<usize> {
    config.get(key).map_or(Ok(default), |v| as_usize(v, key))
}

pub(crate) fn opt_f64(
    config: &Map<String, Value>,
    key: &'static str,
    default: f64,
) -> Result<f64> {
    config.get(key).map_or(Ok(default), |v| as_f64(v, key))
}

pub(crate) fn opt_bool(
    config: &Map<String, Value>,
    key: &'static str,
    default: bool,
) -> Result<bool> {
    config.get(key).map_or(Ok(default), |v| as_bool(v, key))
}

pub(crate) fn opt_string(
    config: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<String>> {
    config
        .get(key)
        .map(|v| as_str(v, key).map(str::to_owned))
        .transpose()
}
