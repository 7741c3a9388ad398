use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::value::{Value, ValueKind};

pub fn to_bool(key: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(value) => Ok(*value),
        Value::Int(value) => Ok(*value != 0),
        Value::String(raw) => match raw.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(Error::type_mismatch(
                key,
                ValueKind::Bool,
                format!("string '{raw}'"),
            )),
        },
        other => Err(Error::type_mismatch(key, ValueKind::Bool, other.kind())),
    }
}

pub fn to_int(key: &str, value: &Value) -> Result<i64> {
    match value {
        Value::Int(value) => Ok(*value),
        Value::Float(value) => {
            let truncated = value.trunc();
            // i64::MAX is not exactly representable; the bound is exclusive.
            if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64
            {
                Ok(truncated as i64)
            } else {
                Err(Error::type_mismatch(
                    key,
                    ValueKind::Int,
                    format!("float {value} outside int range"),
                ))
            }
        }
        Value::String(raw) => raw.parse::<i64>().map_err(|_| {
            Error::type_mismatch(key, ValueKind::Int, format!("string '{raw}'"))
        }),
        other => Err(Error::type_mismatch(key, ValueKind::Int, other.kind())),
    }
}

pub fn to_float(key: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Float(value) => Ok(*value),
        Value::Int(value) => Ok(*value as f64),
        Value::String(raw) => raw.parse::<f64>().map_err(|_| {
            Error::type_mismatch(key, ValueKind::Float, format!("string '{raw}'"))
        }),
        other => Err(Error::type_mismatch(key, ValueKind::Float, other.kind())),
    }
}

pub fn to_string(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(value) => Ok(value.clone()),
        other => Err(Error::type_mismatch(key, ValueKind::String, other.kind())),
    }
}

pub fn to_array(key: &str, value: &Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        other => Err(Error::type_mismatch(key, ValueKind::Array, other.kind())),
    }
}

pub fn to_map(key: &str, value: &Value) -> Result<BTreeMap<String, Value>> {
    match value {
        Value::Map(entries) => Ok(entries.clone()),
        other => Err(Error::type_mismatch(key, ValueKind::Map, other.kind())),
    }
}
