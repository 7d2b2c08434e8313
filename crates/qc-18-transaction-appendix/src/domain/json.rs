//! Typed accessors over JSON attachment objects.

use super::errors::{AppendixError, AppendixResult};
use serde_json::{Map, Value};

/// JSON object carrying one or more appendices.
pub type JsonObject = Map<String, Value>;

pub fn get_str<'a>(json: &'a JsonObject, field: &'static str) -> AppendixResult<&'a str> {
    match json.get(field) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(AppendixError::invalid_json(
            field,
            format!("expected string, got {other}"),
        )),
        None => Err(AppendixError::invalid_json(field, "missing")),
    }
}

pub fn get_hex(json: &JsonObject, field: &'static str) -> AppendixResult<Vec<u8>> {
    hex::decode(get_str(json, field)?)
        .map_err(|e| AppendixError::invalid_json(field, e.to_string()))
}

/// Absent or non-boolean values read as `false`.
pub fn get_flag(json: &JsonObject, field: &str) -> bool {
    matches!(json.get(field), Some(Value::Bool(true)))
}

pub fn get_u64(json: &JsonObject, field: &'static str) -> AppendixResult<u64> {
    match json.get(field) {
        Some(value) => value.as_u64().ok_or_else(|| {
            AppendixError::invalid_json(field, format!("expected unsigned integer, got {value}"))
        }),
        None => Err(AppendixError::invalid_json(field, "missing")),
    }
}

pub fn get_u32(json: &JsonObject, field: &'static str) -> AppendixResult<u32> {
    let value = get_u64(json, field)?;
    u32::try_from(value)
        .map_err(|_| AppendixError::invalid_json(field, format!("{value} out of range")))
}

pub fn get_u8(json: &JsonObject, field: &'static str) -> AppendixResult<u8> {
    let value = get_u64(json, field)?;
    u8::try_from(value)
        .map_err(|_| AppendixError::invalid_json(field, format!("{value} out of range")))
}

pub fn get_object<'a>(json: &'a JsonObject, field: &'static str) -> AppendixResult<&'a JsonObject> {
    json.get(field)
        .and_then(Value::as_object)
        .ok_or_else(|| AppendixError::invalid_json(field, "expected object"))
}

pub fn get_u64_array(json: &JsonObject, field: &'static str) -> AppendixResult<Vec<u64>> {
    let items = json
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| AppendixError::invalid_json(field, "expected array"))?;
    items
        .iter()
        .map(|item| {
            item.as_u64().ok_or_else(|| {
                AppendixError::invalid_json(field, format!("expected unsigned integer, got {item}"))
            })
        })
        .collect()
}
