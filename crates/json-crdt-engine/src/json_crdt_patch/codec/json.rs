//! Field readers shared by the JSON patch codecs.

use crate::json_crdt_patch::codec::DecodeError;
use crate::json_crdt_patch::enums::SESSION;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};

pub(crate) fn u53(v: &Value, what: &'static str) -> Result<u64, DecodeError> {
    let n = v.as_u64().ok_or(DecodeError::InvalidStructure(what))?;
    if n > SESSION::MAX {
        return Err(DecodeError::Overflow);
    }
    Ok(n)
}

pub(crate) fn array<'a>(v: &'a Value, what: &'static str) -> Result<&'a [Value], DecodeError> {
    v.as_array()
        .map(Vec::as_slice)
        .ok_or(DecodeError::InvalidStructure(what))
}

pub(crate) fn object<'a>(
    v: &'a Value,
    what: &'static str,
) -> Result<&'a Map<String, Value>, DecodeError> {
    v.as_object().ok_or(DecodeError::InvalidStructure(what))
}

pub(crate) fn field<'a>(
    obj: &'a Map<String, Value>,
    key: &'static str,
) -> Result<&'a Value, DecodeError> {
    obj.get(key).ok_or(DecodeError::InvalidStructure(key))
}

pub(crate) fn string<'a>(v: &'a Value, what: &'static str) -> Result<&'a str, DecodeError> {
    v.as_str().ok_or(DecodeError::InvalidStructure(what))
}

/// The `i`-th element of a positional op array.
pub(crate) fn at<'a>(items: &'a [Value], i: usize) -> Result<&'a Value, DecodeError> {
    items
        .get(i)
        .ok_or(DecodeError::InvalidStructure("missing operand"))
}

pub(crate) fn to_base64(data: &[u8]) -> Value {
    Value::String(STANDARD.encode(data))
}

pub(crate) fn from_base64(v: &Value) -> Result<Vec<u8>, DecodeError> {
    let s = string(v, "binary payload must be a base64 string")?;
    STANDARD.decode(s).map_err(|_| DecodeError::InvalidBase64)
}

/// Rejects insert payloads that would consume no clock cycles.
pub(crate) fn non_empty<T>(data: T, len: usize) -> Result<T, DecodeError> {
    if len == 0 {
        return Err(DecodeError::InvalidStructure("empty insert"));
    }
    Ok(data)
}
