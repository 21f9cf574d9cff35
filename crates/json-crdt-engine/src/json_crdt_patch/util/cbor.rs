//! CBOR framing for constant values inside binary formats. Each constant is
//! a `vu57` byte length followed by one CBOR item, so readers never depend
//! on how far the CBOR decoder buffers ahead.

use crate::json_crdt_patch::codec::{DecodeError, EncodeError};
use crate::json_crdt_patch::util::binary::{CrdtReader, CrdtWriter};
use serde_json::Value;

pub fn write(w: &mut CrdtWriter, value: &Value) -> Result<(), EncodeError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|e| EncodeError::InvalidConstant(e.to_string()))?;
    w.vu57(bytes.len() as u64);
    w.buf(&bytes);
    Ok(())
}

pub fn read(r: &mut CrdtReader<'_>) -> Result<Value, DecodeError> {
    let len = r.length()?;
    let bytes = r.buf(len)?;
    ciborium::de::from_reader::<Value, _>(bytes).map_err(|e| DecodeError::InvalidCbor(e.to_string()))
}
