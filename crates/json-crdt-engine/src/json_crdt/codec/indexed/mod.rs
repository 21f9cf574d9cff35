//! Indexed document snapshots.
//!
//! A snapshot is a map from field name to bytes:
//!
//! - `"c"`: clock table. Entry 0 is the document's own session and time.
//! - `"r"`: root register (write id, value id).
//! - `"<session index>_<time>"`, both in base 36: one node.
//!
//! Fields can be stored individually (e.g. as keys of a key-value store) or
//! packed with [`to_blob`].

mod binary;

pub use binary::{decode, encode};

use std::collections::BTreeMap;

use thiserror::Error;

use crate::json_crdt::nodes::rga::RgaError;
use crate::json_crdt_patch::clock::Ts;
use crate::json_crdt_patch::codec::{DecodeError, EncodeError};
use crate::json_crdt_patch::util::binary::{CrdtReader, CrdtWriter};

/// Field name → field bytes.
pub type IndexedFields = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot has no clock table")]
    MissingClock,
    #[error("clock table is empty")]
    EmptyClock,
    #[error("invalid node field name {0:?}")]
    InvalidFieldName(String),
    #[error("node {0} appears more than once")]
    DuplicateNode(Ts),
    #[error("node {id} has unknown type {tag}")]
    UnknownNodeType { id: Ts, tag: u8 },
    #[error("id {0} is not covered by the clock table")]
    UnmappedId(Ts),
    #[error("chunk of node {node}: {source}")]
    Chunk {
        node: Ts,
        #[source]
        source: RgaError,
    },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Packs fields into one byte string: `vu57` field count, then per field a
/// length-prefixed name and length-prefixed value.
pub fn to_blob(fields: &IndexedFields) -> Vec<u8> {
    let mut w = CrdtWriter::with_capacity(fields.values().map(|v| v.len() + 8).sum());
    w.vu57(fields.len() as u64);
    for (name, value) in fields {
        w.str(name);
        w.vu57(value.len() as u64);
        w.buf(value);
    }
    w.flush()
}

pub fn from_blob(data: &[u8]) -> Result<IndexedFields, SnapshotError> {
    let mut r = CrdtReader::new(data);
    let count = r.length()?;
    let mut fields = IndexedFields::new();
    for _ in 0..count {
        let name = r.str()?.to_owned();
        let len = r.length()?;
        let value = r.buf(len)?.to_vec();
        if fields.insert(name, value).is_some() {
            return Err(DecodeError::InvalidStructure("duplicate snapshot field").into());
        }
    }
    if !r.is_eof() {
        return Err(DecodeError::TrailingBytes(r.remaining()).into());
    }
    Ok(fields)
}
