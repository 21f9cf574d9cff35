//! Wire formats for patches.
//!
//! - `binary`: compact binary format (primary wire format)
//! - `verbose`: human-readable JSON object format
//! - `compact`: JSON arrays with delta-encoded timestamps
//! - `clock`: session tables shared with the document snapshot codec

pub mod binary;
pub mod clock;
pub mod compact;
mod json;
pub mod verbose;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("cannot encode an empty patch")]
    EmptyPatch,
    #[error("operation {index} starts at {found}, expected {expected}")]
    NonContiguous {
        index: usize,
        expected: String,
        found: String,
    },
    #[error("constant value cannot be encoded: {0}")]
    InvalidConstant(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    #[error("unknown operation {0:?}")]
    UnknownOperation(String),
    #[error("invalid CBOR constant: {0}")]
    InvalidCbor(String),
    #[error("invalid UTF-8 string")]
    InvalidUtf8,
    #[error("invalid base64 payload")]
    InvalidBase64,
    #[error("invalid structure: {0}")]
    InvalidStructure(&'static str),
    #[error("unknown session index {0}")]
    UnknownSession(u64),
    #[error("value does not fit 53 bits")]
    Overflow,
    #[error("{0} trailing bytes after the last operation")]
    TrailingBytes(usize),
}

/// Checks that `patch` can be written by a codec that derives op ids from
/// their position: non-empty, one session, no gaps.
pub(crate) fn check_contiguous(
    patch: &crate::json_crdt_patch::Patch,
) -> Result<crate::json_crdt_patch::Ts, EncodeError> {
    use crate::json_crdt_patch::clock::{print_ts, ts};
    let id = patch.get_id().ok_or(EncodeError::EmptyPatch)?;
    let mut next = id.time;
    for (index, op) in patch.ops.iter().enumerate() {
        let op_id = op.id();
        if op_id != ts(id.sid, next) {
            return Err(EncodeError::NonContiguous {
                index,
                expected: print_ts(ts(id.sid, next)),
                found: print_ts(op_id),
            });
        }
        next = next.saturating_add(op.span());
    }
    Ok(id)
}

/// Moves a decoder's running time past an op of `span` ids. Every id the op
/// covers must stay within 53 bits.
pub(crate) fn advance(time: u64, span: u64) -> Result<u64, DecodeError> {
    match time.checked_add(span) {
        Some(end) if end <= crate::json_crdt_patch::enums::SESSION::MAX + 1 => Ok(end),
        _ => Err(DecodeError::Overflow),
    }
}
