//! Binary codec for patches.
//!
//! Layout:
//!
//! ```text
//! vu57 session count, vu57 session ids   (index 0 is the patch session)
//! vu57 start time
//! vu57 operation count
//! per operation: opcode octet, operands
//! ```
//!
//! The opcode octet is `opcode << 3 | n`, where `n` is an inline length in
//! `1..=7`, or 0 when the length follows as `vu57`. Ids are written as
//! `id(session index, time)`. Operation ids are not stored: the first op
//! starts at the header time and each op starts where the previous ended.

mod decoder;
mod encoder;

pub use decoder::Decoder;
pub use encoder::Encoder;

use crate::json_crdt_patch::codec::{DecodeError, EncodeError};
use crate::json_crdt_patch::patch::Patch;

pub fn encode(patch: &Patch) -> Result<Vec<u8>, EncodeError> {
    Encoder::new().encode(patch)
}

pub fn decode(data: &[u8]) -> Result<Patch, DecodeError> {
    Decoder::new(data).decode()
}
