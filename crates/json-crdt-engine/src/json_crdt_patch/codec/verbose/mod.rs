//! Verbose JSON patch format: one object per operation, keyed by mnemonic.
//!
//! ```json
//! {"id": [123456, 1], "ops": [
//!   {"op": "new_str"},
//!   {"op": "ins_str", "obj": [123456, 1], "after": [123456, 1], "value": "hi"}
//! ]}
//! ```
//!
//! Timestamps are `[sid, time]`, or a bare `time` for the server session.
//! Operation ids are implied by position.

mod decode;
mod encode;

pub use decode::decode;
pub use encode::encode;
