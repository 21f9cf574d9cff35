//! Compact JSON patch format: a flat array of positional op arrays.
//!
//! ```json
//! [[123456, 1], [4], [12, -1, -1, "hi"]]
//! ```
//!
//! The header is `[sid, time]`, or a bare `time` for server-clock patches.
//! Each op is `[opcode, ...operands]`. Timestamps are delta-encoded against
//! the header:
//! - a negative number `-(k + 1)` is the patch session at `time + k`;
//! - a non-negative number is a server-session time;
//! - `[sid, time]` is any other timestamp.

mod decode;
mod encode;

pub use decode::decode;
pub use encode::encode;
