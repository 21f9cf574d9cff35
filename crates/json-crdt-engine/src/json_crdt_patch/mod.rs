//! JSON CRDT Patch protocol.
//!
//! The foundational layer for JSON CRDT collaboration. Defines:
//! - Ids and clocks (`Ts`, `Tss`, the `Clock` trait and its three clocks)
//! - The operation set (`Op` enum)
//! - `Patch`: an ordered, contiguous sequence of operations
//! - `PatchBuilder`: fluent builder for constructing patches
//! - Codecs: `binary`, `verbose`, `compact`

pub mod clock;
pub mod codec;
pub mod constants;
pub mod enums;
pub mod operations;
pub mod patch;
pub mod patch_builder;
pub mod util;

// ── Re-exports ─────────────────────────────────────────────────────────────

pub use clock::{contains, contains_id, interval, print_ts, tick, ts, tss};
pub use clock::{Clock, ClockError, ClockVector, LogicalClock, ServerClockVector, Ts, Tss};
pub use constants::{ORIGIN, UNDEFINED};
pub use enums::{JsonCrdtDataType, JsonCrdtPatchOpcode, SESSION, SYSTEM_SESSION_TIME};
pub use operations::Op;
pub use patch::{Patch, PatchError};
pub use patch_builder::{BuilderClock, PatchBuilder};
