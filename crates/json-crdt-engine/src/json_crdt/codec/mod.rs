//! JSON CRDT document codecs.
//!
//! - [`indexed`]: one field per node in a name → bytes map, packable into a
//!   single blob. Tombstones and chunk anchors are kept, so a restored
//!   document merges exactly like the one it was taken from.

pub mod indexed;
