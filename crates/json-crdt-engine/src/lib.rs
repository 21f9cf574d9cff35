//! json-crdt-engine: replicated JSON documents built from CRDT primitives.
//!
//! Two layers:
//! - [`json_crdt_patch`]: logical clocks, timestamps, the operation set,
//!   patches, the patch builder and the patch codecs (binary, verbose JSON,
//!   compact JSON).
//! - [`json_crdt`]: the node algebra (constants, LWW registers, RGA
//!   sequences), the identifier index, the [`Model`](json_crdt::Model) apply
//!   engine and the indexed document snapshot codec.
//!
//! Replicas exchange [`Patch`](json_crdt_patch::Patch)es. Applying the same
//! set of patches in any order, any number of times, yields the same view.

pub mod json_crdt;
pub mod json_crdt_patch;
