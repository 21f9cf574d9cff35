//! JSON CRDT document layer: nodes, identifier index, the [`Model`] apply
//! engine and document snapshots.

pub mod codec;
pub mod index;
pub mod model;
pub mod nodes;

pub use index::{EntityKind, IdIndex, IndexEntry};
pub use model::{Applied, ApiError, ApplyError, ApplyReport, Model, ModelApi, ModelClock};
pub use nodes::rga::{Anchor, Chunk, ChunkLayout, Rga, RgaError};
pub use nodes::{ArrNode, BinNode, ConNode, CrdtNode, ObjEntry, ObjNode, StrNode, ValNode};
