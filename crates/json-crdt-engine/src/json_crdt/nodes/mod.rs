//! JSON CRDT node types.
//!
//! | Rust type  | Semantics                                  |
//! |------------|--------------------------------------------|
//! | `ConNode`  | Immutable constant value                   |
//! | `ValNode`  | Last-write-wins register (also the root)   |
//! | `ObjNode`  | Map of LWW registers, one per key          |
//! | `StrNode`  | RGA string                                 |
//! | `BinNode`  | RGA byte sequence                          |
//! | `ArrNode`  | RGA array of node references               |

pub mod rga;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::json_crdt_patch::clock::{Ts, Tss};
use crate::json_crdt_patch::constants::{ORIGIN, UNDEFINED};
use crate::json_crdt_patch::enums::JsonCrdtDataType;
use rga::{ChunkLayout, Rga, RgaError};

// ── ConNode ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ConNode {
    pub id: Ts,
    pub val: Value,
}

impl ConNode {
    pub fn new(id: Ts, val: Value) -> Self {
        Self { id, val }
    }
}

// ── ValNode ───────────────────────────────────────────────────────────────

/// Last-write-wins register holding a reference to another node.
///
/// `write` is the stamp of the winning write. A write replaces the value
/// only when its stamp is strictly greater, so replays and reorderings of
/// the same writes settle on the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValNode {
    pub id: Ts,
    pub write: Ts,
    pub val: Ts,
}

impl ValNode {
    /// A register created by op `id` pointing at `val`; the creation counts
    /// as its first write.
    pub fn new(id: Ts, val: Ts) -> Self {
        Self { id, write: id, val }
    }

    /// The document root: addressed by `ORIGIN`, empty until written.
    pub fn root() -> Self {
        Self {
            id: ORIGIN,
            write: ORIGIN,
            val: UNDEFINED,
        }
    }

    /// Applies a write; returns the displaced value if it won.
    pub fn set(&mut self, write: Ts, val: Ts) -> Option<Ts> {
        if write <= self.write {
            return None;
        }
        self.write = write;
        Some(std::mem::replace(&mut self.val, val))
    }
}

// ── ObjNode ───────────────────────────────────────────────────────────────

/// One key register of an [`ObjNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjEntry {
    pub write: Ts,
    pub val: Ts,
}

/// Map of independent LWW registers. Keys are never removed; writing
/// `UNDEFINED` hides a key from the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjNode {
    pub id: Ts,
    pub keys: BTreeMap<String, ObjEntry>,
}

impl ObjNode {
    pub fn new(id: Ts) -> Self {
        Self {
            id,
            keys: BTreeMap::new(),
        }
    }

    /// Writes `key`. Returns `Some(previous)` when the write won, where
    /// `previous` is `None` for a key seen for the first time.
    pub fn put(&mut self, key: &str, write: Ts, val: Ts) -> Option<Option<Ts>> {
        match self.keys.get_mut(key) {
            Some(entry) if write <= entry.write => None,
            Some(entry) => {
                entry.write = write;
                Some(Some(std::mem::replace(&mut entry.val, val)))
            }
            None => {
                self.keys.insert(key.to_owned(), ObjEntry { write, val });
                Some(None)
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Ts> {
        self.keys.get(key).map(|e| e.val)
    }
}

// ── RGA nodes ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StrNode {
    pub id: Ts,
    pub rga: Rga<String>,
}

impl StrNode {
    pub fn new(id: Ts) -> Self {
        Self { id, rga: Rga::new() }
    }

    /// Inserts after unit `after`; the node's own id addresses the start.
    pub fn ins(&mut self, after: Ts, id: Ts, data: String) -> Result<usize, RgaError> {
        let anchor = (after != self.id).then_some(after);
        self.rga.insert(anchor, id, data)
    }

    pub fn delete(&mut self, spans: &[Tss]) -> u64 {
        self.rga.delete(spans)
    }

    pub fn view(&self) -> String {
        self.rga.iter().filter_map(|c| c.data.as_deref()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct BinNode {
    pub id: Ts,
    pub rga: Rga<Vec<u8>>,
}

impl BinNode {
    pub fn new(id: Ts) -> Self {
        Self { id, rga: Rga::new() }
    }

    pub fn ins(&mut self, after: Ts, id: Ts, data: Vec<u8>) -> Result<usize, RgaError> {
        let anchor = (after != self.id).then_some(after);
        self.rga.insert(anchor, id, data)
    }

    pub fn delete(&mut self, spans: &[Tss]) -> u64 {
        self.rga.delete(spans)
    }

    pub fn view(&self) -> Vec<u8> {
        self.rga
            .iter()
            .filter_map(|c| c.data.as_deref())
            .flatten()
            .copied()
            .collect()
    }
}

/// Array of references to other nodes.
#[derive(Debug, Clone)]
pub struct ArrNode {
    pub id: Ts,
    pub rga: Rga<Vec<Ts>>,
}

impl ArrNode {
    pub fn new(id: Ts) -> Self {
        Self { id, rga: Rga::new() }
    }

    pub fn ins(&mut self, after: Ts, id: Ts, data: Vec<Ts>) -> Result<usize, RgaError> {
        let anchor = (after != self.id).then_some(after);
        self.rga.insert(anchor, id, data)
    }

    pub fn delete(&mut self, spans: &[Tss]) -> u64 {
        self.rga.delete(spans)
    }

    /// Visible element references in order.
    pub fn elements(&self) -> Vec<Ts> {
        self.rga
            .iter()
            .filter_map(|c| c.data.as_deref())
            .flatten()
            .copied()
            .collect()
    }
}

// ── CrdtNode ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum CrdtNode {
    Con(ConNode),
    Val(ValNode),
    Obj(ObjNode),
    Str(StrNode),
    Bin(BinNode),
    Arr(ArrNode),
}

impl CrdtNode {
    pub fn id(&self) -> Ts {
        match self {
            CrdtNode::Con(n) => n.id,
            CrdtNode::Val(n) => n.id,
            CrdtNode::Obj(n) => n.id,
            CrdtNode::Str(n) => n.id,
            CrdtNode::Bin(n) => n.id,
            CrdtNode::Arr(n) => n.id,
        }
    }

    pub fn data_type(&self) -> JsonCrdtDataType {
        match self {
            CrdtNode::Con(_) => JsonCrdtDataType::Con,
            CrdtNode::Val(_) => JsonCrdtDataType::Val,
            CrdtNode::Obj(_) => JsonCrdtDataType::Obj,
            CrdtNode::Str(_) => JsonCrdtDataType::Str,
            CrdtNode::Bin(_) => JsonCrdtDataType::Bin,
            CrdtNode::Arr(_) => JsonCrdtDataType::Arr,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CrdtNode::Con(_) => "con",
            CrdtNode::Val(_) => "val",
            CrdtNode::Obj(_) => "obj",
            CrdtNode::Str(_) => "str",
            CrdtNode::Bin(_) => "bin",
            CrdtNode::Arr(_) => "arr",
        }
    }

    /// Chunk layout of a sequence node; `None` for the other kinds.
    pub fn layout(&self) -> Option<Vec<ChunkLayout>> {
        match self {
            CrdtNode::Str(n) => Some(n.rga.layout()),
            CrdtNode::Bin(n) => Some(n.rga.layout()),
            CrdtNode::Arr(n) => Some(n.rga.layout()),
            CrdtNode::Con(_) | CrdtNode::Val(_) | CrdtNode::Obj(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_crdt_patch::clock::{ts, tss};

    #[test]
    fn register_keeps_greatest_write() {
        let mut reg = ValNode::new(ts(5, 1), UNDEFINED);
        assert_eq!(reg.set(ts(5, 3), ts(5, 2)), Some(UNDEFINED));
        assert_eq!(reg.set(ts(5, 2), ts(9, 9)), None);
        assert_eq!(reg.set(ts(5, 3), ts(9, 9)), None);
        // Sessions order before times.
        assert_eq!(reg.set(ts(6, 1), ts(6, 0)), Some(ts(5, 2)));
        assert_eq!(reg.val, ts(6, 0));
        assert_eq!(reg.write, ts(6, 1));
    }

    #[test]
    fn root_starts_undefined_and_accepts_any_write() {
        let mut root = ValNode::root();
        assert_eq!(root.val, UNDEFINED);
        assert_eq!(root.set(ts(2, 0), ts(2, 0)), Some(UNDEFINED));
    }

    #[test]
    fn object_keys_are_independent_registers() {
        let mut obj = ObjNode::new(ts(1, 1));
        assert_eq!(obj.put("a", ts(1, 5), ts(1, 2)), Some(None));
        assert_eq!(obj.put("b", ts(1, 4), ts(1, 3)), Some(None));
        assert_eq!(obj.put("a", ts(1, 4), ts(1, 3)), None);
        assert_eq!(obj.put("a", ts(1, 6), ts(1, 3)), Some(Some(ts(1, 2))));
        assert_eq!(obj.get("a"), Some(ts(1, 3)));
        assert_eq!(obj.get("b"), Some(ts(1, 3)));
        assert_eq!(obj.get("c"), None);
    }

    #[test]
    fn node_id_addresses_sequence_start() {
        let mut s = StrNode::new(ts(3, 1));
        s.ins(ts(3, 1), ts(3, 2), "world".into()).expect("insert must succeed");
        s.ins(ts(3, 1), ts(3, 7), "hello ".into()).expect("insert must succeed");
        assert_eq!(s.view(), "world");
        // (3, 7) sorts after (3, 2) among start children.
        let mut t = StrNode::new(ts(3, 1));
        t.ins(ts(3, 1), ts(3, 7), "hello ".into()).expect("insert must succeed");
        t.ins(ts(3, 1), ts(3, 2), "world".into()).expect("insert must succeed");
        assert_eq!(t.view(), s.view());
    }

    #[test]
    fn binary_and_array_views() {
        let mut b = BinNode::new(ts(1, 1));
        b.ins(ts(1, 1), ts(1, 2), vec![1, 2, 3]).expect("insert must succeed");
        b.delete(&[tss(1, 3, 1)]);
        assert_eq!(b.view(), vec![1, 3]);
        let mut a = ArrNode::new(ts(1, 1));
        a.ins(ts(1, 1), ts(1, 2), vec![ts(4, 4)]).expect("insert must succeed");
        a.ins(ts(1, 2), ts(1, 3), vec![ts(5, 5)]).expect("insert must succeed");
        assert_eq!(a.elements(), vec![ts(4, 4), ts(5, 5)]);
    }
}
