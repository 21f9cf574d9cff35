//! Positional editing on top of [`Model`].
//!
//! [`ModelApi`] turns "insert `text` at position 4 of the string at
//! `["doc", 1]`" into a patch: it resolves the node, picks anchors from the
//! current sequence layout, builds the ops with a [`PatchBuilder`], applies
//! them locally and returns the patch so it can be shipped to peers.
//!
//! Paths are slices of JSON values: strings step into object keys and
//! non-negative integers step into array positions. `val` registers met on
//! the way are followed to the node they point at.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::json_crdt::model::{ApplyError, Model};
use crate::json_crdt::nodes::rga::{ChunkData, Rga};
use crate::json_crdt::nodes::CrdtNode;
use crate::json_crdt_patch::clock::{Ts, Tss};
use crate::json_crdt_patch::patch::Patch;
use crate::json_crdt_patch::patch_builder::PatchBuilder;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("no node at {0}")]
    NotFound(Ts),
    #[error("path step {0} is neither a key nor an index")]
    InvalidPath(Value),
    #[error("expected {expected} node at {node}, found {found}")]
    WrongType {
        node: Ts,
        expected: &'static str,
        found: &'static str,
    },
    #[error("position {pos} is past the end of {node} (length {len})")]
    OutOfBounds { node: Ts, pos: usize, len: usize },
    #[error("edit writes nothing")]
    EmptyWrite,
    #[error("local edit rejected at {0}: {1}")]
    Rejected(Ts, ApplyError),
}

/// Editing handle over a document; see [`Model::api`].
pub struct ModelApi<'a> {
    model: &'a mut Model,
}

impl<'a> ModelApi<'a> {
    pub fn new(model: &'a mut Model) -> Self {
        Self { model }
    }

    // ── Navigation ───────────────────────────────────────────────────────

    /// Node at `path`, starting from the document root. An empty path
    /// resolves the root value itself.
    pub fn find(&self, path: &[Value]) -> Result<Ts, ApiError> {
        let mut id = self.deref(self.model.root.val)?;
        for step in path {
            let next = match (step, self.model.node(id)) {
                (Value::String(key), Some(CrdtNode::Obj(obj))) => {
                    obj.get(key).ok_or(ApiError::NotFound(id))?
                }
                (Value::Number(n), Some(CrdtNode::Arr(arr))) => {
                    let elements = arr.elements();
                    let pos = n
                        .as_u64()
                        .and_then(|p| usize::try_from(p).ok())
                        .ok_or_else(|| ApiError::InvalidPath(step.clone()))?;
                    *elements.get(pos).ok_or(ApiError::OutOfBounds {
                        node: id,
                        pos,
                        len: elements.len(),
                    })?
                }
                (Value::String(_), Some(node)) => return Err(wrong_type(node, "obj")),
                (Value::Number(_), Some(node)) => return Err(wrong_type(node, "arr")),
                (Value::String(_) | Value::Number(_), None) => return Err(ApiError::NotFound(id)),
                _ => return Err(ApiError::InvalidPath(step.clone())),
            };
            id = self.deref(next)?;
        }
        Ok(id)
    }

    /// Follows `val` registers from `id` to the node they finally point at.
    fn deref(&self, mut id: Ts) -> Result<Ts, ApiError> {
        for _ in 0..=self.model.nodes.len() {
            match self.model.node(id) {
                Some(CrdtNode::Val(v)) => id = v.val,
                Some(_) => return Ok(id),
                None => return Err(ApiError::NotFound(id)),
            }
        }
        Err(ApiError::NotFound(id))
    }

    // ── Whole values ─────────────────────────────────────────────────────

    /// Replaces the document with `json`.
    pub fn root(&mut self, json: &Value) -> Result<Patch, ApiError> {
        let mut b = self.model.builder();
        let value = b.json(json);
        b.root(value);
        self.commit(b)
    }

    /// Writes `entries` into the object `obj`, creating a node per value.
    pub fn obj_set(&mut self, obj: Ts, entries: &[(&str, Value)]) -> Result<Patch, ApiError> {
        match self.model.node(obj) {
            Some(CrdtNode::Obj(_)) => {}
            Some(node) => return Err(wrong_type(node, "obj")),
            None => return Err(ApiError::NotFound(obj)),
        }
        if entries.is_empty() {
            return Err(ApiError::EmptyWrite);
        }
        let mut b = self.model.builder();
        let keys = entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), b.json(value)))
            .collect();
        b.ins_obj(obj, keys);
        self.commit(b)
    }

    // ── Sequences ────────────────────────────────────────────────────────

    /// Inserts `text` so that its first character lands at position `pos`.
    pub fn str_ins(&mut self, node: Ts, pos: usize, text: &str) -> Result<Patch, ApiError> {
        if text.is_empty() {
            return Err(ApiError::EmptyWrite);
        }
        let after = match self.model.node(node) {
            Some(CrdtNode::Str(n)) => anchor_at(node, &n.rga, pos)?,
            Some(other) => return Err(wrong_type(other, "str")),
            None => return Err(ApiError::NotFound(node)),
        };
        let mut b = self.model.builder();
        b.ins_str(node, after, text);
        self.commit(b)
    }

    /// Deletes up to `len` characters starting at position `pos`.
    pub fn str_del(&mut self, node: Ts, pos: usize, len: usize) -> Result<Patch, ApiError> {
        let spans = match self.model.node(node) {
            Some(CrdtNode::Str(n)) => interval(node, &n.rga, pos, len)?,
            Some(other) => return Err(wrong_type(other, "str")),
            None => return Err(ApiError::NotFound(node)),
        };
        self.delete(node, spans)
    }

    pub fn bin_ins(&mut self, node: Ts, pos: usize, data: &[u8]) -> Result<Patch, ApiError> {
        if data.is_empty() {
            return Err(ApiError::EmptyWrite);
        }
        let after = match self.model.node(node) {
            Some(CrdtNode::Bin(n)) => anchor_at(node, &n.rga, pos)?,
            Some(other) => return Err(wrong_type(other, "bin")),
            None => return Err(ApiError::NotFound(node)),
        };
        let mut b = self.model.builder();
        b.ins_bin(node, after, data.to_vec());
        self.commit(b)
    }

    pub fn bin_del(&mut self, node: Ts, pos: usize, len: usize) -> Result<Patch, ApiError> {
        let spans = match self.model.node(node) {
            Some(CrdtNode::Bin(n)) => interval(node, &n.rga, pos, len)?,
            Some(other) => return Err(wrong_type(other, "bin")),
            None => return Err(ApiError::NotFound(node)),
        };
        self.delete(node, spans)
    }

    /// Inserts `values` at position `pos`; each value becomes a new node.
    pub fn arr_ins(&mut self, node: Ts, pos: usize, values: &[Value]) -> Result<Patch, ApiError> {
        if values.is_empty() {
            return Err(ApiError::EmptyWrite);
        }
        let after = match self.model.node(node) {
            Some(CrdtNode::Arr(n)) => anchor_at(node, &n.rga, pos)?,
            Some(other) => return Err(wrong_type(other, "arr")),
            None => return Err(ApiError::NotFound(node)),
        };
        let mut b = self.model.builder();
        let elements = values.iter().map(|v| b.json(v)).collect();
        b.ins_arr(node, after, elements);
        self.commit(b)
    }

    pub fn arr_del(&mut self, node: Ts, pos: usize, len: usize) -> Result<Patch, ApiError> {
        let spans = match self.model.node(node) {
            Some(CrdtNode::Arr(n)) => interval(node, &n.rga, pos, len)?,
            Some(other) => return Err(wrong_type(other, "arr")),
            None => return Err(ApiError::NotFound(node)),
        };
        self.delete(node, spans)
    }

    // ── Commit ───────────────────────────────────────────────────────────

    fn delete(&mut self, node: Ts, spans: Vec<Tss>) -> Result<Patch, ApiError> {
        let mut b = self.model.builder();
        b.del(node, spans);
        self.commit(b)
    }

    fn commit(&mut self, mut b: PatchBuilder) -> Result<Patch, ApiError> {
        let patch = b.flush();
        let report = self.model.apply_patch(&patch);
        if let Some((id, err)) = report.rejected.into_iter().next() {
            return Err(ApiError::Rejected(id, err));
        }
        debug!(ops = patch.ops.len(), span = patch.span(), "local edit applied");
        Ok(patch)
    }
}

fn wrong_type(node: &CrdtNode, expected: &'static str) -> ApiError {
    ApiError::WrongType {
        node: node.id(),
        expected,
        found: node.name(),
    }
}

/// The unit a new run must follow to start at position `pos`: the node
/// itself for the front, otherwise the visible unit at `pos - 1`.
fn anchor_at<T: ChunkData>(node: Ts, rga: &Rga<T>, pos: usize) -> Result<Ts, ApiError> {
    if pos == 0 {
        return Ok(node);
    }
    rga.find(pos as u64 - 1).ok_or(ApiError::OutOfBounds {
        node,
        pos,
        len: rga.length() as usize,
    })
}

/// Visible spans covering `[pos, pos + len)`, cut at the end of the sequence.
fn interval<T: ChunkData>(node: Ts, rga: &Rga<T>, pos: usize, len: usize) -> Result<Vec<Tss>, ApiError> {
    if len == 0 {
        return Err(ApiError::EmptyWrite);
    }
    let length = rga.length() as usize;
    if pos >= length {
        return Err(ApiError::OutOfBounds { node, pos, len: length });
    }
    Ok(rga.find_interval(pos as u64, len as u64))
}
