//! JSON CRDT document model.
//!
//! A [`Model`] owns the root register, every node created by an applied
//! operation, the [`IdIndex`] resolving ids to nodes and chunks, and the
//! clock minting ids for local edits.
//!
//! Operations are applied via [`Model::apply_patch`] or
//! [`Model::apply_operation`]. Each operation succeeds or fails on its own:
//! an operation addressing a node that has not arrived yet is skipped, a
//! replayed operation is a no-op, and a malformed one is rejected without
//! affecting the rest of its patch.

pub mod api;

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, trace};

use crate::json_crdt::codec::indexed::{self, SnapshotError};
use crate::json_crdt::index::{EntityKind, IdIndex, IndexEntry};
use crate::json_crdt::nodes::rga::{ChunkLayout, RgaError};
use crate::json_crdt::nodes::{
    ArrNode, BinNode, ConNode, CrdtNode, ObjNode, StrNode, ValNode,
};
use crate::json_crdt_patch::clock::{
    random_session_id, Clock, ClockError, ClockVector, ServerClockVector, Ts,
};
use crate::json_crdt_patch::constants::{ORIGIN, UNDEFINED};
use crate::json_crdt_patch::operations::Op;
use crate::json_crdt_patch::patch::Patch;
use crate::json_crdt_patch::patch_builder::PatchBuilder;

pub use api::{ApiError, ModelApi};

// ── Clock ─────────────────────────────────────────────────────────────────

/// Clock of a document: a vector clock for peer-to-peer editing, or a single
/// server-sequenced counter.
#[derive(Debug, Clone)]
pub enum ModelClock {
    Logical(ClockVector),
    Server(ServerClockVector),
}

impl ModelClock {
    fn as_clock(&self) -> &dyn Clock {
        match self {
            ModelClock::Logical(c) => c,
            ModelClock::Server(c) => c,
        }
    }

    pub fn sid(&self) -> u64 {
        self.as_clock().sid()
    }

    pub fn time(&self) -> u64 {
        self.as_clock().time()
    }

    pub fn observe(&mut self, id: Ts, span: u64) -> Result<(), ClockError> {
        match self {
            ModelClock::Logical(c) => {
                c.observe(id, span);
                Ok(())
            }
            ModelClock::Server(c) => c.observe(id, span),
        }
    }
}

impl fmt::Display for ModelClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelClock::Logical(c) => fmt::Display::fmt(c, f),
            ModelClock::Server(c) => fmt::Display::fmt(c, f),
        }
    }
}

// ── Apply outcome ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("{op} cannot target {found} node {node}")]
    KindMismatch {
        op: &'static str,
        node: Ts,
        found: &'static str,
    },
    #[error("anchor {anchor} not found in node {node}")]
    UnknownAnchor { node: Ts, anchor: Ts },
    #[error("operation {0} addresses an empty span")]
    MalformedSpan(Ts),
}

/// What happened to one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// The operation's id is already known.
    Duplicate,
    /// The addressed node has not been created yet.
    Skipped,
    Noop,
}

/// Per-patch tally returned by [`Model::apply_patch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub rejected: Vec<(Ts, ApplyError)>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

// ── Model ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Model {
    root: ValNode,
    nodes: HashMap<Ts, CrdtNode>,
    index: IdIndex,
    clock: ModelClock,
    /// Incremented once per applied patch; lets callers cache views.
    pub tick: u64,
}

impl Model {
    /// Empty document edited by session `sid`. Time 0 is left to `ORIGIN`.
    pub fn new(sid: u64) -> Self {
        Self::with_clock(ModelClock::Logical(ClockVector::new(sid, 1)))
    }

    /// Empty document with a random session id.
    pub fn create() -> Self {
        Self::new(random_session_id())
    }

    /// Empty server-sequenced document whose next id is `time`.
    pub fn new_server(time: u64) -> Self {
        Self::with_clock(ModelClock::Server(ServerClockVector::new(time)))
    }

    pub fn with_clock(clock: ModelClock) -> Self {
        Self {
            root: ValNode::root(),
            nodes: HashMap::new(),
            index: IdIndex::new(),
            clock,
            tick: 0,
        }
    }

    /// Rebuilds a document from restored parts, re-indexing every node and
    /// chunk.
    pub(crate) fn from_parts(root: ValNode, nodes: Vec<CrdtNode>, clock: ModelClock) -> Self {
        let mut model = Self::with_clock(clock);
        model.root = root;
        for node in nodes {
            let id = node.id();
            model.index.index(IndexEntry::node(id));
            match &node {
                CrdtNode::Str(n) => index_chunks(&mut model.index, id, n.rga.chunks().map(|c| (c.id, c.span))),
                CrdtNode::Bin(n) => index_chunks(&mut model.index, id, n.rga.chunks().map(|c| (c.id, c.span))),
                CrdtNode::Arr(n) => index_chunks(&mut model.index, id, n.rga.chunks().map(|c| (c.id, c.span))),
                CrdtNode::Con(_) | CrdtNode::Val(_) | CrdtNode::Obj(_) => {}
            }
            model.nodes.insert(id, node);
        }
        model
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn root(&self) -> &ValNode {
        &self.root
    }

    pub fn node(&self, id: Ts) -> Option<&CrdtNode> {
        self.nodes.get(&id)
    }

    /// Node owning `id`, which may be a node id or any unit of a chunk.
    pub fn find(&self, id: Ts) -> Option<&CrdtNode> {
        match self.index.get(id)?.kind {
            EntityKind::Node => self.nodes.get(&id),
            EntityKind::Chunk { node } => self.nodes.get(&node),
        }
    }

    /// All nodes ordered by id.
    pub fn nodes(&self) -> Vec<&CrdtNode> {
        let mut nodes: Vec<&CrdtNode> = self.nodes.values().collect();
        nodes.sort_by_key(|n| n.id());
        nodes
    }

    /// Chunk layout of every sequence node, ordered by node id. Replicas
    /// that saw the same operations have equal layouts.
    pub fn layout(&self) -> Vec<(Ts, Vec<ChunkLayout>)> {
        self.nodes()
            .into_iter()
            .filter_map(|node| Some((node.id(), node.layout()?)))
            .collect()
    }

    pub fn index(&self) -> &IdIndex {
        &self.index
    }

    pub fn clock(&self) -> &ModelClock {
        &self.clock
    }

    /// A builder minting ids from the current clock.
    pub fn builder(&self) -> PatchBuilder {
        match &self.clock {
            ModelClock::Logical(cv) => PatchBuilder::from_clock_vector(cv),
            ModelClock::Server(cv) => PatchBuilder::from_server_clock(cv.clone()),
        }
    }

    /// Positional editing handle; every edit is applied here and returned
    /// as a patch.
    pub fn api(&mut self) -> ModelApi<'_> {
        ModelApi::new(self)
    }

    /// Copy of the document edited by session `sid`.
    pub fn fork(&self, sid: u64) -> Model {
        let clock = match &self.clock {
            ModelClock::Logical(cv) => cv.fork(sid),
            ModelClock::Server(cv) => ClockVector::new(sid, cv.time),
        };
        let mut model = self.clone();
        model.clock = ModelClock::Logical(clock);
        model
    }

    // ── Apply ────────────────────────────────────────────────────────────

    pub fn apply_patch(&mut self, patch: &Patch) -> ApplyReport {
        let mut report = ApplyReport::default();
        for op in &patch.ops {
            match self.apply_operation(op) {
                Ok(Applied::Applied | Applied::Noop) => report.applied += 1,
                Ok(Applied::Duplicate) => report.duplicates += 1,
                Ok(Applied::Skipped) => report.skipped += 1,
                Err(err) => report.rejected.push((op.id(), err)),
            }
        }
        self.tick += 1;
        report
    }

    pub fn apply_operation(&mut self, op: &Op) -> Result<Applied, ApplyError> {
        if let Err(err) = self.clock.observe(op.id(), op.span()) {
            debug!(op = %op, error = %err, "clock did not observe operation");
        }
        let outcome = self.dispatch(op);
        match &outcome {
            Ok(Applied::Applied) => trace!(op = %op, "applied"),
            Ok(Applied::Noop) => {}
            Ok(other) => debug!(op = %op, outcome = ?other, "operation dropped"),
            Err(err) => debug!(op = %op, error = %err, "operation rejected"),
        }
        outcome
    }

    fn dispatch(&mut self, op: &Op) -> Result<Applied, ApplyError> {
        match op {
            Op::NewCon { id, val } => Ok(self.create_node(CrdtNode::Con(ConNode::new(*id, val.clone())))),
            Op::NewVal { id, val } => Ok(self.create_node(CrdtNode::Val(ValNode::new(*id, *val)))),
            Op::NewObj { id } => Ok(self.create_node(CrdtNode::Obj(ObjNode::new(*id)))),
            Op::NewStr { id } => Ok(self.create_node(CrdtNode::Str(StrNode::new(*id)))),
            Op::NewBin { id } => Ok(self.create_node(CrdtNode::Bin(BinNode::new(*id)))),
            Op::NewArr { id } => Ok(self.create_node(CrdtNode::Arr(ArrNode::new(*id)))),

            Op::InsVal { id, obj, val } => {
                if *obj == ORIGIN {
                    self.root.set(*id, *val);
                    return Ok(Applied::Applied);
                }
                match self.nodes.get_mut(obj) {
                    None => Ok(Applied::Skipped),
                    Some(CrdtNode::Val(node)) => {
                        node.set(*id, *val);
                        Ok(Applied::Applied)
                    }
                    Some(other) => Err(mismatch(op, other)),
                }
            }

            Op::InsObj { id, obj, data } => {
                if *obj == ORIGIN {
                    return Err(ApplyError::KindMismatch {
                        op: op.name(),
                        node: ORIGIN,
                        found: "val",
                    });
                }
                if data.is_empty() {
                    return Err(ApplyError::MalformedSpan(*id));
                }
                match self.nodes.get_mut(obj) {
                    None => Ok(Applied::Skipped),
                    Some(CrdtNode::Obj(node)) => {
                        for (key, val) in data {
                            node.put(key, *id, *val);
                        }
                        Ok(Applied::Applied)
                    }
                    Some(other) => Err(mismatch(op, other)),
                }
            }

            Op::InsStr { obj, .. } | Op::InsBin { obj, .. } | Op::InsArr { obj, .. } => {
                self.insert_units(op, *obj)
            }

            Op::Del { id, obj, what } => {
                if what.iter().any(|span| span.span == 0) {
                    return Err(ApplyError::MalformedSpan(*id));
                }
                let removed = match self.nodes.get_mut(obj) {
                    None => return Ok(Applied::Skipped),
                    Some(CrdtNode::Str(node)) => node.delete(what),
                    Some(CrdtNode::Bin(node)) => node.delete(what),
                    Some(CrdtNode::Arr(node)) => node.delete(what),
                    Some(other) => return Err(mismatch(op, other)),
                };
                trace!(node = %obj, removed, "tombstoned units");
                Ok(Applied::Applied)
            }

            Op::Nop { .. } => Ok(Applied::Noop),
        }
    }

    fn create_node(&mut self, node: CrdtNode) -> Applied {
        let id = node.id();
        if !self.index.index(IndexEntry::node(id)) {
            return Applied::Duplicate;
        }
        self.nodes.insert(id, node);
        Applied::Applied
    }

    fn insert_units(&mut self, op: &Op, obj: Ts) -> Result<Applied, ApplyError> {
        let id = op.id();
        let span = op.span();
        let Some(node) = self.nodes.get_mut(&obj) else {
            return Ok(Applied::Skipped);
        };
        if span == 0 {
            return Err(ApplyError::MalformedSpan(id));
        }
        if self.index.overlaps(id, span) {
            return Ok(Applied::Duplicate);
        }
        let inserted = match (node, op) {
            (CrdtNode::Str(n), Op::InsStr { after, data, .. }) => n.ins(*after, id, data.clone()),
            (CrdtNode::Bin(n), Op::InsBin { after, data, .. }) => n.ins(*after, id, data.clone()),
            (CrdtNode::Arr(n), Op::InsArr { after, data, .. }) => n.ins(*after, id, data.clone()),
            (other, _) => return Err(mismatch(op, other)),
        };
        match inserted {
            Ok(_) => {
                self.index.index(IndexEntry::chunk(obj, id, span));
                Ok(Applied::Applied)
            }
            Err(RgaError::AnchorNotFound(anchor)) => Err(ApplyError::UnknownAnchor { node: obj, anchor }),
            Err(RgaError::Duplicate(_)) => Ok(Applied::Duplicate),
            Err(RgaError::EmptyInsert | RgaError::EmptySpan) => Err(ApplyError::MalformedSpan(id)),
        }
    }

    // ── View ─────────────────────────────────────────────────────────────

    /// Plain JSON projection of the document. An empty document is `null`.
    pub fn view(&self) -> Value {
        let mut visiting = HashSet::new();
        self.resolve(self.root.val, &mut visiting).unwrap_or(Value::Null)
    }

    /// View of the node `id`, or `None` when it is unset or unknown.
    pub fn view_node(&self, id: Ts) -> Option<Value> {
        self.resolve(id, &mut HashSet::new())
    }

    fn resolve(&self, id: Ts, visiting: &mut HashSet<Ts>) -> Option<Value> {
        if id == UNDEFINED {
            return None;
        }
        let node = self.nodes.get(&id)?;
        // A register chain that loops back on itself has no value.
        if !visiting.insert(id) {
            return None;
        }
        let value = match node {
            CrdtNode::Con(n) => n.val.clone(),
            CrdtNode::Val(n) => self.resolve(n.val, visiting).unwrap_or(Value::Null),
            CrdtNode::Obj(n) => {
                let mut map = Map::new();
                for (key, entry) in &n.keys {
                    if let Some(v) = self.resolve(entry.val, visiting) {
                        map.insert(key.clone(), v);
                    }
                }
                Value::Object(map)
            }
            CrdtNode::Str(n) => Value::String(n.view()),
            CrdtNode::Bin(n) => Value::Array(n.view().into_iter().map(Value::from).collect()),
            CrdtNode::Arr(n) => Value::Array(
                n.elements()
                    .into_iter()
                    .filter_map(|el| self.resolve(el, visiting))
                    .collect(),
            ),
        };
        visiting.remove(&id);
        Some(value)
    }

    // ── Snapshots ────────────────────────────────────────────────────────

    /// Encodes the document with the indexed snapshot codec.
    pub fn to_binary(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(indexed::to_blob(&indexed::encode(self)?))
    }

    pub fn from_binary(data: &[u8]) -> Result<Model, SnapshotError> {
        indexed::decode(&indexed::from_blob(data)?)
    }
}

fn index_chunks(index: &mut IdIndex, node: Ts, chunks: impl Iterator<Item = (Ts, u64)>) {
    for (id, span) in chunks {
        index.index(IndexEntry::chunk(node, id, span));
    }
}

fn mismatch(op: &Op, node: &CrdtNode) -> ApplyError {
    ApplyError::KindMismatch {
        op: op.name(),
        node: node.id(),
        found: node.name(),
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "model")?;
        writeln!(f, "├─ root {} <- {}", self.root.val, self.root.write)?;
        for node in self.nodes() {
            match node {
                CrdtNode::Con(n) => writeln!(f, "├─ con {} {}", n.id, n.val)?,
                CrdtNode::Val(n) => writeln!(f, "├─ val {} -> {}", n.id, n.val)?,
                CrdtNode::Obj(n) => {
                    write!(f, "├─ obj {}", n.id)?;
                    for (key, entry) in &n.keys {
                        write!(f, " {:?}: {}", key, entry.val)?;
                    }
                    writeln!(f)?;
                }
                CrdtNode::Str(n) => writeln!(f, "├─ str {} {:?}", n.id, n.view())?,
                CrdtNode::Bin(n) => writeln!(f, "├─ bin {} {:?}", n.id, n.view())?,
                CrdtNode::Arr(n) => writeln!(f, "├─ arr {} {:?}", n.id, n.elements())?,
            }
        }
        write!(f, "└─ {}", self.clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_crdt_patch::clock::{ts, tss};
    use crate::json_crdt_patch::enums::SESSION;
    use serde_json::json;

    const S: u64 = 123_456;

    fn string_doc(text: &str) -> (Model, Ts) {
        let mut model = Model::new(S);
        let mut b = model.builder();
        let s = b.str_node();
        b.ins_str(s, s, text);
        b.root(s);
        let report = model.apply_patch(&b.flush());
        assert!(report.is_clean());
        (model, s)
    }

    fn rga_of(model: &Model, id: Ts) -> &crate::json_crdt::nodes::rga::Rga<String> {
        match model.node(id) {
            Some(CrdtNode::Str(n)) => &n.rga,
            other => panic!("expected str node, got {other:?}"),
        }
    }

    #[test]
    fn empty_model_view_is_null() {
        let model = Model::new(S);
        assert_eq!(model.view(), json!(null));
        assert_eq!(model.root().val, UNDEFINED);
    }

    #[test]
    fn builder_json_round_trips_through_view() {
        let mut model = Model::new(S);
        let mut b = model.builder();
        let value = json!({"a": [1, "x", {"b": true}], "c": null, "d": "text"});
        let id = b.json(&value);
        b.root(id);
        let report = model.apply_patch(&b.flush());
        assert_eq!(report.applied, 14);
        assert_eq!(model.view(), value);
    }

    #[test]
    fn concurrent_inserts_at_start_converge_to_foobar() {
        let mut base = Model::new(10_000);
        let mut b = base.builder();
        let s = b.str_node();
        b.root(s);
        let init = b.flush();
        base.apply_patch(&init);

        let mut foo_side = base.fork(70_000);
        let mut bar_side = base.fork(80_000);
        let mut fb = foo_side.builder();
        fb.ins_str(s, s, "foo");
        let foo = fb.flush();
        let mut bb = bar_side.builder();
        bb.ins_str(s, s, "bar");
        let bar = bb.flush();

        foo_side.apply_patch(&foo);
        foo_side.apply_patch(&bar);
        bar_side.apply_patch(&bar);
        bar_side.apply_patch(&foo);
        assert_eq!(foo_side.view(), json!("foobar"));
        assert_eq!(bar_side.view(), json!("foobar"));
    }

    #[test]
    fn hello_world_edit_and_snapshot() {
        let (mut model, s) = string_doc("hello world");
        let space = rga_of(&model, s).find_interval(5, 1);
        let after = rga_of(&model, s).find(4).expect("position 4 must exist");
        let mut b = model.builder();
        b.del(s, space);
        b.ins_str(s, after, "-");
        model.apply_patch(&b.flush());
        assert_eq!(model.view(), json!("hello-world"));

        let blob = model.to_binary().expect("encode must succeed");
        let restored = Model::from_binary(&blob).expect("decode must succeed");
        assert_eq!(restored.view(), json!("hello-world"));
        let (a, r) = (rga_of(&model, s), rga_of(&restored, s));
        assert_eq!(a.chunk_count(), r.chunk_count());
        assert_eq!(a.tombstone_count(), r.tombstone_count());
    }

    #[test]
    fn greater_write_wins_in_any_order() {
        let obj = ts(S, 1);
        let create = vec![
            Op::NewObj { id: obj },
            Op::NewCon { id: ts(S, 2), val: json!("first") },
            Op::NewCon { id: ts(S, 3), val: json!("second") },
            Op::InsVal { id: ts(S, 4), obj: ORIGIN, val: obj },
        ];
        let t1 = Op::InsObj { id: ts(S, 5), obj, data: vec![("a".into(), ts(S, 2))] };
        let t2 = Op::InsObj { id: ts(S, 6), obj, data: vec![("a".into(), ts(S, 3))] };
        for order in [[&t1, &t2], [&t2, &t1]] {
            let mut model = Model::new(1);
            for op in &create {
                model.apply_operation(op).expect("create must succeed");
            }
            for op in order {
                model.apply_operation(op).expect("write must succeed");
            }
            assert_eq!(model.view(), json!({"a": "second"}));
        }
    }

    #[test]
    fn replayed_patch_is_a_no_op() {
        let (mut model, s) = string_doc("abc");
        let mut b = model.builder();
        b.del(s, vec![tss(S, 3, 1)]);
        let patch = b.flush();
        model.apply_patch(&patch);
        let before = model.view();
        let report = model.apply_patch(&patch);
        assert_eq!(report.applied, 1);
        assert_eq!(model.view(), before);
        assert_eq!(rga_of(&model, s).chunk_count(), 3);
    }

    #[test]
    fn duplicate_creation_and_insert_are_reported() {
        let (mut model, s) = string_doc("abc");
        assert_eq!(model.apply_operation(&Op::NewStr { id: s }), Ok(Applied::Duplicate));
        let replay = Op::InsStr { id: ts(S, 2), obj: s, after: s, data: "abc".into() };
        assert_eq!(model.apply_operation(&replay), Ok(Applied::Duplicate));
        assert_eq!(model.view(), json!("abc"));
    }

    #[test]
    fn unknown_node_is_skipped_until_it_arrives() {
        let mut model = Model::new(S);
        let late = Op::InsStr { id: ts(7, 2), obj: ts(7, 1), after: ts(7, 1), data: "x".into() };
        assert_eq!(model.apply_operation(&late), Ok(Applied::Skipped));
        model.apply_operation(&Op::NewStr { id: ts(7, 1) }).expect("create must succeed");
        assert_eq!(model.apply_operation(&late), Ok(Applied::Applied));
        assert_eq!(model.view_node(ts(7, 1)), Some(json!("x")));
    }

    #[test]
    fn missing_anchor_and_wrong_kind_are_rejected() {
        let (mut model, s) = string_doc("abc");
        let orphan = Op::InsStr { id: ts(9, 1), obj: s, after: ts(9, 100), data: "x".into() };
        assert_eq!(
            model.apply_operation(&orphan),
            Err(ApplyError::UnknownAnchor { node: s, anchor: ts(9, 100) })
        );
        let wrong = Op::InsVal { id: ts(9, 2), obj: s, val: UNDEFINED };
        assert!(matches!(model.apply_operation(&wrong), Err(ApplyError::KindMismatch { .. })));
        let empty_del = Op::Del { id: ts(9, 3), obj: s, what: vec![tss(S, 2, 0)] };
        assert_eq!(model.apply_operation(&empty_del), Err(ApplyError::MalformedSpan(ts(9, 3))));
        assert_eq!(model.view(), json!("abc"));
    }

    #[test]
    fn rejected_operation_does_not_abort_patch() {
        let (mut model, s) = string_doc("ab");
        let patch = Patch::from_ops(vec![
            Op::InsStr { id: ts(9, 1), obj: s, after: ts(9, 50), data: "x".into() },
            Op::InsStr { id: ts(9, 2), obj: s, after: s, data: "y".into() },
        ]);
        let report = model.apply_patch(&patch);
        assert_eq!(report.applied, 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, ts(9, 1));
        // (9, 2) sorts before the existing start chunk.
        assert_eq!(model.view(), json!("yab"));
    }

    #[test]
    fn find_resolves_interior_units_to_owner() {
        let (model, s) = string_doc("hello");
        assert_eq!(model.find(ts(S, 4)).map(|n| n.id()), Some(s));
        assert_eq!(model.find(s).map(|n| n.name()), Some("str"));
        assert!(model.find(ts(S, 99)).is_none());
    }

    #[test]
    fn clock_moves_past_observed_ids() {
        let mut model = Model::new(S);
        model.apply_operation(&Op::NewObj { id: ts(42, 30) }).expect("create must succeed");
        assert_eq!(model.clock().time(), 31);
        let id = model.builder().obj();
        assert_eq!(id, ts(S, 31));
    }

    #[test]
    fn server_document_mints_server_ids() {
        let mut model = Model::new_server(5);
        let mut b = model.builder();
        let c = b.con(json!(7));
        b.root(c);
        model.apply_patch(&b.flush());
        assert_eq!(c, ts(SESSION::SERVER, 5));
        assert_eq!(model.clock().time(), 7);
        assert_eq!(model.view(), json!(7));
    }

    #[test]
    fn register_cycles_do_not_recurse_forever() {
        let mut model = Model::new(S);
        model.apply_operation(&Op::NewVal { id: ts(S, 1), val: ts(S, 2) }).expect("must succeed");
        model.apply_operation(&Op::NewVal { id: ts(S, 2), val: ts(S, 1) }).expect("must succeed");
        model.apply_operation(&Op::InsVal { id: ts(S, 3), obj: ORIGIN, val: ts(S, 1) }).expect("must succeed");
        assert_eq!(model.view(), json!(null));
    }

    #[test]
    fn binary_view_is_byte_array() {
        let mut model = Model::new(S);
        let mut b = model.builder();
        let bin = b.bin();
        b.ins_bin(bin, bin, vec![0xde, 0xad]);
        b.root(bin);
        model.apply_patch(&b.flush());
        assert_eq!(model.view(), json!([0xde, 0xad]));
    }

    #[test]
    fn display_lists_nodes() {
        let (model, _) = string_doc("hi");
        let text = model.to_string();
        assert!(text.starts_with("model\n├─ root"));
        assert!(text.contains("str ..3456.1 \"hi\""), "{text}");
    }
}
