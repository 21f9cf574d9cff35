#![allow(dead_code)]

use json_crdt_engine::json_crdt::{CrdtNode, Model, Rga};
use json_crdt_engine::json_crdt_patch::{Patch, Ts};
use serde_json::Value;

/// Document whose root is `initial`, edited by session `sid`.
pub fn model_from_json(sid: u64, initial: &Value) -> Model {
    let mut model = Model::new(sid);
    let mut b = model.builder();
    let id = b.json(initial);
    b.root(id);
    let report = model.apply_patch(&b.flush());
    assert!(report.is_clean(), "seed patch rejected: {:?}", report.rejected);
    model
}

pub fn str_rga(model: &Model, id: Ts) -> &Rga<String> {
    match model.node(id) {
        Some(CrdtNode::Str(n)) => &n.rga,
        other => panic!("expected str node at {id}, got {other:?}"),
    }
}

/// Id of the node stored under `key` of the object `obj`.
pub fn obj_key(model: &Model, obj: Ts, key: &str) -> Ts {
    match model.node(obj) {
        Some(CrdtNode::Obj(n)) => n.get(key).unwrap_or_else(|| panic!("missing key {key}")),
        other => panic!("expected obj node at {obj}, got {other:?}"),
    }
}

/// Inserts `text` at visible position `pos` and returns the applied patch.
pub fn insert_at(model: &mut Model, node: Ts, pos: usize, text: &str) -> Patch {
    model.api().str_ins(node, pos, text).expect("local insert must succeed")
}

/// Deletes `len` visible units from `pos` and returns the applied patch.
pub fn delete_at(model: &mut Model, node: Ts, pos: usize, len: usize) -> Patch {
    model.api().str_del(node, pos, len).expect("local delete must succeed")
}
