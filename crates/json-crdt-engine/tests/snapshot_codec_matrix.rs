mod common;

use common::{delete_at, insert_at, model_from_json, obj_key, str_rga};
use json_crdt_engine::json_crdt::codec::indexed::{self, from_blob, to_blob, SnapshotError};
use json_crdt_engine::json_crdt::{Model, ModelClock};
use json_crdt_engine::json_crdt_patch::SESSION;
use serde_json::json;

fn restore(model: &Model) -> Model {
    Model::from_binary(&model.to_binary().expect("snapshot encode must succeed"))
        .expect("snapshot decode must succeed")
}

#[test]
fn fields_are_named_by_session_index_and_time() {
    let model = model_from_json(10_000, &json!({"a": "x"}));
    let fields = indexed::encode(&model).expect("snapshot encode must succeed");
    let names: Vec<&str> = fields.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["0_1", "0_2", "c", "r"]);

    let restored = indexed::decode(&fields).expect("snapshot decode must succeed");
    assert_eq!(restored.view(), json!({"a": "x"}));
    assert_eq!(from_blob(&to_blob(&fields)).expect("blob must decode"), fields);
}

#[test]
fn merged_document_restores_and_keeps_editing() {
    let base = model_from_json(10_000, &json!({"body": "shared text", "n": 0}));
    let obj = base.root().val;
    let body = obj_key(&base, obj, "body");

    let mut alice = base.fork(40_000);
    let mut bob = base.fork(50_000);
    let from_alice = insert_at(&mut alice, body, 6, "plain ");
    let from_bob = delete_at(&mut bob, body, 0, 7);
    alice.apply_patch(&from_bob);
    bob.apply_patch(&from_alice);
    assert_eq!(alice.view(), bob.view());

    let mut restored = restore(&alice);
    assert_eq!(restored.view(), alice.view());
    assert_eq!(restored.layout(), alice.layout());
    assert_eq!(restored.clock().sid(), 40_000);
    assert_eq!(restored.clock().time(), alice.clock().time());

    let next = insert_at(&mut restored, body, 0, ">");
    let id = next.get_id().expect("patch must have an id");
    assert_eq!(id.sid, 40_000);
    assert!(restored.index().get(id).is_some());
    assert!(bob.apply_patch(&next).is_clean());
    assert_eq!(bob.view(), restored.view());
    assert_eq!(bob.layout(), restored.layout());
}

#[test]
fn restored_document_accepts_patches_made_before_the_snapshot() {
    let base = model_from_json(10_000, &json!(""));
    let text = base.root().val;
    let mut writer = base.fork(60_000);
    let early = insert_at(&mut writer, text, 0, "early");

    let mut reader = base.fork(61_000);
    insert_at(&mut reader, text, 0, "local");
    let mut restored = restore(&reader);
    assert!(restored.apply_patch(&early).is_clean());
    reader.apply_patch(&early);

    assert_eq!(restored.view(), reader.view());
    assert_eq!(restored.layout(), reader.layout());
    assert_eq!(str_rga(&restored, text).length(), 10);

    let report = restored.apply_patch(&early);
    assert_eq!(report.duplicates, 1);
}

#[test]
fn server_documents_restore_with_a_server_clock() {
    let mut model = Model::new_server(1);
    let mut b = model.builder();
    let s = b.json(&json!("srv"));
    b.root(s);
    model.apply_patch(&b.flush());

    let restored = restore(&model);
    assert!(matches!(restored.clock(), ModelClock::Server(_)));
    assert_eq!(restored.clock().sid(), SESSION::SERVER);
    assert_eq!(restored.view(), json!("srv"));
}

#[test]
fn missing_clock_is_rejected() {
    let model = model_from_json(10_000, &json!([1, 2]));
    let mut fields = indexed::encode(&model).expect("snapshot encode must succeed");
    fields.remove("c");
    assert_eq!(indexed::decode(&fields).err(), Some(SnapshotError::MissingClock));
}

#[test]
fn corrupted_bytes_fail_without_panicking() {
    let mut model = model_from_json(10_000, &json!({"s": "abc", "a": [true, null], "n": 7}));
    let obj = model.root().val;
    let s = obj_key(&model, obj, "s");
    delete_at(&mut model, s, 1, 1);
    let data = model.to_binary().expect("snapshot encode must succeed");

    for i in 0..data.len() {
        let mut corrupt = data.clone();
        corrupt[i] ^= 0xFF;
        let _ = Model::from_binary(&corrupt);
        assert!(Model::from_binary(&data[..i]).is_err(), "prefix of {i} bytes decoded");
    }
}
