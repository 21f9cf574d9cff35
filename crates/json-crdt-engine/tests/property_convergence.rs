mod common;

use common::{model_from_json, obj_key, str_rga};
use json_crdt_engine::json_crdt::Model;
use json_crdt_engine::json_crdt_patch::codec::{binary, compact, verbose};
use json_crdt_engine::json_crdt_patch::patch::combine;
use json_crdt_engine::json_crdt_patch::{Patch, Ts};
use proptest::prelude::*;
use serde_json::json;

const REPLICAS: usize = 3;

#[derive(Debug, Clone)]
enum Edit {
    Insert { pos: usize, text: String },
    Delete { pos: usize, len: usize },
    Set(i64),
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (any::<usize>(), "[a-z]{1,4}").prop_map(|(pos, text)| Edit::Insert { pos, text }),
        (any::<usize>(), 1usize..4).prop_map(|(pos, len)| Edit::Delete { pos, len }),
        any::<i64>().prop_map(Edit::Set),
    ]
}

fn base() -> (Model, Ts, Ts) {
    let model = model_from_json(10_000, &json!({"text": "seed", "k": 0}));
    let obj = model.root().val;
    let text = obj_key(&model, obj, "text");
    (model, obj, text)
}

/// Applies `edit` to `model` and returns the patch it produced.
fn apply_edit(model: &mut Model, obj: Ts, text: Ts, edit: &Edit) -> Option<Patch> {
    let len = str_rga(model, text).length() as usize;
    let mut api = model.api();
    let patch = match edit {
        Edit::Insert { pos, text: chars } => api.str_ins(text, pos % (len + 1), chars),
        Edit::Delete { pos, len: count } => {
            if len == 0 {
                return None;
            }
            api.str_del(text, pos % len, *count)
        }
        Edit::Set(v) => api.obj_set(obj, &[("k", json!(v))]),
    };
    Some(patch.expect("local edit must apply"))
}

/// One replica's concurrent edits, folded into a single patch.
fn replica_patch(base: &Model, sid: u64, obj: Ts, text: Ts, edits: &[Edit]) -> Patch {
    let mut replica = base.fork(sid);
    let patches: Vec<Patch> = edits
        .iter()
        .filter_map(|edit| apply_edit(&mut replica, obj, text, edit))
        .collect();
    combine(patches).expect("one replica's patches must combine")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_concurrent_edits_converge_in_any_order(
        edits in prop::collection::vec(prop::collection::vec(edit_strategy(), 0..6), REPLICAS),
        order in Just((0..REPLICAS).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let (seed, obj, text) = base();
        let patches: Vec<Patch> = edits
            .iter()
            .enumerate()
            .map(|(i, e)| replica_patch(&seed, 70_000 + i as u64, obj, text, e))
            .collect();

        let mut forward = seed.clone();
        for &i in &order {
            let report = forward.apply_patch(&patches[i]);
            prop_assert!(report.is_clean(), "rejected: {:?}", report.rejected);
        }
        let mut backward = seed.clone();
        for &i in order.iter().rev() {
            backward.apply_patch(&patches[i]);
            // Duplicate delivery.
            backward.apply_patch(&patches[i]);
        }

        prop_assert_eq!(forward.view(), backward.view());
        prop_assert_eq!(forward.layout(), backward.layout());
    }

    #[test]
    fn prop_replay_is_idempotent(edits in prop::collection::vec(edit_strategy(), 1..10)) {
        let (seed, obj, text) = base();
        let patch = replica_patch(&seed, 80_000, obj, text, &edits);
        let mut once = seed.clone();
        once.apply_patch(&patch);
        let mut twice = once.clone();
        let report = twice.apply_patch(&patch);
        prop_assert_eq!(report.skipped, 0);
        prop_assert!(report.rejected.is_empty());
        prop_assert_eq!(once.view(), twice.view());
        prop_assert_eq!(once.layout(), twice.layout());
    }

    #[test]
    fn prop_patch_codecs_round_trip(edits in prop::collection::vec(edit_strategy(), 1..10)) {
        let (seed, obj, text) = base();
        let patch = replica_patch(&seed, 90_000, obj, text, &edits);
        prop_assume!(!patch.ops.is_empty());
        let bytes = binary::encode(&patch).expect("binary encode must succeed");
        prop_assert_eq!(&binary::decode(&bytes).expect("binary decode must succeed"), &patch);
        let v = verbose::encode(&patch).expect("verbose encode must succeed");
        prop_assert_eq!(&verbose::decode(&v).expect("verbose decode must succeed"), &patch);
        let c = compact::encode(&patch).expect("compact encode must succeed");
        prop_assert_eq!(&compact::decode(&c).expect("compact decode must succeed"), &patch);
    }

    #[test]
    fn prop_snapshot_preserves_structure(edits in prop::collection::vec(edit_strategy(), 0..10)) {
        let (seed, obj, text) = base();
        let patch = replica_patch(&seed, 90_001, obj, text, &edits);
        let mut model = seed.clone();
        model.apply_patch(&patch);
        let restored = Model::from_binary(&model.to_binary().expect("encode must succeed"))
            .expect("decode must succeed");
        prop_assert_eq!(restored.view(), model.view());
        prop_assert_eq!(restored.layout(), model.layout());
    }
}
