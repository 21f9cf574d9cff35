//! Node block encoding for indexed snapshots.
//!
//! Every block starts with a tag byte: bits 7-5 hold the node's data type,
//! bits 4-0 hold the entry count, where 31 means the count follows as a
//! `vu57`. Ids are written relative to the clock table as
//! `id(session index, reference time - time)`.
//!
//! | Type | Entries  | Entry layout                                              |
//! |------|----------|-----------------------------------------------------------|
//! | con  | 0        | CBOR value                                                |
//! | val  | 0        | write id, value id                                        |
//! | obj  | keys     | key, write id, value id                                   |
//! | str  | chunks   | id, anchor, `b1vu56(tombstone, span)`, UTF-8 if live      |
//! | bin  | chunks   | id, anchor, `b1vu56(tombstone, span)`, bytes if live      |
//! | arr  | chunks   | id, anchor, `b1vu56(tombstone, span)`, `span` ids if live |
//!
//! An anchor is one byte, `0` start, `1` after (followed by an id) or
//! `2` continuation.

use std::collections::HashSet;

use tracing::warn;

use super::{IndexedFields, SnapshotError};
use crate::json_crdt::model::{Model, ModelClock};
use crate::json_crdt::nodes::rga::{Anchor, ChunkData, Rga};
use crate::json_crdt::nodes::{
    ArrNode, BinNode, ConNode, CrdtNode, ObjEntry, ObjNode, StrNode, ValNode,
};
use crate::json_crdt_patch::clock::{ClockVector, ServerClockVector, Ts};
use crate::json_crdt_patch::codec::clock::ClockTable;
use crate::json_crdt_patch::codec::DecodeError;
use crate::json_crdt_patch::enums::{JsonCrdtDataType, SESSION};
use crate::json_crdt_patch::util::binary::{CrdtReader, CrdtWriter};
use crate::json_crdt_patch::util::cbor;

const CLOCK_FIELD: &str = "c";
const ROOT_FIELD: &str = "r";
const INLINE_COUNT_MAX: u8 = 31;

const ANCHOR_START: u8 = 0;
const ANCHOR_AFTER: u8 = 1;
const ANCHOR_CONTINUATION: u8 = 2;

// ── Encode ────────────────────────────────────────────────────────────────

pub fn encode(model: &Model) -> Result<IndexedFields, SnapshotError> {
    let table = clock_table(model);
    let mut fields = IndexedFields::new();

    let mut w = CrdtWriter::new();
    table.write(&mut w);
    fields.insert(CLOCK_FIELD.to_owned(), w.flush());

    write_id(&mut w, &table, model.root().write)?;
    write_id(&mut w, &table, model.root().val)?;
    fields.insert(ROOT_FIELD.to_owned(), w.flush());

    for node in model.nodes() {
        let id = node.id();
        let index = table.index_of(id.sid).ok_or(SnapshotError::UnmappedId(id))?;
        encode_node(&mut w, &table, node)?;
        fields.insert(field_name(index as u64, id.time), w.flush());
    }
    Ok(fields)
}

/// Table whose entry 0 is the document's own session at its current time;
/// every other session appears with the largest time referenced.
fn clock_table(model: &Model) -> ClockTable {
    let mut table = ClockTable::new();
    let clock = model.clock();
    table.observe(Ts::new(clock.sid(), clock.time()));
    table.observe(model.root().write);
    table.observe(model.root().val);
    for node in model.nodes() {
        table.observe(node.id());
        match node {
            CrdtNode::Con(_) => {}
            CrdtNode::Val(n) => {
                table.observe(n.write);
                table.observe(n.val);
            }
            CrdtNode::Obj(n) => {
                for entry in n.keys.values() {
                    table.observe(entry.write);
                    table.observe(entry.val);
                }
            }
            CrdtNode::Str(n) => observe_chunks(&mut table, &n.rga),
            CrdtNode::Bin(n) => observe_chunks(&mut table, &n.rga),
            CrdtNode::Arr(n) => {
                observe_chunks(&mut table, &n.rga);
                for chunk in n.rga.iter() {
                    for el in chunk.data.iter().flatten() {
                        table.observe(*el);
                    }
                }
            }
        }
    }
    table
}

fn observe_chunks<T: ChunkData>(table: &mut ClockTable, rga: &Rga<T>) {
    for chunk in rga.chunks() {
        table.observe(chunk.last());
        if let Anchor::After(after) = chunk.anchor {
            table.observe(after);
        }
    }
}

fn field_name(index: u64, time: u64) -> String {
    format!("{}_{}", to_base36(index), to_base36(time))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn write_id(w: &mut CrdtWriter, table: &ClockTable, id: Ts) -> Result<(), SnapshotError> {
    let (index, diff) = table.relative(id).ok_or(SnapshotError::UnmappedId(id))?;
    w.id(index, diff);
    Ok(())
}

fn write_tag(w: &mut CrdtWriter, data_type: JsonCrdtDataType, count: usize) {
    let inline = count.min(INLINE_COUNT_MAX as usize) as u8;
    w.u8(((data_type as u8) << 5) | inline);
    if inline == INLINE_COUNT_MAX {
        w.vu57(count as u64);
    }
}

fn encode_node(w: &mut CrdtWriter, table: &ClockTable, node: &CrdtNode) -> Result<(), SnapshotError> {
    match node {
        CrdtNode::Con(n) => {
            write_tag(w, JsonCrdtDataType::Con, 0);
            cbor::write(w, &n.val)?;
        }
        CrdtNode::Val(n) => {
            write_tag(w, JsonCrdtDataType::Val, 0);
            write_id(w, table, n.write)?;
            write_id(w, table, n.val)?;
        }
        CrdtNode::Obj(n) => {
            write_tag(w, JsonCrdtDataType::Obj, n.keys.len());
            for (key, entry) in &n.keys {
                w.str(key);
                write_id(w, table, entry.write)?;
                write_id(w, table, entry.val)?;
            }
        }
        CrdtNode::Str(n) => {
            write_tag(w, JsonCrdtDataType::Str, n.rga.chunk_count());
            encode_chunks(w, table, &n.rga, |w, data: &String| {
                w.str(data);
                Ok(())
            })?;
        }
        CrdtNode::Bin(n) => {
            write_tag(w, JsonCrdtDataType::Bin, n.rga.chunk_count());
            encode_chunks(w, table, &n.rga, |w, data: &Vec<u8>| {
                w.buf(data);
                Ok(())
            })?;
        }
        CrdtNode::Arr(n) => {
            write_tag(w, JsonCrdtDataType::Arr, n.rga.chunk_count());
            encode_chunks(w, table, &n.rga, |w, data: &Vec<Ts>| {
                data.iter().try_for_each(|el| write_id(w, table, *el))
            })?;
        }
    }
    Ok(())
}

fn encode_chunks<T: ChunkData>(
    w: &mut CrdtWriter,
    table: &ClockTable,
    rga: &Rga<T>,
    payload: impl Fn(&mut CrdtWriter, &T) -> Result<(), SnapshotError>,
) -> Result<(), SnapshotError> {
    for chunk in rga.chunks() {
        write_id(w, table, chunk.id)?;
        match chunk.anchor {
            Anchor::Start => w.u8(ANCHOR_START),
            Anchor::After(after) => {
                w.u8(ANCHOR_AFTER);
                write_id(w, table, after)?;
            }
            Anchor::Continuation => w.u8(ANCHOR_CONTINUATION),
        }
        match &chunk.data {
            None => w.b1vu56(1, chunk.span),
            Some(data) => {
                w.b1vu56(0, chunk.span);
                payload(w, data)?;
            }
        }
    }
    Ok(())
}

// ── Decode ────────────────────────────────────────────────────────────────

pub fn decode(fields: &IndexedFields) -> Result<Model, SnapshotError> {
    let clock_bytes = fields.get(CLOCK_FIELD).ok_or(SnapshotError::MissingClock)?;
    let mut r = CrdtReader::new(clock_bytes);
    let table = ClockTable::read(&mut r)?;
    finish(&r)?;
    let local = table.get_by_index(0).ok_or(SnapshotError::EmptyClock)?;

    let mut root = ValNode::root();
    if let Some(bytes) = fields.get(ROOT_FIELD) {
        let mut r = CrdtReader::new(bytes);
        root.write = read_id(&mut r, &table)?;
        root.val = read_id(&mut r, &table)?;
        finish(&r)?;
    }

    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    for (name, bytes) in fields {
        if name.len() < 3 {
            if name != CLOCK_FIELD && name != ROOT_FIELD {
                warn!(field = %name, "skipping reserved snapshot field");
            }
            continue;
        }
        let id = parse_field_name(name, &table)?;
        if !seen.insert(id) {
            return Err(SnapshotError::DuplicateNode(id));
        }
        let mut r = CrdtReader::new(bytes);
        let node = decode_node(&mut r, &table, id)?;
        finish(&r)?;
        nodes.push(node);
    }

    let clock = if local.sid == SESSION::SERVER {
        ModelClock::Server(ServerClockVector::new(local.time))
    } else {
        let mut clock = ClockVector::new(local.sid, local.time);
        for peer in table.iter().skip(1) {
            clock.observe(peer, 1);
        }
        ModelClock::Logical(clock)
    };
    Ok(Model::from_parts(root, nodes, clock))
}

fn finish(r: &CrdtReader<'_>) -> Result<(), SnapshotError> {
    if r.is_eof() {
        Ok(())
    } else {
        Err(DecodeError::TrailingBytes(r.remaining()).into())
    }
}

fn parse_field_name(name: &str, table: &ClockTable) -> Result<Ts, SnapshotError> {
    let invalid = || SnapshotError::InvalidFieldName(name.to_owned());
    let (index, time) = name.split_once('_').ok_or_else(invalid)?;
    let index = u64::from_str_radix(index, 36).map_err(|_| invalid())?;
    let time = u64::from_str_radix(time, 36).map_err(|_| invalid())?;
    if time > SESSION::MAX {
        return Err(DecodeError::Overflow.into());
    }
    let session = usize::try_from(index)
        .ok()
        .and_then(|i| table.get_by_index(i))
        .ok_or(DecodeError::UnknownSession(index))?;
    Ok(Ts::new(session.sid, time))
}

fn read_id(r: &mut CrdtReader<'_>, table: &ClockTable) -> Result<Ts, SnapshotError> {
    let (index, diff) = r.id()?;
    Ok(table.absolute(index, diff)?)
}

fn read_tag(r: &mut CrdtReader<'_>) -> Result<(u8, usize), SnapshotError> {
    let octet = r.u8()?;
    let inline = octet & 0b1_1111;
    let count = if inline == INLINE_COUNT_MAX {
        r.length()?
    } else {
        inline as usize
    };
    Ok((octet >> 5, count))
}

fn decode_node(r: &mut CrdtReader<'_>, table: &ClockTable, id: Ts) -> Result<CrdtNode, SnapshotError> {
    let (tag, count) = read_tag(r)?;
    let data_type = JsonCrdtDataType::from_u8(tag).ok_or(SnapshotError::UnknownNodeType { id, tag })?;
    let node = match data_type {
        JsonCrdtDataType::Con => CrdtNode::Con(ConNode::new(id, cbor::read(r)?)),
        JsonCrdtDataType::Val => {
            let write = read_id(r, table)?;
            let val = read_id(r, table)?;
            CrdtNode::Val(ValNode { id, write, val })
        }
        JsonCrdtDataType::Obj => {
            let mut node = ObjNode::new(id);
            for _ in 0..count {
                let key = r.str()?.to_owned();
                let write = read_id(r, table)?;
                let val = read_id(r, table)?;
                if node.keys.insert(key, ObjEntry { write, val }).is_some() {
                    return Err(DecodeError::InvalidStructure("duplicate object key").into());
                }
            }
            CrdtNode::Obj(node)
        }
        JsonCrdtDataType::Str => {
            let mut node = StrNode::new(id);
            decode_chunks(r, table, id, count, &mut node.rga, |r, span| {
                let text = r.str()?;
                if text.chars().count() as u64 != span {
                    return Err(DecodeError::InvalidStructure("string chunk length differs from span").into());
                }
                Ok(text.to_owned())
            })?;
            CrdtNode::Str(node)
        }
        JsonCrdtDataType::Bin => {
            let mut node = BinNode::new(id);
            decode_chunks(r, table, id, count, &mut node.rga, |r, span| {
                let len = usize::try_from(span).map_err(|_| DecodeError::Overflow)?;
                Ok(r.buf(len)?.to_vec())
            })?;
            CrdtNode::Bin(node)
        }
        JsonCrdtDataType::Arr => {
            let mut node = ArrNode::new(id);
            decode_chunks(r, table, id, count, &mut node.rga, |r, span| {
                let mut items = Vec::new();
                for _ in 0..span {
                    items.push(read_id(r, table)?);
                }
                Ok(items)
            })?;
            CrdtNode::Arr(node)
        }
    };
    Ok(node)
}

fn decode_chunks<T: ChunkData>(
    r: &mut CrdtReader<'_>,
    table: &ClockTable,
    node: Ts,
    count: usize,
    rga: &mut Rga<T>,
    payload: impl Fn(&mut CrdtReader<'_>, u64) -> Result<T, SnapshotError>,
) -> Result<(), SnapshotError> {
    for _ in 0..count {
        let id = read_id(r, table)?;
        let anchor = match r.u8()? {
            ANCHOR_START => Anchor::Start,
            ANCHOR_AFTER => Anchor::After(read_id(r, table)?),
            ANCHOR_CONTINUATION if id.time > 0 => Anchor::Continuation,
            _ => return Err(DecodeError::InvalidStructure("invalid chunk anchor").into()),
        };
        let (deleted, span) = r.b1vu56()?;
        // Every live unit occupies at least one byte, which bounds `span`
        // before any allocation.
        if deleted == 0 && span > r.remaining() as u64 {
            return Err(DecodeError::UnexpectedEof.into());
        }
        let data = if deleted == 0 { Some(payload(r, span)?) } else { None };
        rga.push_chunk(id, span, anchor, data)
            .map_err(|source| SnapshotError::Chunk { node, source })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_crdt_patch::clock::{ts, tss};
    use crate::json_crdt_patch::ORIGIN;
    use serde_json::json;

    fn sample() -> Model {
        let mut model = Model::new(100_000);
        let mut b = model.builder();
        let root = b.json(&json!({"title": "hello world", "tags": ["a", "b"], "n": 1.5, "ok": true}));
        let blob = b.bin();
        b.ins_bin(blob, blob, vec![1, 2, 3, 4]);
        b.ins_obj(root, vec![("blob".into(), blob)]);
        b.root(root);
        model.apply_patch(&b.flush());
        model
    }

    #[test]
    fn base36_names() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(field_name(1, 1295), "1_zz");
    }

    #[test]
    fn structural_round_trip_keeps_tombstones_and_anchors() {
        let mut model = sample();
        let title = match model.node(ts(100_000, 1)) {
            Some(CrdtNode::Obj(obj)) => obj.get("title").expect("title must exist"),
            other => panic!("unexpected root {other:?}"),
        };
        let mut peer = model.fork(200_000);
        let mut b = peer.builder();
        b.del(title, vec![tss(100_000, 7, 2)]);
        b.ins_str(title, ts(100_000, 5), "!!");
        peer.apply_patch(&b.flush());
        model = peer;

        let fields = encode(&model).expect("encode must succeed");
        assert!(fields.contains_key("c") && fields.contains_key("r"));
        let restored = decode(&fields).expect("decode must succeed");
        assert_eq!(restored.view(), model.view());
        assert_eq!(restored.layout(), model.layout());
        for entry in model.index().iter() {
            assert!(restored.index().contains(entry.id), "{} lost", entry.id);
        }
        assert_eq!(restored.root(), model.root());
    }

    #[test]
    fn restored_document_keeps_merging() {
        let model = sample();
        let restored = decode(&encode(&model).expect("encode must succeed")).expect("decode must succeed");
        assert_eq!(restored.clock().sid(), 100_000);
        assert_eq!(restored.clock().time(), model.clock().time());

        let mut edit = model.builder();
        let c = edit.con(json!("later"));
        edit.ins_obj(ts(100_000, 1), vec![("late".into(), c)]);
        let patch = edit.flush();
        let mut a = model.clone();
        let mut b = restored;
        a.apply_patch(&patch);
        b.apply_patch(&patch);
        assert_eq!(a.view(), b.view());
        assert_eq!(a.view()["late"], json!("later"));
    }

    #[test]
    fn server_clock_survives() {
        let mut model = Model::new_server(40);
        let mut b = model.builder();
        let s = b.json(&json!("srv"));
        b.root(s);
        model.apply_patch(&b.flush());
        let restored = decode(&encode(&model).expect("encode must succeed")).expect("decode must succeed");
        assert!(matches!(restored.clock(), ModelClock::Server(c) if c.time == model.clock().time()));
        assert_eq!(restored.view(), json!("srv"));
    }

    #[test]
    fn short_unknown_fields_are_skipped() {
        let mut fields = encode(&sample()).expect("encode must succeed");
        fields.insert("x".into(), vec![0xff]);
        fields.insert("zz".into(), vec![]);
        assert_eq!(decode(&fields).expect("decode must succeed").view(), sample().view());
    }

    #[test]
    fn large_objects_use_extended_count() {
        let mut model = Model::new(5_000_000);
        let mut b = model.builder();
        let obj = b.obj();
        let c = b.con(json!(0));
        let keys: Vec<(String, Ts)> = (0..40).map(|i| (format!("k{i}"), c)).collect();
        b.ins_obj(obj, keys);
        b.root(obj);
        model.apply_patch(&b.flush());
        let fields = encode(&model).expect("encode must succeed");
        let block = &fields[&field_name(0, obj.time)];
        assert_eq!(block[0], ((JsonCrdtDataType::Obj as u8) << 5) | 31);
        assert_eq!(block[1], 40);
        let restored = decode(&fields).expect("decode must succeed");
        assert_eq!(restored.view(), model.view());
    }

    #[test]
    fn corrupt_input_is_rejected() {
        let fields = encode(&sample()).expect("encode must succeed");
        let mut missing = fields.clone();
        missing.remove("c");
        assert_eq!(decode(&missing).err(), Some(SnapshotError::MissingClock));

        let mut bad_name = fields.clone();
        bad_name.insert("no-underscore".into(), vec![0]);
        assert!(matches!(decode(&bad_name), Err(SnapshotError::InvalidFieldName(_))));

        let mut bad_session = fields.clone();
        bad_session.insert("9_1".into(), vec![0]);
        assert!(matches!(decode(&bad_session), Err(SnapshotError::Decode(DecodeError::UnknownSession(9)))));

        for (name, bytes) in fields.iter().filter(|(n, _)| n.len() >= 3) {
            for len in 0..bytes.len() {
                let mut truncated = fields.clone();
                truncated.insert(name.clone(), bytes[..len].to_vec());
                assert!(decode(&truncated).is_err(), "field {name} truncated to {len} decoded");
            }
        }
    }

    #[test]
    fn empty_document_round_trips() {
        let model = Model::new(77_777);
        let restored = decode(&encode(&model).expect("encode must succeed")).expect("decode must succeed");
        assert_eq!(restored.view(), json!(null));
        assert_eq!(restored.root().val, crate::json_crdt_patch::UNDEFINED);
        assert_eq!(restored.root().write, ORIGIN);
    }

    #[test]
    fn unknown_node_type_is_rejected() {
        let mut fields = encode(&Model::new(77_777)).expect("encode must succeed");
        fields.insert("0_5".into(), vec![7 << 5]);
        assert!(matches!(decode(&fields), Err(SnapshotError::UnknownNodeType { tag: 7, .. })));
    }
}
