use crate::json_crdt_patch::clock::{Ts, Tss};
use crate::json_crdt_patch::codec::json::to_base64;
use crate::json_crdt_patch::codec::{check_contiguous, EncodeError};
use crate::json_crdt_patch::enums::SESSION;
use crate::json_crdt_patch::operations::Op;
use crate::json_crdt_patch::patch::Patch;
use serde_json::{json, Value};

fn encode_ts(id: Ts) -> Value {
    if id.sid == SESSION::SERVER {
        json!(id.time)
    } else {
        json!([id.sid, id.time])
    }
}

fn encode_tss(span: &Tss) -> Value {
    if span.sid == SESSION::SERVER {
        json!([span.time, span.span])
    } else {
        json!([span.sid, span.time, span.span])
    }
}

fn encode_op(op: &Op) -> Value {
    let name = op.name();
    match op {
        Op::NewCon { val, .. } => json!({"op": name, "value": val}),
        Op::NewVal { val, .. } => json!({"op": name, "value": encode_ts(*val)}),
        Op::NewObj { .. } | Op::NewStr { .. } | Op::NewBin { .. } | Op::NewArr { .. } => {
            json!({"op": name})
        }
        Op::InsVal { obj, val, .. } => json!({
            "op": name,
            "obj": encode_ts(*obj),
            "value": encode_ts(*val),
        }),
        Op::InsObj { obj, data, .. } => {
            let tuples: Vec<Value> = data.iter().map(|(k, v)| json!([k, encode_ts(*v)])).collect();
            json!({"op": name, "obj": encode_ts(*obj), "value": tuples})
        }
        Op::InsStr {
            obj, after, data, ..
        } => json!({
            "op": name,
            "obj": encode_ts(*obj),
            "after": encode_ts(*after),
            "value": data,
        }),
        Op::InsBin {
            obj, after, data, ..
        } => json!({
            "op": name,
            "obj": encode_ts(*obj),
            "after": encode_ts(*after),
            "value": to_base64(data),
        }),
        Op::InsArr {
            obj, after, data, ..
        } => {
            let items: Vec<Value> = data.iter().map(|v| encode_ts(*v)).collect();
            json!({"op": name, "obj": encode_ts(*obj), "after": encode_ts(*after), "value": items})
        }
        Op::Del { obj, what, .. } => {
            let spans: Vec<Value> = what.iter().map(encode_tss).collect();
            json!({"op": name, "obj": encode_ts(*obj), "what": spans})
        }
        Op::Nop { len, .. } => json!({"op": name, "len": len}),
    }
}

/// Encodes a contiguous patch into the verbose JSON format.
pub fn encode(patch: &Patch) -> Result<Value, EncodeError> {
    let id = check_contiguous(patch)?;
    Ok(json!({
        "id": encode_ts(id),
        "ops": patch.ops.iter().map(encode_op).collect::<Vec<_>>(),
    }))
}
