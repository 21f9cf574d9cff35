use crate::json_crdt_patch::clock::{ts, Ts, Tss};
use crate::json_crdt_patch::codec::json::{array, at, field, from_base64, non_empty, object, string, u53};
use crate::json_crdt_patch::codec::{advance, DecodeError};
use crate::json_crdt_patch::enums::SESSION;
use crate::json_crdt_patch::operations::Op;
use crate::json_crdt_patch::patch::Patch;
use serde_json::{Map, Value};

fn decode_ts(v: &Value) -> Result<Ts, DecodeError> {
    match v {
        Value::Number(_) => Ok(ts(SESSION::SERVER, u53(v, "timestamp")?)),
        Value::Array(items) if items.len() == 2 => {
            Ok(ts(u53(&items[0], "session id")?, u53(&items[1], "time")?))
        }
        _ => Err(DecodeError::InvalidStructure("timestamp")),
    }
}

fn decode_tss(v: &Value) -> Result<Tss, DecodeError> {
    let items = array(v, "timespan")?;
    match items {
        [time, span] => Ok(Tss::new(SESSION::SERVER, u53(time, "time")?, u53(span, "span")?)),
        [sid, time, span] => Ok(Tss::new(
            u53(sid, "session id")?,
            u53(time, "time")?,
            u53(span, "span")?,
        )),
        _ => Err(DecodeError::InvalidStructure("timespan")),
    }
}

fn decode_op(id: Ts, op: &Map<String, Value>) -> Result<Op, DecodeError> {
    let name = string(field(op, "op")?, "op")?;
    let obj = || decode_ts(field(op, "obj")?);
    let after = || decode_ts(field(op, "after")?);
    let decoded = match name {
        "new_con" => Op::NewCon {
            id,
            val: op.get("value").cloned().unwrap_or(Value::Null),
        },
        "new_val" => Op::NewVal {
            id,
            val: decode_ts(field(op, "value")?)?,
        },
        "new_obj" => Op::NewObj { id },
        "new_str" => Op::NewStr { id },
        "new_bin" => Op::NewBin { id },
        "new_arr" => Op::NewArr { id },
        "ins_val" => Op::InsVal {
            id,
            obj: obj()?,
            val: decode_ts(field(op, "value")?)?,
        },
        "ins_obj" => {
            let mut data = Vec::new();
            for tuple in array(field(op, "value")?, "ins_obj value")? {
                let pair = array(tuple, "ins_obj tuple")?;
                let key = string(at(pair, 0)?, "ins_obj key")?.to_owned();
                data.push((key, decode_ts(at(pair, 1)?)?));
            }
            let len = data.len();
            Op::InsObj {
                id,
                obj: obj()?,
                data: non_empty(data, len)?,
            }
        }
        "ins_str" => {
            let data = string(field(op, "value")?, "ins_str value")?.to_owned();
            let len = data.len();
            Op::InsStr {
                id,
                obj: obj()?,
                after: after()?,
                data: non_empty(data, len)?,
            }
        }
        "ins_bin" => {
            let data = from_base64(field(op, "value")?)?;
            let len = data.len();
            Op::InsBin {
                id,
                obj: obj()?,
                after: after()?,
                data: non_empty(data, len)?,
            }
        }
        "ins_arr" => {
            let data = array(field(op, "value")?, "ins_arr value")?
                .iter()
                .map(decode_ts)
                .collect::<Result<Vec<_>, _>>()?;
            let len = data.len();
            Op::InsArr {
                id,
                obj: obj()?,
                after: after()?,
                data: non_empty(data, len)?,
            }
        }
        "del" => Op::Del {
            id,
            obj: obj()?,
            what: array(field(op, "what")?, "del what")?
                .iter()
                .map(decode_tss)
                .collect::<Result<Vec<_>, _>>()?,
        },
        "nop" => Op::Nop {
            id,
            len: match op.get("len") {
                Some(len) => u53(len, "nop len")?,
                None => 1,
            },
        },
        other => return Err(DecodeError::UnknownOperation(other.to_owned())),
    };
    Ok(decoded)
}

/// Decodes a verbose-format JSON value into a [`Patch`].
pub fn decode(data: &Value) -> Result<Patch, DecodeError> {
    let doc = object(data, "patch must be an object")?;
    let start = decode_ts(field(doc, "id")?)?;
    let mut time = start.time;
    let mut ops = Vec::new();
    for op in array(field(doc, "ops")?, "ops")? {
        let decoded = decode_op(ts(start.sid, time), object(op, "operation")?)?;
        time = advance(time, decoded.span())?;
        ops.push(decoded);
    }
    if ops.is_empty() {
        return Err(DecodeError::InvalidStructure("patch has no operations"));
    }
    Ok(Patch::from_ops(ops))
}
