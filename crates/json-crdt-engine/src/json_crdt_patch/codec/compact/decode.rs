use crate::json_crdt_patch::clock::{ts, Ts, Tss};
use crate::json_crdt_patch::codec::json::{array, at, from_base64, non_empty, string, u53};
use crate::json_crdt_patch::codec::{advance, DecodeError};
use crate::json_crdt_patch::enums::{JsonCrdtPatchOpcode, SESSION};
use crate::json_crdt_patch::operations::Op;
use crate::json_crdt_patch::patch::Patch;
use serde_json::Value;

struct Decoder {
    start: Ts,
}

impl Decoder {
    fn ts(&self, v: &Value) -> Result<Ts, DecodeError> {
        match v {
            Value::Number(n) => match n.as_i64() {
                Some(x) if x < 0 => {
                    let offset = x.unsigned_abs() - 1;
                    let time = self.start.time.checked_add(offset).ok_or(DecodeError::Overflow)?;
                    if time > SESSION::MAX {
                        return Err(DecodeError::Overflow);
                    }
                    Ok(ts(self.start.sid, time))
                }
                _ => Ok(ts(SESSION::SERVER, u53(v, "timestamp")?)),
            },
            Value::Array(items) if items.len() == 2 => {
                Ok(ts(u53(&items[0], "session id")?, u53(&items[1], "time")?))
            }
            _ => Err(DecodeError::InvalidStructure("timestamp")),
        }
    }

    fn op(&self, id: Ts, v: &Value) -> Result<Op, DecodeError> {
        let items = array(v, "operation")?;
        let code = at(items, 0)?
            .as_u64()
            .and_then(|c| u8::try_from(c).ok())
            .ok_or(DecodeError::InvalidStructure("opcode"))?;
        let opcode = JsonCrdtPatchOpcode::from_u8(code).ok_or(DecodeError::UnknownOpcode(code))?;
        let op = match opcode {
            JsonCrdtPatchOpcode::NewCon => Op::NewCon {
                id,
                val: items.get(1).cloned().unwrap_or(Value::Null),
            },
            JsonCrdtPatchOpcode::NewVal => Op::NewVal {
                id,
                val: self.ts(at(items, 1)?)?,
            },
            JsonCrdtPatchOpcode::NewObj => Op::NewObj { id },
            JsonCrdtPatchOpcode::NewStr => Op::NewStr { id },
            JsonCrdtPatchOpcode::NewBin => Op::NewBin { id },
            JsonCrdtPatchOpcode::NewArr => Op::NewArr { id },
            JsonCrdtPatchOpcode::InsVal => Op::InsVal {
                id,
                obj: self.ts(at(items, 1)?)?,
                val: self.ts(at(items, 2)?)?,
            },
            JsonCrdtPatchOpcode::InsObj => {
                let mut data = Vec::new();
                for tuple in array(at(items, 2)?, "ins_obj tuples")? {
                    let pair = array(tuple, "ins_obj tuple")?;
                    let key = string(at(pair, 0)?, "ins_obj key")?.to_owned();
                    data.push((key, self.ts(at(pair, 1)?)?));
                }
                let len = data.len();
                Op::InsObj {
                    id,
                    obj: self.ts(at(items, 1)?)?,
                    data: non_empty(data, len)?,
                }
            }
            JsonCrdtPatchOpcode::InsStr => {
                let data = string(at(items, 3)?, "ins_str value")?.to_owned();
                let len = data.len();
                Op::InsStr {
                    id,
                    obj: self.ts(at(items, 1)?)?,
                    after: self.ts(at(items, 2)?)?,
                    data: non_empty(data, len)?,
                }
            }
            JsonCrdtPatchOpcode::InsBin => {
                let data = from_base64(at(items, 3)?)?;
                let len = data.len();
                Op::InsBin {
                    id,
                    obj: self.ts(at(items, 1)?)?,
                    after: self.ts(at(items, 2)?)?,
                    data: non_empty(data, len)?,
                }
            }
            JsonCrdtPatchOpcode::InsArr => {
                let data = array(at(items, 3)?, "ins_arr value")?
                    .iter()
                    .map(|v| self.ts(v))
                    .collect::<Result<Vec<_>, _>>()?;
                let len = data.len();
                Op::InsArr {
                    id,
                    obj: self.ts(at(items, 1)?)?,
                    after: self.ts(at(items, 2)?)?,
                    data: non_empty(data, len)?,
                }
            }
            JsonCrdtPatchOpcode::Del => {
                let mut what = Vec::new();
                for span in array(at(items, 2)?, "del spans")? {
                    let pair = array(span, "del span")?;
                    let start = self.ts(at(pair, 0)?)?;
                    let len = u53(at(pair, 1)?, "span")?;
                    what.push(Tss::new(start.sid, start.time, len));
                }
                Op::Del {
                    id,
                    obj: self.ts(at(items, 1)?)?,
                    what,
                }
            }
            JsonCrdtPatchOpcode::Nop => Op::Nop {
                id,
                len: match items.get(1) {
                    Some(len) => u53(len, "nop len")?,
                    None => 1,
                },
            },
        };
        Ok(op)
    }
}

/// Decodes a compact-format JSON value into a [`Patch`].
pub fn decode(data: &Value) -> Result<Patch, DecodeError> {
    let items = array(data, "patch must be an array")?;
    let (header, ops) = items
        .split_first()
        .ok_or(DecodeError::InvalidStructure("missing header"))?;
    let start = match header {
        Value::Number(_) => ts(SESSION::SERVER, u53(header, "header time")?),
        Value::Array(pair) if pair.len() == 2 => {
            ts(u53(&pair[0], "session id")?, u53(&pair[1], "time")?)
        }
        _ => return Err(DecodeError::InvalidStructure("header")),
    };
    if ops.is_empty() {
        return Err(DecodeError::InvalidStructure("patch has no operations"));
    }
    let decoder = Decoder { start };
    let mut time = start.time;
    let mut out = Vec::with_capacity(ops.len());
    for op in ops {
        let decoded = decoder.op(ts(start.sid, time), op)?;
        time = advance(time, decoded.span())?;
        out.push(decoded);
    }
    Ok(Patch::from_ops(out))
}
