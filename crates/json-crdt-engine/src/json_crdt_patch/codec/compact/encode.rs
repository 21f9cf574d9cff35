use crate::json_crdt_patch::clock::Ts;
use crate::json_crdt_patch::codec::json::to_base64;
use crate::json_crdt_patch::codec::{check_contiguous, EncodeError};
use crate::json_crdt_patch::enums::SESSION;
use crate::json_crdt_patch::operations::Op;
use crate::json_crdt_patch::patch::Patch;
use serde_json::{json, Value};

struct Encoder {
    start: Ts,
}

impl Encoder {
    fn ts(&self, id: Ts) -> Value {
        if id.sid == self.start.sid && id.time >= self.start.time {
            return json!(-((id.time - self.start.time) as i64) - 1);
        }
        if id.sid == SESSION::SERVER {
            return json!(id.time);
        }
        json!([id.sid, id.time])
    }

    fn op(&self, op: &Op) -> Value {
        let code = op.opcode() as u8;
        match op {
            Op::NewCon { val, .. } => json!([code, val]),
            Op::NewVal { val, .. } => json!([code, self.ts(*val)]),
            Op::NewObj { .. } | Op::NewStr { .. } | Op::NewBin { .. } | Op::NewArr { .. } => {
                json!([code])
            }
            Op::InsVal { obj, val, .. } => json!([code, self.ts(*obj), self.ts(*val)]),
            Op::InsObj { obj, data, .. } => {
                let tuples: Vec<Value> = data.iter().map(|(k, v)| json!([k, self.ts(*v)])).collect();
                json!([code, self.ts(*obj), tuples])
            }
            Op::InsStr {
                obj, after, data, ..
            } => json!([code, self.ts(*obj), self.ts(*after), data]),
            Op::InsBin {
                obj, after, data, ..
            } => json!([code, self.ts(*obj), self.ts(*after), to_base64(data)]),
            Op::InsArr {
                obj, after, data, ..
            } => {
                let items: Vec<Value> = data.iter().map(|v| self.ts(*v)).collect();
                json!([code, self.ts(*obj), self.ts(*after), items])
            }
            Op::Del { obj, what, .. } => {
                let spans: Vec<Value> = what
                    .iter()
                    .map(|s| json!([self.ts(s.ts()), s.span]))
                    .collect();
                json!([code, self.ts(*obj), spans])
            }
            Op::Nop { len, .. } if *len == 1 => json!([code]),
            Op::Nop { len, .. } => json!([code, len]),
        }
    }
}

/// Encodes a contiguous patch into the compact JSON format.
pub fn encode(patch: &Patch) -> Result<Value, EncodeError> {
    let start = check_contiguous(patch)?;
    let header = if start.sid == SESSION::SERVER {
        json!(start.time)
    } else {
        json!([start.sid, start.time])
    };
    let encoder = Encoder { start };
    let mut out = Vec::with_capacity(patch.ops.len() + 1);
    out.push(header);
    out.extend(patch.ops.iter().map(|op| encoder.op(op)));
    Ok(Value::Array(out))
}
