//! The closed set of JSON CRDT Patch operations.

use std::fmt;

use crate::json_crdt_patch::clock::{Ts, Tss};
use crate::json_crdt_patch::enums::JsonCrdtPatchOpcode;
use serde_json::Value;

// ── Operation ──────────────────────────────────────────────────────────────

/// A single JSON CRDT Patch operation.
///
/// Each variant carries an `id: Ts` identifying the operation in the
/// global logical clock space.
///
/// Span (the number of clock ticks consumed):
/// - Most operations consume 1 tick.
/// - `InsStr`, `InsBin`, `InsArr` consume one tick per element.
/// - `Nop` consumes `len` ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    // ── Creation operations ──────────────────────────────────────────────
    /// Create an immutable constant.
    NewCon { id: Ts, val: Value },
    /// Create an LWW register pointing at `val`.
    NewVal { id: Ts, val: Ts },
    /// Create an LWW map.
    NewObj { id: Ts },
    /// Create an RGA string.
    NewStr { id: Ts },
    /// Create an RGA byte sequence.
    NewBin { id: Ts },
    /// Create an RGA array.
    NewArr { id: Ts },

    // ── Mutation operations ──────────────────────────────────────────────
    /// Write a register; `obj == ORIGIN` writes the document root.
    InsVal { id: Ts, obj: Ts, val: Ts },
    /// Write key registers of a map.
    InsObj {
        id: Ts,
        obj: Ts,
        data: Vec<(String, Ts)>,
    },
    /// Insert characters after unit `after` (or after the node id itself for
    /// the start of the string).
    InsStr {
        id: Ts,
        obj: Ts,
        after: Ts,
        data: String,
    },
    InsBin {
        id: Ts,
        obj: Ts,
        after: Ts,
        data: Vec<u8>,
    },
    InsArr {
        id: Ts,
        obj: Ts,
        after: Ts,
        data: Vec<Ts>,
    },
    /// Tombstone ranges of units in a sequence node.
    Del { id: Ts, obj: Ts, what: Vec<Tss> },
    /// Consumes clock cycles without changing the document.
    Nop { id: Ts, len: u64 },
}

impl Op {
    pub fn id(&self) -> Ts {
        match self {
            Op::NewCon { id, .. }
            | Op::NewVal { id, .. }
            | Op::NewObj { id }
            | Op::NewStr { id }
            | Op::NewBin { id }
            | Op::NewArr { id }
            | Op::InsVal { id, .. }
            | Op::InsObj { id, .. }
            | Op::InsStr { id, .. }
            | Op::InsBin { id, .. }
            | Op::InsArr { id, .. }
            | Op::Del { id, .. }
            | Op::Nop { id, .. } => *id,
        }
    }

    /// Number of logical clock cycles consumed by this operation.
    pub fn span(&self) -> u64 {
        match self {
            Op::InsStr { data, .. } => data.chars().count() as u64,
            Op::InsBin { data, .. } => data.len() as u64,
            Op::InsArr { data, .. } => data.len() as u64,
            Op::Nop { len, .. } => *len,
            _ => 1,
        }
    }

    /// Short mnemonic, as written by the verbose codec.
    pub fn name(&self) -> &'static str {
        match self {
            Op::NewCon { .. } => "new_con",
            Op::NewVal { .. } => "new_val",
            Op::NewObj { .. } => "new_obj",
            Op::NewStr { .. } => "new_str",
            Op::NewBin { .. } => "new_bin",
            Op::NewArr { .. } => "new_arr",
            Op::InsVal { .. } => "ins_val",
            Op::InsObj { .. } => "ins_obj",
            Op::InsStr { .. } => "ins_str",
            Op::InsBin { .. } => "ins_bin",
            Op::InsArr { .. } => "ins_arr",
            Op::Del { .. } => "del",
            Op::Nop { .. } => "nop",
        }
    }

    pub fn opcode(&self) -> JsonCrdtPatchOpcode {
        match self {
            Op::NewCon { .. } => JsonCrdtPatchOpcode::NewCon,
            Op::NewVal { .. } => JsonCrdtPatchOpcode::NewVal,
            Op::NewObj { .. } => JsonCrdtPatchOpcode::NewObj,
            Op::NewStr { .. } => JsonCrdtPatchOpcode::NewStr,
            Op::NewBin { .. } => JsonCrdtPatchOpcode::NewBin,
            Op::NewArr { .. } => JsonCrdtPatchOpcode::NewArr,
            Op::InsVal { .. } => JsonCrdtPatchOpcode::InsVal,
            Op::InsObj { .. } => JsonCrdtPatchOpcode::InsObj,
            Op::InsStr { .. } => JsonCrdtPatchOpcode::InsStr,
            Op::InsBin { .. } => JsonCrdtPatchOpcode::InsBin,
            Op::InsArr { .. } => JsonCrdtPatchOpcode::InsArr,
            Op::Del { .. } => JsonCrdtPatchOpcode::Del,
            Op::Nop { .. } => JsonCrdtPatchOpcode::Nop,
        }
    }

    /// Every timestamp the op carries: its own id first, then references.
    pub fn timestamps(&self) -> Vec<Ts> {
        let mut out = vec![self.id()];
        match self {
            Op::NewVal { val, .. } => out.push(*val),
            Op::InsVal { obj, val, .. } => out.extend([*obj, *val]),
            Op::InsObj { obj, data, .. } => {
                out.push(*obj);
                out.extend(data.iter().map(|(_, v)| *v));
            }
            Op::InsStr { obj, after, .. } | Op::InsBin { obj, after, .. } => {
                out.extend([*obj, *after])
            }
            Op::InsArr {
                obj, after, data, ..
            } => {
                out.extend([*obj, *after]);
                out.extend(data.iter().copied());
            }
            Op::Del { obj, what, .. } => {
                out.push(*obj);
                out.extend(what.iter().map(|s| s.ts()));
            }
            _ => {}
        }
        out
    }

    /// Returns a copy with every timestamp (own id and references) passed
    /// through `f`.
    pub fn map_ts(&self, f: impl Fn(Ts) -> Ts) -> Op {
        match self {
            Op::NewCon { id, val } => Op::NewCon {
                id: f(*id),
                val: val.clone(),
            },
            Op::NewVal { id, val } => Op::NewVal {
                id: f(*id),
                val: f(*val),
            },
            Op::NewObj { id } => Op::NewObj { id: f(*id) },
            Op::NewStr { id } => Op::NewStr { id: f(*id) },
            Op::NewBin { id } => Op::NewBin { id: f(*id) },
            Op::NewArr { id } => Op::NewArr { id: f(*id) },
            Op::InsVal { id, obj, val } => Op::InsVal {
                id: f(*id),
                obj: f(*obj),
                val: f(*val),
            },
            Op::InsObj { id, obj, data } => Op::InsObj {
                id: f(*id),
                obj: f(*obj),
                data: data.iter().map(|(k, v)| (k.clone(), f(*v))).collect(),
            },
            Op::InsStr {
                id,
                obj,
                after,
                data,
            } => Op::InsStr {
                id: f(*id),
                obj: f(*obj),
                after: f(*after),
                data: data.clone(),
            },
            Op::InsBin {
                id,
                obj,
                after,
                data,
            } => Op::InsBin {
                id: f(*id),
                obj: f(*obj),
                after: f(*after),
                data: data.clone(),
            },
            Op::InsArr {
                id,
                obj,
                after,
                data,
            } => Op::InsArr {
                id: f(*id),
                obj: f(*obj),
                after: f(*after),
                data: data.iter().map(|v| f(*v)).collect(),
            },
            Op::Del { id, obj, what } => Op::Del {
                id: f(*id),
                obj: f(*obj),
                what: what
                    .iter()
                    .map(|s| {
                        let start = f(s.ts());
                        Tss::new(start.sid, start.time, s.span)
                    })
                    .collect(),
            },
            Op::Nop { id, len } => Op::Nop {
                id: f(*id),
                len: *len,
            },
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        match self.span() {
            1 => write!(f, " {}", self.id())?,
            span => write!(f, " {}!{}", self.id(), span)?,
        }
        match self {
            Op::NewCon { val, .. } => write!(f, " = {val}"),
            Op::NewVal { val, .. } => write!(f, " -> {val}"),
            Op::NewObj { .. } | Op::NewStr { .. } | Op::NewBin { .. } | Op::NewArr { .. } => Ok(()),
            Op::Nop { .. } => Ok(()),
            Op::InsVal { obj, val, .. } => write!(f, " {obj} -> {val}"),
            Op::InsObj { obj, data, .. } => {
                write!(f, " {obj} {{")?;
                for (i, (key, val)) in data.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{key:?}: {val}")?;
                }
                f.write_str(" }")
            }
            Op::InsStr { obj, after, data, .. } => write!(f, " {obj} after {after} {data:?}"),
            Op::InsBin { obj, after, data, .. } => write!(f, " {obj} after {after} {data:?}"),
            Op::InsArr { obj, after, data, .. } => {
                write!(f, " {obj} after {after} [")?;
                write_list(f, data)?;
                f.write_str("]")
            }
            Op::Del { obj, what, .. } => {
                write!(f, " {obj} [")?;
                write_list(f, what)?;
                f.write_str("]")
            }
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
