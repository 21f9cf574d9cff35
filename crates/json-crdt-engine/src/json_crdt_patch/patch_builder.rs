//! [`PatchBuilder`]: fluent builder for constructing [`Patch`]es.

use crate::json_crdt_patch::clock::{ts, Clock, ClockVector, LogicalClock, ServerClockVector, Ts, Tss};
use crate::json_crdt_patch::constants::ORIGIN;
use crate::json_crdt_patch::operations::Op;
use crate::json_crdt_patch::patch::Patch;
use serde_json::Value;

// ── Clock variants ─────────────────────────────────────────────────────────

/// The clock a [`PatchBuilder`] mints ids from.
#[derive(Debug, Clone)]
pub enum BuilderClock {
    Logical(LogicalClock),
    Server(ServerClockVector),
}

impl BuilderClock {
    fn as_clock(&self) -> &dyn Clock {
        match self {
            BuilderClock::Logical(c) => c,
            BuilderClock::Server(c) => c,
        }
    }

    pub fn sid(&self) -> u64 {
        self.as_clock().sid()
    }

    pub fn time(&self) -> u64 {
        self.as_clock().time()
    }

    /// Returns the next id and reserves `cycles` ids starting at it.
    pub fn tick(&mut self, cycles: u64) -> Ts {
        match self {
            BuilderClock::Logical(c) => c.tick(cycles),
            BuilderClock::Server(c) => c.tick(cycles),
        }
    }
}

// ── PatchBuilder ───────────────────────────────────────────────────────────

/// Builds a [`Patch`] operation by operation. Every method ticks the clock
/// by the span of the op it appends and returns the op id.
#[derive(Debug, Clone)]
pub struct PatchBuilder {
    pub clock: BuilderClock,
    pub patch: Patch,
}

impl PatchBuilder {
    /// Creates a builder with a [`LogicalClock`] at `(sid, time)`.
    pub fn new(sid: u64, time: u64) -> Self {
        Self {
            clock: BuilderClock::Logical(LogicalClock::new(sid, time)),
            patch: Patch::new(),
        }
    }

    /// Starts minting ids where a document's vector clock currently is.
    pub fn from_clock_vector(cv: &ClockVector) -> Self {
        Self::new(cv.sid(), cv.time())
    }

    pub fn from_server_clock(cv: ServerClockVector) -> Self {
        Self {
            clock: BuilderClock::Server(cv),
            patch: Patch::new(),
        }
    }

    /// The time the next op will be stamped with.
    pub fn next_time(&self) -> u64 {
        match self.patch.ops.last() {
            Some(_) => self.patch.next_time(),
            None => self.clock.time(),
        }
    }

    /// Returns the current patch and starts a new one. The clock keeps
    /// running, so consecutive patches do not overlap.
    pub fn flush(&mut self) -> Patch {
        std::mem::take(&mut self.patch)
    }

    // ── Padding ────────────────────────────────────────────────────────────

    /// Covers ids the clock handed out since the last op (e.g. through
    /// [`BuilderClock::tick`]) with a `Nop`, keeping the patch contiguous.
    pub fn pad(&mut self) {
        if self.patch.ops.is_empty() {
            return;
        }
        let end = self.patch.next_time();
        if let Some(len) = self.clock.time().checked_sub(end).filter(|&gap| gap > 0) {
            self.patch.ops.push(Op::Nop {
                id: ts(self.clock.sid(), end),
                len,
            });
        }
    }

    fn push(&mut self, make: impl FnOnce(Ts) -> Op) -> Ts {
        self.pad();
        let op = make(ts(self.clock.sid(), self.clock.time()));
        let id = self.clock.tick(op.span());
        self.patch.ops.push(op);
        id
    }

    // ── Creation operations ────────────────────────────────────────────────

    /// Create an immutable constant.
    pub fn con(&mut self, val: Value) -> Ts {
        self.push(|id| Op::NewCon { id, val })
    }

    /// Create an LWW register initially pointing at `val`.
    pub fn val(&mut self, val: Ts) -> Ts {
        self.push(|id| Op::NewVal { id, val })
    }

    pub fn obj(&mut self) -> Ts {
        self.push(|id| Op::NewObj { id })
    }

    pub fn str_node(&mut self) -> Ts {
        self.push(|id| Op::NewStr { id })
    }

    pub fn bin(&mut self) -> Ts {
        self.push(|id| Op::NewBin { id })
    }

    pub fn arr(&mut self) -> Ts {
        self.push(|id| Op::NewArr { id })
    }

    // ── Mutation operations ────────────────────────────────────────────────

    /// Point the document root at `val`.
    pub fn root(&mut self, val: Ts) -> Ts {
        self.set_val(ORIGIN, val)
    }

    pub fn set_val(&mut self, obj: Ts, val: Ts) -> Ts {
        self.push(|id| Op::InsVal { id, obj, val })
    }

    /// # Panics
    ///
    /// Panics when `data` is empty.
    pub fn ins_obj(&mut self, obj: Ts, data: Vec<(String, Ts)>) -> Ts {
        assert!(!data.is_empty(), "EMPTY_TUPLES");
        self.push(|id| Op::InsObj { id, obj, data })
    }

    /// Insert `data` after unit `after`; pass `obj` itself as `after` to
    /// insert at the start.
    ///
    /// # Panics
    ///
    /// Panics when `data` is empty.
    pub fn ins_str(&mut self, obj: Ts, after: Ts, data: impl Into<String>) -> Ts {
        let data = data.into();
        assert!(!data.is_empty(), "EMPTY_STRING");
        self.push(|id| Op::InsStr {
            id,
            obj,
            after,
            data,
        })
    }

    /// # Panics
    ///
    /// Panics when `data` is empty.
    pub fn ins_bin(&mut self, obj: Ts, after: Ts, data: Vec<u8>) -> Ts {
        assert!(!data.is_empty(), "EMPTY_BINARY");
        self.push(|id| Op::InsBin {
            id,
            obj,
            after,
            data,
        })
    }

    /// # Panics
    ///
    /// Panics when `data` is empty.
    pub fn ins_arr(&mut self, arr: Ts, after: Ts, data: Vec<Ts>) -> Ts {
        assert!(!data.is_empty(), "EMPTY_ARRAY");
        self.push(|id| Op::InsArr {
            id,
            obj: arr,
            after,
            data,
        })
    }

    /// Tombstone unit ranges of a sequence node.
    pub fn del(&mut self, obj: Ts, what: Vec<Tss>) -> Ts {
        self.push(|id| Op::Del { id, obj, what })
    }

    /// Consume `span` clock cycles without an effect.
    pub fn nop(&mut self, span: u64) -> Ts {
        self.push(|id| Op::Nop { id, len: span })
    }

    // ── JSON helpers ───────────────────────────────────────────────────────

    /// Builds `value` as a fresh node tree and returns its id. Objects become
    /// `obj`, arrays `arr`, strings `str`; other scalars become constants.
    pub fn json(&mut self, value: &Value) -> Ts {
        match value {
            Value::Object(map) => {
                let obj = self.obj();
                if !map.is_empty() {
                    let data: Vec<(String, Ts)> = map
                        .iter()
                        .map(|(k, v)| (k.clone(), self.json(v)))
                        .collect();
                    self.ins_obj(obj, data);
                }
                obj
            }
            Value::Array(items) => {
                let arr = self.arr();
                if !items.is_empty() {
                    let data: Vec<Ts> = items.iter().map(|v| self.json(v)).collect();
                    self.ins_arr(arr, arr, data);
                }
                arr
            }
            Value::String(s) => {
                let node = self.str_node();
                if !s.is_empty() {
                    self.ins_str(node, node, s.clone());
                }
                node
            }
            other => self.con(other.clone()),
        }
    }
}
