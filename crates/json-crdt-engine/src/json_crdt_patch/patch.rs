//! [`Patch`]: an ordered batch of operations from one session.

use crate::json_crdt_patch::clock::{ts, Ts};
use crate::json_crdt_patch::operations::Op;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("patch has no operations")]
    EmptyPatch,
    #[error("cannot combine patches from sessions {expected} and {found}")]
    SessionMismatch { expected: u64, found: u64 },
    #[error("patch starting at {found} overlaps the previous patch ending at {next}")]
    TimeTravel { next: u64, found: u64 },
    #[error("split index {index} is outside 1..{len}")]
    SplitOutOfRange { index: usize, len: usize },
}

/// A JSON CRDT Patch: an ordered list of operations. Normally created via
/// [`PatchBuilder`](super::patch_builder::PatchBuilder), which guarantees the
/// ops are contiguous in one session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Patch {
    pub ops: Vec<Op>,
}

impl Patch {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    pub fn from_ops(ops: Vec<Op>) -> Self {
        Self { ops }
    }

    /// Returns the ID of the first operation, if any.
    pub fn get_id(&self) -> Option<Ts> {
        self.ops.first().map(|op| op.id())
    }

    /// Returns the total logical clock span consumed by all operations.
    pub fn span(&self) -> u64 {
        self.ops.iter().map(|op| op.span()).sum()
    }

    /// Logical time right after the last operation; 0 for an empty patch.
    pub fn next_time(&self) -> u64 {
        match self.ops.last() {
            None => 0,
            Some(op) => op.id().time + op.span(),
        }
    }

    /// Every op shares the session of the first and starts exactly where the
    /// previous one ended.
    pub fn is_contiguous(&self) -> bool {
        let Some(first) = self.get_id() else {
            return true;
        };
        let mut next = first.time;
        for op in &self.ops {
            let id = op.id();
            if id.sid != first.sid || id.time != next {
                return false;
            }
            next += op.span();
        }
        true
    }

    /// Creates a new patch where every timestamp is transformed by `f`.
    pub fn rewrite_time(&self, f: impl Fn(Ts) -> Ts) -> Patch {
        Patch {
            ops: self.ops.iter().map(|op| op.map_ts(&f)).collect(),
        }
    }

    /// Moves the patch so its first operation begins at `new_time`.
    ///
    /// Only timestamps of the patch's own session at or after
    /// `transform_after` (defaults to the patch start) are shifted, so
    /// references to earlier state are left intact.
    pub fn rebase(&self, new_time: u64, transform_after: Option<u64>) -> Result<Patch, PatchError> {
        let id = self.get_id().ok_or(PatchError::EmptyPatch)?;
        let sid = id.sid;
        let start = id.time;
        let transform_after = transform_after.unwrap_or(start);
        if start == new_time {
            return Ok(self.clone());
        }
        Ok(self.rewrite_time(|stamp: Ts| {
            if stamp.sid != sid || stamp.time < transform_after {
                return stamp;
            }
            ts(sid, stamp.time - start + new_time)
        }))
    }

    /// Splits the patch before op `index`; both halves stay contiguous.
    pub fn split_at(&self, index: usize) -> Result<(Patch, Patch), PatchError> {
        if index == 0 || index >= self.ops.len() {
            return Err(PatchError::SplitOutOfRange {
                index,
                len: self.ops.len(),
            });
        }
        let (left, right) = self.ops.split_at(index);
        Ok((Patch::from_ops(left.to_vec()), Patch::from_ops(right.to_vec())))
    }

    /// Encodes the patch with the binary codec.
    pub fn to_binary(&self) -> Result<Vec<u8>, crate::json_crdt_patch::codec::EncodeError> {
        crate::json_crdt_patch::codec::binary::encode(self)
    }

    /// Decodes a patch written by [`Patch::to_binary`].
    pub fn from_binary(data: &[u8]) -> Result<Patch, crate::json_crdt_patch::codec::DecodeError> {
        crate::json_crdt_patch::codec::binary::decode(data)
    }
}

/// Concatenates patches of one session in order. Gaps between patches are
/// filled with a `Nop` so the result stays contiguous.
pub fn combine(patches: Vec<Patch>) -> Result<Patch, PatchError> {
    let mut out = Patch::new();
    for current in patches {
        let Some(cid) = current.get_id() else {
            continue;
        };
        if let Some(fid) = out.get_id() {
            if fid.sid != cid.sid {
                return Err(PatchError::SessionMismatch {
                    expected: fid.sid,
                    found: cid.sid,
                });
            }
            let next = out.next_time();
            if cid.time < next {
                return Err(PatchError::TimeTravel {
                    next,
                    found: cid.time,
                });
            }
            if cid.time > next {
                out.ops.push(Op::Nop {
                    id: ts(fid.sid, next),
                    len: cid.time - next,
                });
            }
        }
        out.ops.extend(current.ops);
    }
    Ok(out)
}

impl std::fmt::Display for Patch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get_id() {
            Some(id) => write!(f, "patch {}!{}", id, self.span())?,
            None => f.write_str("patch (empty)")?,
        }
        let last = self.ops.len().saturating_sub(1);
        for (i, op) in self.ops.iter().enumerate() {
            let branch = if i == last { "└─" } else { "├─" };
            write!(f, "\n{branch} {op}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch() {
        let p = Patch::new();
        assert_eq!(p.get_id(), None);
        assert_eq!(p.span(), 0);
        assert_eq!(p.next_time(), 0);
        assert!(p.is_contiguous());
        assert_eq!(p.rebase(5, None), Err(PatchError::EmptyPatch));
    }

    #[test]
    fn span_and_next_time() {
        let p = Patch::from_ops(vec![
            Op::NewStr { id: ts(9, 100) },
            Op::InsStr {
                id: ts(9, 101),
                obj: ts(9, 100),
                after: ts(9, 100),
                data: "abc".into(),
            },
        ]);
        assert_eq!(p.get_id(), Some(ts(9, 100)));
        assert_eq!(p.span(), 4);
        assert_eq!(p.next_time(), 104);
        assert!(p.is_contiguous());
    }

    #[test]
    fn gap_is_not_contiguous() {
        let p = Patch::from_ops(vec![Op::NewObj { id: ts(9, 1) }, Op::NewObj { id: ts(9, 3) }]);
        assert!(!p.is_contiguous());
    }

    #[test]
    fn rebase_shifts_own_session_only() {
        let p = Patch::from_ops(vec![
            Op::NewStr { id: ts(1, 10) },
            Op::InsStr {
                id: ts(1, 11),
                obj: ts(1, 10),
                after: ts(1, 4),
                data: "x".into(),
            },
            Op::InsVal {
                id: ts(1, 12),
                obj: ts(2, 3),
                val: ts(1, 10),
            },
        ]);
        let rebased = p.rebase(50, None).expect("rebase must succeed");
        assert_eq!(rebased.get_id(), Some(ts(1, 50)));
        match &rebased.ops[1] {
            Op::InsStr { obj, after, .. } => {
                assert_eq!(*obj, ts(1, 50));
                assert_eq!(*after, ts(1, 4));
            }
            other => panic!("unexpected op {other:?}"),
        }
        match &rebased.ops[2] {
            Op::InsVal { obj, val, .. } => {
                assert_eq!(*obj, ts(2, 3));
                assert_eq!(*val, ts(1, 50));
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn combine_fills_gaps_with_nop() {
        let p1 = Patch::from_ops(vec![Op::NewStr { id: ts(1, 0) }]);
        let p2 = Patch::from_ops(vec![Op::NewObj { id: ts(1, 4) }]);
        let combined = combine(vec![p1, p2]).expect("combine must succeed");
        assert_eq!(combined.ops.len(), 3);
        assert_eq!(combined.ops[1], Op::Nop { id: ts(1, 1), len: 3 });
        assert!(combined.is_contiguous());
    }

    #[test]
    fn combine_rejects_mixed_sessions_and_overlap() {
        let a = Patch::from_ops(vec![Op::NewStr { id: ts(1, 0) }]);
        let b = Patch::from_ops(vec![Op::NewStr { id: ts(2, 1) }]);
        assert_eq!(
            combine(vec![a.clone(), b]),
            Err(PatchError::SessionMismatch { expected: 1, found: 2 })
        );
        let c = Patch::from_ops(vec![Op::NewStr { id: ts(1, 0) }]);
        assert_eq!(
            combine(vec![a, c]),
            Err(PatchError::TimeTravel { next: 1, found: 0 })
        );
    }

    #[test]
    fn split_keeps_halves_contiguous() {
        let p = Patch::from_ops(vec![
            Op::NewObj { id: ts(3, 1) },
            Op::NewArr { id: ts(3, 2) },
            Op::NewStr { id: ts(3, 3) },
        ]);
        let (l, r) = p.split_at(1).expect("split must succeed");
        assert_eq!(l.ops.len(), 1);
        assert_eq!(r.get_id(), Some(ts(3, 2)));
        assert!(l.is_contiguous() && r.is_contiguous());
        assert!(p.split_at(0).is_err());
        assert!(p.split_at(3).is_err());
    }

    #[test]
    fn display_lists_ops() {
        let p = Patch::from_ops(vec![Op::NewObj { id: ts(3, 1) }]);
        assert_eq!(p.to_string(), "patch 3.1!1\n└─ new_obj 3.1");
    }
}
