//! Session tables: compress session ids into small indices on the wire.

use crate::json_crdt_patch::clock::Ts;
use crate::json_crdt_patch::codec::DecodeError;
use crate::json_crdt_patch::enums::SESSION;
use crate::json_crdt_patch::util::binary::{CrdtReader, CrdtWriter};
use indexmap::IndexMap;

/// An insertion-ordered `session → reference time` table. A session's
/// position is its index on the wire; the reference time is the largest
/// time seen for it, so `reference - time` is never negative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockTable {
    entries: IndexMap<u64, u64>,
}

impl ClockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id`, appending its session if new and raising the session's
    /// reference time if `id` is later.
    pub fn observe(&mut self, id: Ts) -> usize {
        let entry = self.entries.entry(id.sid);
        let index = entry.index();
        let time = entry.or_insert(id.time);
        if id.time > *time {
            *time = id.time;
        }
        index
    }

    pub fn index_of(&self, sid: u64) -> Option<usize> {
        self.entries.get_index_of(&sid)
    }

    pub fn get_by_index(&self, index: usize) -> Option<Ts> {
        self.entries
            .get_index(index)
            .map(|(&sid, &time)| Ts::new(sid, time))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Ts> + '_ {
        self.entries.iter().map(|(&sid, &time)| Ts::new(sid, time))
    }

    /// `(session index, reference time - id.time)` for an observed id.
    pub fn relative(&self, id: Ts) -> Option<(u64, u64)> {
        let (index, _, &time) = self.entries.get_full(&id.sid)?;
        let diff = time.checked_sub(id.time)?;
        Some((index as u64, diff))
    }

    /// Inverse of [`ClockTable::relative`].
    pub fn absolute(&self, index: u64, diff: u64) -> Result<Ts, DecodeError> {
        let reference = usize::try_from(index)
            .ok()
            .and_then(|i| self.get_by_index(i))
            .ok_or(DecodeError::UnknownSession(index))?;
        let time = reference
            .time
            .checked_sub(diff)
            .ok_or(DecodeError::InvalidStructure("time diff exceeds reference time"))?;
        Ok(Ts::new(reference.sid, time))
    }

    /// `vu57` count, then `vu57` session and time per entry.
    pub fn write(&self, w: &mut CrdtWriter) {
        w.vu57(self.entries.len() as u64);
        for (&sid, &time) in &self.entries {
            w.vu57(sid);
            w.vu57(time);
        }
    }

    pub fn read(r: &mut CrdtReader<'_>) -> Result<Self, DecodeError> {
        let count = r.length()?;
        let mut table = ClockTable::new();
        for _ in 0..count {
            let sid = r.vu57()?;
            let time = r.vu57()?;
            if sid > SESSION::MAX || time > SESSION::MAX {
                return Err(DecodeError::Overflow);
            }
            if table.entries.insert(sid, time).is_some() {
                return Err(DecodeError::InvalidStructure("duplicate session in clock table"));
            }
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_crdt_patch::clock::ts;

    #[test]
    fn observe_keeps_first_seen_order_and_max_time() {
        let mut table = ClockTable::new();
        assert_eq!(table.observe(ts(900, 3)), 0);
        assert_eq!(table.observe(ts(100, 8)), 1);
        assert_eq!(table.observe(ts(900, 11)), 0);
        assert_eq!(table.observe(ts(900, 2)), 0);
        assert_eq!(table.get_by_index(0), Some(ts(900, 11)));
        assert_eq!(table.index_of(100), Some(1));
        assert_eq!(table.relative(ts(900, 4)), Some((0, 7)));
        assert_eq!(table.absolute(0, 7), Ok(ts(900, 4)));
        assert_eq!(table.absolute(5, 0), Err(DecodeError::UnknownSession(5)));
    }

    #[test]
    fn write_then_read() {
        let mut table = ClockTable::new();
        table.observe(ts(123_456, 40));
        table.observe(ts(1, 7));
        let mut w = CrdtWriter::new();
        table.write(&mut w);
        let data = w.flush();
        let decoded = ClockTable::read(&mut CrdtReader::new(&data)).expect("table must decode");
        assert_eq!(decoded, table);
    }

    #[test]
    fn duplicate_sessions_are_rejected() {
        let mut w = CrdtWriter::new();
        w.vu57(2);
        w.vu57(5);
        w.vu57(1);
        w.vu57(5);
        w.vu57(2);
        let data = w.flush();
        assert!(ClockTable::read(&mut CrdtReader::new(&data)).is_err());
    }
}
