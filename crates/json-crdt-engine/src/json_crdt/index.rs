//! Identifier index: resolves any id ever minted by an applied operation to
//! the entity that owns it.
//!
//! Entries live in one map keyed by their start id. [`Ts`] orders by session
//! first, so a lookup for an interior unit of a multi-unit insert is a single
//! `range(..=id).next_back()`.

use std::collections::BTreeMap;

use crate::json_crdt_patch::clock::{contains_id, ts, Ts};

/// What an index entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Node,
    /// A sequence chunk owned by node `node`.
    Chunk { node: Ts },
}

/// One indexed entity covering ids `[id, id + span)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: Ts,
    pub span: u64,
    pub kind: EntityKind,
}

impl IndexEntry {
    pub fn node(id: Ts) -> Self {
        Self {
            id,
            span: 1,
            kind: EntityKind::Node,
        }
    }

    pub fn chunk(node: Ts, id: Ts, span: u64) -> Self {
        Self {
            id,
            span,
            kind: EntityKind::Chunk { node },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    entries: BTreeMap<Ts, IndexEntry>,
}

impl IdIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `entry` under its start id. An entry already registered at
    /// the same start id is kept.
    pub fn index(&mut self, entry: IndexEntry) -> bool {
        if self.entries.contains_key(&entry.id) {
            return false;
        }
        self.entries.insert(entry.id, entry);
        true
    }

    /// Entry whose range contains `id`.
    pub fn get(&self, id: Ts) -> Option<&IndexEntry> {
        let (_, entry) = self.entries.range(..=id).next_back()?;
        contains_id(entry.id, entry.span, id).then_some(entry)
    }

    pub fn contains(&self, id: Ts) -> bool {
        self.get(id).is_some()
    }

    /// Whether any id of `[id, id + span)` is already taken.
    pub fn overlaps(&self, id: Ts, span: u64) -> bool {
        if self.contains(id) {
            return true;
        }
        if span <= 1 {
            return false;
        }
        let end = ts(id.sid, id.time.saturating_add(span));
        self.entries.range(ts(id.sid, id.time + 1)..end).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, ordered by session then time.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> + '_ {
        self.entries.values()
    }
}
