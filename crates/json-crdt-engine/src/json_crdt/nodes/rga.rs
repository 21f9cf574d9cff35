//! RGA (Replicated Growable Array) shared by the string, binary and array
//! nodes.
//!
//! Chunks live in an arena and are linked in sequence order through
//! `prev`/`next` slot indices. A `BTreeMap` keyed by each chunk's first id
//! finds the chunk holding any unit in O(log n); because [`Ts`] orders by
//! session first, all chunks of one session are adjacent in that map.
//!
//! Every chunk remembers its causal [`Anchor`]. The sequence is the pre-order
//! walk of the tree in which a unit's children are the chunks inserted right
//! after it, ascending by id, followed by the unit's own continuation. That
//! order depends only on the set of inserts, never on arrival order.

use crate::json_crdt_patch::clock::{Ts, Tss};
use std::collections::BTreeMap;
use thiserror::Error;

// ── ChunkData ─────────────────────────────────────────────────────────────

/// Chunk payload that can be measured and split in logical units.
pub trait ChunkData: Clone {
    fn units(&self) -> u64;
    /// Keeps units `[0, at)` in `self` and returns units `[at, len)`.
    fn split_at_unit(&mut self, at: u64) -> Self;
}

impl ChunkData for String {
    fn units(&self) -> u64 {
        self.chars().count() as u64
    }

    fn split_at_unit(&mut self, at: u64) -> Self {
        let byte_pos = self
            .char_indices()
            .nth(at as usize)
            .map(|(i, _)| i)
            .unwrap_or(self.len());
        self.split_off(byte_pos)
    }
}

impl ChunkData for Vec<u8> {
    fn units(&self) -> u64 {
        self.len() as u64
    }

    fn split_at_unit(&mut self, at: u64) -> Self {
        self.split_off((at as usize).min(self.len()))
    }
}

impl ChunkData for Vec<Ts> {
    fn units(&self) -> u64 {
        self.len() as u64
    }

    fn split_at_unit(&mut self, at: u64) -> Self {
        self.split_off((at as usize).min(self.len()))
    }
}

// ── Chunk ─────────────────────────────────────────────────────────────────

/// Where a chunk was placed when it was inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// Inserted at the start sentinel.
    Start,
    /// Inserted right after unit `Ts`.
    After(Ts),
    /// Right half of a split chunk; follows unit `(id.sid, id.time - 1)`.
    Continuation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    /// Id of the first unit; the chunk covers `[id, id + span)`.
    pub id: Ts,
    pub span: u64,
    pub anchor: Anchor,
    /// `None` once the chunk is a tombstone. The span is kept forever.
    pub data: Option<T>,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<T> Chunk<T> {
    pub fn is_deleted(&self) -> bool {
        self.data.is_none()
    }

    /// Number of visible units.
    pub fn len(&self) -> u64 {
        if self.is_deleted() {
            0
        } else {
            self.span
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Ts {
        Ts::new(self.id.sid, self.id.time + self.span - 1)
    }

    pub fn contains(&self, id: Ts) -> bool {
        id.sid == self.id.sid && id.time >= self.id.time && id.time < self.id.time + self.span
    }

    /// The unit this chunk hangs off in the causal tree.
    pub fn parent(&self) -> Option<Ts> {
        match self.anchor {
            Anchor::Start => None,
            Anchor::After(ts) => Some(ts),
            Anchor::Continuation => Some(Ts::new(self.id.sid, self.id.time - 1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RgaError {
    #[error("insert anchor {0} not found")]
    AnchorNotFound(Ts),
    #[error("insert carries no units")]
    EmptyInsert,
    #[error("units starting at {0} already exist")]
    Duplicate(Ts),
    #[error("chunk span must be positive")]
    EmptySpan,
}

/// `(first unit, span, deleted, anchor)` of one chunk.
pub type ChunkLayout = (Ts, u64, bool, Anchor);

// ── Rga ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Rga<T> {
    slots: Vec<Chunk<T>>,
    head: Option<usize>,
    tail: Option<usize>,
    by_id: BTreeMap<Ts, usize>,
}

impl<T> Default for Rga<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            head: None,
            tail: None,
            by_id: BTreeMap::new(),
        }
    }
}

impl<T: ChunkData> Rga<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk(&self, slot: usize) -> &Chunk<T> {
        &self.slots[slot]
    }

    /// Slot of the chunk containing unit `id`.
    pub fn find_by_id(&self, id: Ts) -> Option<usize> {
        let (_, &slot) = self.by_id.range(..=id).next_back()?;
        self.slots[slot].contains(id).then_some(slot)
    }

    /// Whether any unit of `[id, id + span)` already exists.
    fn overlaps(&self, id: Ts, span: u64) -> bool {
        self.find_by_id(id).is_some()
            || self
                .by_id
                .range(Ts::new(id.sid, id.time + 1)..Ts::new(id.sid, id.time + span))
                .next()
                .is_some()
    }

    // ── Linking ──────────────────────────────────────────────────────────

    fn alloc(&mut self, id: Ts, span: u64, anchor: Anchor, data: Option<T>) -> usize {
        let slot = self.slots.len();
        self.slots.push(Chunk {
            id,
            span,
            anchor,
            data,
            prev: None,
            next: None,
        });
        self.by_id.insert(id, slot);
        slot
    }

    /// Links `slot` right after `left`, or at the head when `left` is `None`.
    fn link_after(&mut self, slot: usize, left: Option<usize>) {
        let right = match left {
            Some(l) => self.slots[l].next,
            None => self.head,
        };
        self.slots[slot].prev = left;
        self.slots[slot].next = right;
        match left {
            Some(l) => self.slots[l].next = Some(slot),
            None => self.head = Some(slot),
        }
        match right {
            Some(r) => self.slots[r].prev = Some(slot),
            None => self.tail = Some(slot),
        }
    }

    /// Splits the chunk at `slot` after `offset` units and returns the slot
    /// of the right half.
    fn split(&mut self, slot: usize, offset: u64) -> usize {
        let chunk = &mut self.slots[slot];
        debug_assert!(offset > 0 && offset < chunk.span);
        let right_data = chunk.data.as_mut().map(|d| d.split_at_unit(offset));
        let right_id = Ts::new(chunk.id.sid, chunk.id.time + offset);
        let right_span = chunk.span - offset;
        chunk.span = offset;
        let right = self.alloc(right_id, right_span, Anchor::Continuation, right_data);
        self.link_after(right, Some(slot));
        right
    }

    /// Last slot of the causal subtree rooted at `slot`. Members are kept by
    /// first unit so each parent check is one range lookup.
    fn subtree_end(&self, slot: usize) -> usize {
        let root = &self.slots[slot];
        let mut members = BTreeMap::from([(root.id, root.span)]);
        let mut last = slot;
        let mut cursor = root.next;
        while let Some(c) = cursor {
            let chunk = &self.slots[c];
            let inside = chunk.parent().is_some_and(|p| {
                members
                    .range(..=p)
                    .next_back()
                    .is_some_and(|(id, &span)| id.sid == p.sid && p.time < id.time + span)
            });
            if !inside {
                break;
            }
            members.insert(chunk.id, chunk.span);
            last = c;
            cursor = chunk.next;
        }
        last
    }

    // ── Mutation ─────────────────────────────────────────────────────────

    /// Inserts `data` as units `[id, id + len)` right after unit `after`, or
    /// at the start when `after` is `None`. Returns the new chunk's slot.
    pub fn insert(&mut self, after: Option<Ts>, id: Ts, data: T) -> Result<usize, RgaError> {
        let span = data.units();
        if span == 0 {
            return Err(RgaError::EmptyInsert);
        }
        if self.overlaps(id, span) {
            return Err(RgaError::Duplicate(id));
        }
        let (sibling_anchor, mut left) = match after {
            None => (Anchor::Start, None),
            Some(a) => {
                let slot = self.find_by_id(a).ok_or(RgaError::AnchorNotFound(a))?;
                let chunk = &self.slots[slot];
                if a.time < chunk.last().time {
                    let offset = a.time - chunk.id.time + 1;
                    self.split(slot, offset);
                }
                (Anchor::After(a), Some(slot))
            }
        };
        let mut cursor = match left {
            Some(l) => self.slots[l].next,
            None => self.head,
        };
        // Siblings with a smaller id come first, together with everything
        // inserted after them.
        while let Some(c) = cursor {
            let chunk = &self.slots[c];
            if chunk.anchor != sibling_anchor || chunk.id > id {
                break;
            }
            let end = self.subtree_end(c);
            left = Some(end);
            cursor = self.slots[end].next;
        }
        let slot = self.alloc(id, span, sibling_anchor, Some(data));
        self.link_after(slot, left);
        Ok(slot)
    }

    /// Appends a chunk at the end of the sequence as-is. Used when restoring
    /// a snapshot, whose chunks are already in sequence order.
    pub fn push_chunk(
        &mut self,
        id: Ts,
        span: u64,
        anchor: Anchor,
        data: Option<T>,
    ) -> Result<usize, RgaError> {
        if span == 0 {
            return Err(RgaError::EmptySpan);
        }
        if self.overlaps(id, span) {
            return Err(RgaError::Duplicate(id));
        }
        let slot = self.alloc(id, span, anchor, data);
        self.link_after(slot, self.tail);
        Ok(slot)
    }

    /// Tombstones every existing unit covered by `spans`. Chunks are split
    /// at span boundaries even when already deleted, so chunk layout does not
    /// depend on the order deletes arrive in. Returns the number of units
    /// that went from visible to deleted.
    pub fn delete(&mut self, spans: &[Tss]) -> u64 {
        let mut removed = 0;
        for span in spans {
            if span.span == 0 {
                continue;
            }
            let end = span.end();
            let mut targets: Vec<usize> = Vec::new();
            if let Some(slot) = self.find_by_id(span.ts()) {
                targets.push(slot);
            }
            targets.extend(
                self.by_id
                    .range(Ts::new(span.sid, span.time + 1)..Ts::new(span.sid, end))
                    .map(|(_, &slot)| slot),
            );
            for slot in targets {
                let mut target = slot;
                let start = self.slots[target].id.time;
                if span.time > start {
                    target = self.split(target, span.time - start);
                }
                let chunk = &self.slots[target];
                if end < chunk.id.time + chunk.span {
                    let offset = end - chunk.id.time;
                    self.split(target, offset);
                }
                let chunk = &mut self.slots[target];
                if chunk.data.take().is_some() {
                    removed += chunk.span;
                }
            }
        }
        removed
    }

    // ── Traversal ────────────────────────────────────────────────────────

    /// All chunks, tombstones included, in sequence order.
    pub fn chunks(&self) -> Chunks<'_, T> {
        Chunks {
            rga: self,
            cursor: self.head,
            forward: true,
        }
    }

    /// All chunks from last to first.
    pub fn chunks_rev(&self) -> Chunks<'_, T> {
        Chunks {
            rga: self,
            cursor: self.tail,
            forward: false,
        }
    }

    /// Live chunks in sequence order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk<T>> + '_ {
        self.chunks().filter(|c| !c.is_deleted())
    }

    /// Live chunks from last to first.
    pub fn iter_rev(&self) -> impl Iterator<Item = &Chunk<T>> + '_ {
        self.chunks_rev().filter(|c| !c.is_deleted())
    }

    /// Number of visible units.
    pub fn length(&self) -> u64 {
        self.iter().map(|c| c.span).sum()
    }

    /// Every chunk in sequence order, tombstones included.
    pub fn layout(&self) -> Vec<ChunkLayout> {
        self.chunks().map(|c| (c.id, c.span, c.is_deleted(), c.anchor)).collect()
    }

    pub fn chunk_count(&self) -> usize {
        self.slots.len()
    }

    pub fn tombstone_count(&self) -> usize {
        self.slots.iter().filter(|c| c.is_deleted()).count()
    }

    /// Id of the visible unit at position `pos`.
    pub fn find(&self, pos: u64) -> Option<Ts> {
        let mut remaining = pos;
        for chunk in self.iter() {
            if remaining < chunk.span {
                return Some(Ts::new(chunk.id.sid, chunk.id.time + remaining));
            }
            remaining -= chunk.span;
        }
        None
    }

    /// Id spans of `len` visible units starting at position `pos`. Runs past
    /// the end are truncated.
    pub fn find_interval(&self, pos: u64, len: u64) -> Vec<Tss> {
        let mut out = Vec::new();
        let mut skip = pos;
        let mut want = len;
        for chunk in self.iter() {
            if want == 0 {
                break;
            }
            if skip >= chunk.span {
                skip -= chunk.span;
                continue;
            }
            let take = (chunk.span - skip).min(want);
            out.push(Tss::new(chunk.id.sid, chunk.id.time + skip, take));
            want -= take;
            skip = 0;
        }
        out
    }

    /// Last visible unit, if any.
    pub fn last_live(&self) -> Option<Ts> {
        self.iter_rev().next().map(|c| c.last())
    }

    /// Nearest visible unit before unit `id` in sequence order.
    pub fn prev_live(&self, id: Ts) -> Option<Ts> {
        let slot = self.find_by_id(id)?;
        let chunk = &self.slots[slot];
        if !chunk.is_deleted() && id.time > chunk.id.time {
            return Some(Ts::new(id.sid, id.time - 1));
        }
        let mut cursor = chunk.prev;
        while let Some(c) = cursor {
            let chunk = &self.slots[c];
            if !chunk.is_deleted() {
                return Some(chunk.last());
            }
            cursor = chunk.prev;
        }
        None
    }

    /// Nearest visible unit after unit `id` in sequence order.
    pub fn next_live(&self, id: Ts) -> Option<Ts> {
        let slot = self.find_by_id(id)?;
        let chunk = &self.slots[slot];
        if !chunk.is_deleted() && id.time < chunk.last().time {
            return Some(Ts::new(id.sid, id.time + 1));
        }
        let mut cursor = chunk.next;
        while let Some(c) = cursor {
            let chunk = &self.slots[c];
            if !chunk.is_deleted() {
                return Some(chunk.id);
            }
            cursor = chunk.next;
        }
        None
    }
}

/// Walks the chunk list in either direction.
pub struct Chunks<'a, T> {
    rga: &'a Rga<T>,
    cursor: Option<usize>,
    forward: bool,
}

impl<'a, T> Iterator for Chunks<'a, T> {
    type Item = &'a Chunk<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let rga = self.rga;
        let chunk = &rga.slots[self.cursor?];
        self.cursor = if self.forward { chunk.next } else { chunk.prev };
        Some(chunk)
    }
}
