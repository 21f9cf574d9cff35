//! Logical time.
//!
//! Every unit a replica creates is named by a [`Ts`], a `(session, time)`
//! pair. Ids compare by session first and time second (the field order of
//! the derived `Ord`), which gives every replica the same total order for
//! tie-breaks.
//!
//! Three clocks mint ids, all behind the [`Clock`] trait:
//! - [`LogicalClock`]: one session counting up.
//! - [`ClockVector`]: a logical clock that also tracks the latest time seen
//!   from each peer session.
//! - [`ServerClockVector`]: the single `SESSION::SERVER` counter of a
//!   server-sequenced document.

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use thiserror::Error;

use crate::json_crdt_patch::enums::SESSION;

/// Lower bound of [`random_session_id`]; ids below are reserved.
pub const MIN_SESSION_ID: u64 = 65_536;

/// `(session, time)` id of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ts {
    pub sid: u64,
    pub time: u64,
}

impl Ts {
    pub const fn new(sid: u64, time: u64) -> Self {
        Self { sid, time }
    }
}

impl fmt::Display for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print_ts(*self))
    }
}

/// `span` consecutive ids of one session starting at `(sid, time)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tss {
    pub sid: u64,
    pub time: u64,
    pub span: u64,
}

impl Tss {
    pub const fn new(sid: u64, time: u64, span: u64) -> Self {
        Self { sid, time, span }
    }

    pub fn ts(&self) -> Ts {
        Ts::new(self.sid, self.time)
    }

    /// Time just past the last covered id.
    pub fn end(&self) -> u64 {
        self.time + self.span
    }
}

impl fmt::Display for Tss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.ts(), self.span)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    #[error("server clock cannot observe session {0}")]
    InvalidServerSession(u64),
    #[error("observed time {observed} is ahead of server time {local}")]
    TimeTravel { observed: u64, local: u64 },
}

#[inline]
pub fn ts(sid: u64, time: u64) -> Ts {
    Ts::new(sid, time)
}

#[inline]
pub fn tss(sid: u64, time: u64, span: u64) -> Tss {
    Tss::new(sid, time, span)
}

/// `stamp` moved `cycles` ticks forward in its own session.
#[inline]
pub fn tick(stamp: Ts, cycles: u64) -> Ts {
    Ts::new(stamp.sid, stamp.time + cycles)
}

/// Whether range `[outer, outer + outer_span)` covers all of
/// `[inner, inner + inner_span)`.
pub fn contains(outer: Ts, outer_span: u64, inner: Ts, inner_span: u64) -> bool {
    outer.sid == inner.sid
        && inner.time >= outer.time
        && inner.time + inner_span <= outer.time + outer_span
}

pub fn contains_id(start: Ts, span: u64, id: Ts) -> bool {
    contains(start, span, id, 1)
}

/// The `span` ids starting `offset` ticks after `stamp`.
pub fn interval(stamp: Ts, offset: u64, span: u64) -> Tss {
    Tss::new(stamp.sid, stamp.time + offset, span)
}

/// Short form of an id for logs: `.time` for the server session, and only
/// the last four digits of long session ids (`..3456.7`).
pub fn print_ts(id: Ts) -> String {
    if id.sid == SESSION::SERVER {
        return format!(".{}", id.time);
    }
    let digits = id.sid.to_string();
    match digits.len().checked_sub(4) {
        Some(cut) if cut > 0 => format!("..{}.{}", &digits[cut..], id.time),
        _ => format!("{}.{}", digits, id.time),
    }
}

/// Session id drawn uniformly from `[MIN_SESSION_ID, SESSION::MAX]`.
pub fn random_session_id() -> u64 {
    rand::thread_rng().gen_range(MIN_SESSION_ID..=SESSION::MAX)
}

pub fn is_valid_session_id(sid: u64) -> bool {
    sid <= SESSION::MAX
}

// ── Clock trait ───────────────────────────────────────────────────────────

/// Source of fresh ids.
pub trait Clock {
    fn sid(&self) -> u64;

    /// Time the next minted id will carry.
    fn time(&self) -> u64;

    /// Returns the next id and reserves `cycles` ids starting at it.
    fn tick(&mut self, cycles: u64) -> Ts;

    fn now(&self) -> Ts {
        Ts::new(self.sid(), self.time())
    }
}

// ── LogicalClock ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalClock {
    pub sid: u64,
    pub time: u64,
}

impl LogicalClock {
    pub fn new(sid: u64, time: u64) -> Self {
        Self { sid, time }
    }
}

impl Clock for LogicalClock {
    fn sid(&self) -> u64 {
        self.sid
    }

    fn time(&self) -> u64 {
        self.time
    }

    fn tick(&mut self, cycles: u64) -> Ts {
        let id = Ts::new(self.sid, self.time);
        self.time += cycles;
        id
    }
}

// ── ClockVector ───────────────────────────────────────────────────────────

/// Local logical clock plus the highest time observed per peer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockVector {
    pub local: LogicalClock,
    pub peers: BTreeMap<u64, u64>,
}

impl ClockVector {
    pub fn new(sid: u64, time: u64) -> Self {
        Self {
            local: LogicalClock::new(sid, time),
            peers: BTreeMap::new(),
        }
    }

    /// Latest time observed from `sid`.
    pub fn peer(&self, sid: u64) -> Option<u64> {
        self.peers.get(&sid).copied()
    }

    /// Records ids `[id, id + span)` as seen. The local clock jumps past the
    /// last of them, so ids minted afterwards sort after everything observed
    /// within a session and never repeat an observed time.
    pub fn observe(&mut self, id: Ts, span: u64) {
        let last = id.time + span.saturating_sub(1);
        if id.sid != self.local.sid && id.sid != SESSION::SYSTEM {
            let seen = self.peers.entry(id.sid).or_insert(last);
            *seen = (*seen).max(last);
        }
        self.local.time = self.local.time.max(last + 1);
    }

    /// The same knowledge handed to session `sid`. The current session
    /// becomes a peer of the fork.
    pub fn fork(&self, sid: u64) -> ClockVector {
        let mut forked = ClockVector::new(sid, self.local.time);
        forked.peers = self.peers.clone();
        forked.peers.remove(&sid);
        if sid != self.local.sid && self.local.time > 0 {
            forked.observe(Ts::new(self.local.sid, self.local.time - 1), 1);
        }
        forked
    }
}

impl Clock for ClockVector {
    fn sid(&self) -> u64 {
        self.local.sid
    }

    fn time(&self) -> u64 {
        self.local.time
    }

    fn tick(&mut self, cycles: u64) -> Ts {
        self.local.tick(cycles)
    }
}

impl fmt::Display for ClockVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clock {}.{}", self.local.sid, self.local.time)?;
        let last = self.peers.len().saturating_sub(1);
        for (i, (sid, time)) in self.peers.iter().enumerate() {
            let branch = if i == last { "└─" } else { "├─" };
            write!(f, "\n{branch} {sid}.{time}")?;
        }
        Ok(())
    }
}

// ── ServerClockVector ─────────────────────────────────────────────────────

/// Counter of a server-sequenced document. Only `SESSION::SERVER` ids exist,
/// and the server hands them out in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerClockVector {
    pub time: u64,
}

impl ServerClockVector {
    pub fn new(time: u64) -> Self {
        Self { time }
    }

    /// Accepts server ids at or before the current time; system ids are
    /// ignored.
    pub fn observe(&mut self, id: Ts, span: u64) -> Result<(), ClockError> {
        match id.sid {
            SESSION::SYSTEM => Ok(()),
            SESSION::SERVER if id.time > self.time => Err(ClockError::TimeTravel {
                observed: id.time,
                local: self.time,
            }),
            SESSION::SERVER => {
                self.time = self.time.max(id.time + span);
                Ok(())
            }
            other => Err(ClockError::InvalidServerSession(other)),
        }
    }
}

impl Clock for ServerClockVector {
    fn sid(&self) -> u64 {
        SESSION::SERVER
    }

    fn time(&self) -> u64 {
        self.time
    }

    fn tick(&mut self, cycles: u64) -> Ts {
        let id = Ts::new(SESSION::SERVER, self.time);
        self.time += cycles;
        id
    }
}

impl fmt::Display for ServerClockVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clock .{}", self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_decides_before_time() {
        let mut ids = vec![ts(2, 1), ts(1, 9), ts(1, 3), ts(3, 0)];
        ids.sort();
        assert_eq!(ids, vec![ts(1, 3), ts(1, 9), ts(2, 1), ts(3, 0)]);
    }

    #[test]
    fn range_containment() {
        assert!(contains(ts(1, 5), 10, ts(1, 7), 3));
        assert!(contains(ts(1, 5), 10, ts(1, 12), 3));
        assert!(!contains(ts(1, 5), 10, ts(1, 13), 3));
        assert!(!contains(ts(1, 5), 10, ts(2, 7), 3));
        assert!(contains_id(ts(1, 5), 10, ts(1, 14)));
        assert!(!contains_id(ts(1, 5), 10, ts(1, 15)));
        assert!(!contains_id(ts(1, 5), 10, ts(1, 4)));
    }

    #[test]
    fn logical_clock_reserves_spans() {
        let mut clock = LogicalClock::new(42, 100);
        assert_eq!(clock.tick(1), ts(42, 100));
        assert_eq!(clock.tick(3), ts(42, 101));
        assert_eq!(clock.now(), ts(42, 104));
    }

    #[test]
    fn observing_peers_moves_local_time() {
        let mut cv = ClockVector::new(1_000, 0);
        cv.observe(ts(2_000, 5), 3);
        assert_eq!(cv.time(), 8);
        assert_eq!(cv.peer(2_000), Some(7));
        cv.observe(ts(2_000, 1), 1);
        assert_eq!(cv.peer(2_000), Some(7));
        cv.observe(ts(1_000, 20), 2);
        assert_eq!(cv.time(), 22);
        assert_eq!(cv.peer(1_000), None);
        cv.observe(ts(SESSION::SYSTEM, 1), 1);
        assert_eq!(cv.peers.len(), 1);
    }

    #[test]
    fn fork_turns_the_old_session_into_a_peer() {
        let mut cv = ClockVector::new(1_000, 10);
        cv.observe(ts(3_000, 4), 1);
        let forked = cv.fork(5_000);
        assert_eq!(forked.sid(), 5_000);
        assert_eq!(forked.time(), 10);
        assert_eq!(forked.peer(1_000), Some(9));
        assert_eq!(forked.peer(3_000), Some(4));

        let back = forked.fork(3_000);
        assert_eq!(back.peer(3_000), None);
        assert_eq!(back.peer(5_000), Some(9));
    }

    #[test]
    fn server_clock_only_follows_its_own_sequence() {
        let mut clock = ServerClockVector::new(5);
        assert_eq!(
            clock.observe(ts(77, 1), 1),
            Err(ClockError::InvalidServerSession(77))
        );
        assert_eq!(
            clock.observe(ts(SESSION::SERVER, 9), 1),
            Err(ClockError::TimeTravel { observed: 9, local: 5 })
        );
        clock.observe(ts(SESSION::SERVER, 5), 2).expect("observe must succeed");
        assert_eq!(clock.now(), ts(SESSION::SERVER, 7));
        assert_eq!(clock.tick(2), ts(SESSION::SERVER, 7));
        assert_eq!(clock.time, 9);
    }

    #[test]
    fn random_session_ids_are_in_range() {
        for _ in 0..64 {
            let sid = random_session_id();
            assert!(sid >= MIN_SESSION_ID);
            assert!(is_valid_session_id(sid));
        }
        assert!(!is_valid_session_id(SESSION::MAX + 1));
    }

    #[test]
    fn printed_forms() {
        assert_eq!(print_ts(ts(SESSION::SERVER, 42)), ".42");
        assert_eq!(print_ts(ts(123_456_789, 1)), "..6789.1");
        assert_eq!(print_ts(ts(1234, 5)), "1234.5");
        assert_eq!(tss(7, 3, 2).to_string(), "7.3!2");
        let mut cv = ClockVector::new(9, 4);
        cv.observe(ts(20, 1), 1);
        cv.observe(ts(10, 2), 1);
        assert_eq!(cv.to_string(), "clock 9.4\n├─ 10.2\n└─ 20.1");
    }

    #[test]
    fn offsets() {
        assert_eq!(interval(ts(1, 10), 5, 3), Tss::new(1, 15, 3));
        assert_eq!(tick(ts(4, 4), 2), ts(4, 6));
    }
}
