//! Due-time priority queue

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tokio::time::Instant;

/// What happens when an entry comes due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueKind {
    /// Poll the symbol
    Tick,
    /// Lift an automatic pause
    AutoResume,
}

/// A scheduled action for one symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueEntry {
    pub at: Instant,
    pub symbol: String,
    /// Generation of the symbol when this entry was scheduled
    pub generation: u64,
    pub kind: DueKind,
    seq: u64,
}

impl Ord for DueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for DueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of due entries, earliest first; ties pop in insertion order
///
/// Entries are never removed early. Cancelling a symbol bumps its generation
/// and the stale entry is skipped when it pops.
#[derive(Debug, Default)]
pub struct DueQueue {
    heap: BinaryHeap<Reverse<DueEntry>>,
    seq: u64,
}

impl DueQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, at: Instant, symbol: &str, generation: u64, kind: DueKind) {
        self.seq += 1;
        self.heap.push(Reverse(DueEntry {
            at,
            symbol: symbol.to_string(),
            generation,
            kind,
            seq: self.seq,
        }));
    }

    /// Earliest deadline, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(entry)| entry.at)
    }

    /// Pop the earliest entry if it is due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<DueEntry> {
        match self.heap.peek() {
            Some(Reverse(entry)) if entry.at <= now => self.heap.pop().map(|Reverse(e)| e),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
