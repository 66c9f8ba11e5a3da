//! Dispatch trace recording and comparison.
//!
//! [`TraceRecorder`] is an observer that appends one [`TraceEntry`] per
//! dispatched event. Two runs of the same model are equivalent when their
//! traces hash the same, which is how calendar strategies are checked
//! against each other.

use std::io::Write;

use serde::Serialize;
use tracing::trace;

use crate::error::KairosResult;
use crate::event::{Event, EventId, Priority};
use crate::executive::ReplicationSummary;
use crate::observer::{ExecutiveObserver, Notification};
use crate::time::SimTime;

// ── Hash utility ──────────────────────────────────────────────────────

/// Combine two u64 hashes deterministically.
pub fn hash_combine(a: u64, b: u64) -> u64 {
    let mut h = a;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h = h.wrapping_add(b);
    h ^= h >> 32;
    h
}

/// FNV-1a over a byte slice.
pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in data {
        h ^= u64::from(b);
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

// ── TraceEntry ────────────────────────────────────────────────────────

/// A record of one dispatched event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub replication: u64,
    /// Simulated time at which the event ran.
    pub time: SimTime,
    pub event_id: EventId,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TraceEntry {
    pub fn of<P>(event: &Event<P>) -> Self {
        TraceEntry {
            replication: event.replication(),
            time: event.time(),
            event_id: event.id(),
            priority: event.priority(),
            name: event.name().map(str::to_owned),
        }
    }

    /// Folds everything but the replication number into `h`.
    fn hash_into(&self, h: u64) -> u64 {
        let mut h = hash_combine(h, self.time.value().to_bits());
        h = hash_combine(h, self.event_id.raw());
        h = hash_combine(h, u64::from(self.priority.value().unsigned_abs()));
        match &self.name {
            Some(name) => hash_combine(h, hash_bytes(name.as_bytes())),
            None => h,
        }
    }
}

impl std::fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[R{} {} {} {}] {}",
            self.replication,
            self.time,
            self.event_id,
            self.priority,
            self.name.as_deref().unwrap_or("-"),
        )
    }
}

// ── TraceRecorder ─────────────────────────────────────────────────────

/// Observer that records every dispatch and every replication summary.
#[derive(Debug, Clone, Default)]
pub struct TraceRecorder {
    entries: Vec<TraceEntry>,
    summaries: Vec<ReplicationSummary>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Entries of one replication, in dispatch order.
    pub fn replication(&self, replication: u64) -> impl Iterator<Item = &TraceEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.replication == replication)
    }

    pub fn summaries(&self) -> &[ReplicationSummary] {
        &self.summaries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.summaries.clear();
    }

    /// Deterministic hash of the whole trace.
    pub fn trace_hash(&self) -> u64 {
        self.entries
            .iter()
            .fold(0, |h, entry| entry.hash_into(hash_combine(h, entry.replication)))
    }

    /// Hash of a single replication's entries. Identical replications
    /// hash the same regardless of their number.
    pub fn replication_hash(&self, replication: u64) -> u64 {
        self.replication(replication).fold(0, |h, entry| entry.hash_into(h))
    }

    /// Write the trace as JSON lines, one entry per line.
    pub fn export<W: Write>(&self, w: &mut W) -> KairosResult<()> {
        for entry in &self.entries {
            serde_json::to_writer(&mut *w, entry)?;
            writeln!(w)?;
        }
        Ok(())
    }
}

impl<P> ExecutiveObserver<P> for TraceRecorder {
    fn after_event(&mut self, _ctx: &mut Notification<'_, P>, event: &Event<P>) -> KairosResult<()> {
        let entry = TraceEntry::of(event);
        trace!(%entry, "Recorded");
        self.entries.push(entry);
        Ok(())
    }

    fn on_replication_end(
        &mut self,
        _ctx: &mut Notification<'_, P>,
        summary: &ReplicationSummary,
    ) -> KairosResult<()> {
        self.summaries.push(summary.clone());
        Ok(())
    }
}

/// Compare two traces entry by entry.
pub fn traces_match(a: &TraceRecorder, b: &TraceRecorder) -> bool {
    a.entries == b.entries
}
