//! Event calendars: the ordered set of pending events.
//!
//! Four interchangeable strategies implement [`EventCalendar`]. They
//! differ only in cost profile; given the same insertions they produce
//! the same removal sequence, because the only ordering any of them
//! consults is `Ord` on [`CalendarEntry`].
//!
//! # Module structure
//!
//! | Sub-module | Strategy | insert | remove-min |
//! |---|---|---|---|
//! | [`sorted`] | [`SortedCalendar`], tail-scanned sorted sequence | O(n), O(1) for appends | O(1) |
//! | [`binary_heap`] | [`HeapCalendar`], array-backed binary heap | O(log n) | O(log n) |
//! | [`skew_heap`] | [`SkewHeapCalendar`], self-adjusting merge heap | amortized O(log n) | amortized O(log n) |
//! | [`tree`] | [`TreeCalendar`], balanced ordered set | O(log n) | O(log n) |
//!
//! The strategy structs are generic over any `T: Ord`; the
//! `EventCalendar` impls pin `T` to `CalendarEntry<P>`.

pub mod binary_heap;
pub mod skew_heap;
pub mod sorted;
pub mod tree;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KairosError;
use crate::event::{CalendarEntry, Event};

pub use binary_heap::HeapCalendar;
pub use skew_heap::SkewHeapCalendar;
pub use sorted::SortedCalendar;
pub use tree::TreeCalendar;

// ── Trait ─────────────────────────────────────────────────────────────

/// Ordered container of pending events.
///
/// Owned by exactly one `Executive`; model code never touches it
/// directly. `peek_next` always returns the minimum entry under the
/// event order, or `None` when empty.
pub trait EventCalendar<P> {
    /// Which strategy this is.
    fn kind(&self) -> CalendarKind;

    /// Insert an entry.
    fn add(&mut self, entry: CalendarEntry<P>);

    /// The minimum entry, without removing it.
    fn peek_next(&self) -> Option<&CalendarEntry<P>>;

    /// Remove and return the minimum entry.
    fn next_event(&mut self) -> Option<CalendarEntry<P>>;

    /// Number of entries, including canceled and superseded ones not yet
    /// reached.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    fn clear(&mut self);

    /// Mark `event` canceled. The structure is left untouched; removal
    /// happens lazily when the entry reaches the front.
    fn cancel(&mut self, event: &Event<P>) {
        event.cancel();
    }

    /// All entries in dispatch order, for diagnostics.
    fn ordered(&self) -> Vec<&CalendarEntry<P>>;
}

// ── Strategy selection ────────────────────────────────────────────────

/// Calendar strategy, selected when an executive is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalendarKind {
    SortedList,
    #[default]
    BinaryHeap,
    SkewHeap,
    BalancedTree,
}

impl CalendarKind {
    /// Every strategy, in declaration order.
    pub const ALL: [CalendarKind; 4] = [
        CalendarKind::SortedList,
        CalendarKind::BinaryHeap,
        CalendarKind::SkewHeap,
        CalendarKind::BalancedTree,
    ];

    /// Construct an empty calendar of this kind.
    pub fn build<P: 'static>(self) -> Box<dyn EventCalendar<P>> {
        match self {
            CalendarKind::SortedList => Box::new(SortedCalendar::new()),
            CalendarKind::BinaryHeap => Box::new(HeapCalendar::new()),
            CalendarKind::SkewHeap => Box::new(SkewHeapCalendar::new()),
            CalendarKind::BalancedTree => Box::new(TreeCalendar::new()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CalendarKind::SortedList => "sorted-list",
            CalendarKind::BinaryHeap => "binary-heap",
            CalendarKind::SkewHeap => "skew-heap",
            CalendarKind::BalancedTree => "balanced-tree",
        }
    }
}

impl fmt::Display for CalendarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalendarKind {
    type Err = KairosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        CalendarKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                KairosError::InvalidConfig(format!(
                    "unknown calendar '{s}', expected one of: sorted-list, binary-heap, skew-heap, balanced-tree"
                ))
            })
    }
}
