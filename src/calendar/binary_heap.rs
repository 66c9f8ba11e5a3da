//! Binary-heap calendar.
//!
//! `BinaryHeap` is a *max*-heap, so entries are wrapped in `Reverse` to
//! pop the smallest key first. This is the default strategy: O(log n)
//! insert and remove, O(1) peek, no pathological input orders.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::event::CalendarEntry;

use super::{CalendarKind, EventCalendar};

#[derive(Debug, Clone)]
pub struct HeapCalendar<T> {
    heap: BinaryHeap<Reverse<T>>,
}

impl<T: Ord> HeapCalendar<T> {
    pub fn new() -> Self {
        HeapCalendar {
            heap: BinaryHeap::new(),
        }
    }

    pub fn push(&mut self, item: T) {
        self.heap.push(Reverse(item));
    }

    pub fn peek(&self) -> Option<&T> {
        self.heap.peek().map(|Reverse(item)| item)
    }

    pub fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|Reverse(item)| item)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Entries in order. Heap storage is not sorted, so this sorts a
    /// vector of references.
    pub fn sorted_refs(&self) -> Vec<&T> {
        let mut refs: Vec<&T> = self.heap.iter().map(|Reverse(item)| item).collect();
        refs.sort_unstable();
        refs
    }
}

impl<T: Ord> Default for HeapCalendar<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> EventCalendar<P> for HeapCalendar<CalendarEntry<P>> {
    fn kind(&self) -> CalendarKind {
        CalendarKind::BinaryHeap
    }

    fn add(&mut self, entry: CalendarEntry<P>) {
        self.push(entry);
    }

    fn peek_next(&self) -> Option<&CalendarEntry<P>> {
        self.peek()
    }

    fn next_event(&mut self) -> Option<CalendarEntry<P>> {
        self.pop()
    }

    fn len(&self) -> usize {
        HeapCalendar::len(self)
    }

    fn clear(&mut self) {
        HeapCalendar::clear(self);
    }

    fn ordered(&self) -> Vec<&CalendarEntry<P>> {
        self.sorted_refs()
    }
}
