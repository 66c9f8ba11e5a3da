//! Balanced-tree calendar backed by a `BTreeSet`.
//!
//! Every entry has a distinct key under the event order, so a set is
//! enough. Costs O(log n) per operation and more memory per entry than
//! the heaps, in exchange for in-order iteration without sorting.

use std::collections::BTreeSet;

use crate::event::CalendarEntry;

use super::{CalendarKind, EventCalendar};

#[derive(Debug, Clone)]
pub struct TreeCalendar<T> {
    set: BTreeSet<T>,
}

impl<T: Ord> TreeCalendar<T> {
    pub fn new() -> Self {
        TreeCalendar {
            set: BTreeSet::new(),
        }
    }

    pub fn push(&mut self, item: T) {
        let inserted = self.set.insert(item);
        debug_assert!(inserted, "calendar entries must be unique under the event order");
    }

    pub fn peek(&self) -> Option<&T> {
        self.set.first()
    }

    pub fn pop(&mut self) -> Option<T> {
        self.set.pop_first()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn clear(&mut self) {
        self.set.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.set.iter()
    }
}

impl<T: Ord> Default for TreeCalendar<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> EventCalendar<P> for TreeCalendar<CalendarEntry<P>> {
    fn kind(&self) -> CalendarKind {
        CalendarKind::BalancedTree
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
        TreeCalendar::len(self)
    }

    fn clear(&mut self) {
        TreeCalendar::clear(self);
    }

    fn ordered(&self) -> Vec<&CalendarEntry<P>> {
        self.iter().collect()
    }
}
