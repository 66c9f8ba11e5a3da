//! Sorted-sequence calendar.
//!
//! Keeps entries in ascending order in a `VecDeque`. Simulated time only
//! moves forward and most events are scheduled "soon", so a new entry
//! usually belongs at or near the tail: insertion scans backwards from the
//! tail and stops at the first entry not greater than the new one.

use std::collections::VecDeque;

use crate::event::CalendarEntry;

use super::{CalendarKind, EventCalendar};

#[derive(Debug, Clone)]
pub struct SortedCalendar<T> {
    items: VecDeque<T>,
}

impl<T: Ord> SortedCalendar<T> {
    pub fn new() -> Self {
        SortedCalendar {
            items: VecDeque::new(),
        }
    }

    /// Insert `item`, keeping the sequence sorted. Worst case O(n).
    pub fn push(&mut self, item: T) {
        let mut idx = self.items.len();
        while idx > 0 && self.items[idx - 1] > item {
            idx -= 1;
        }
        self.items.insert(idx, item);
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Entries in order; the storage already is.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Ord> Default for SortedCalendar<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> EventCalendar<P> for SortedCalendar<CalendarEntry<P>> {
    fn kind(&self) -> CalendarKind {
        CalendarKind::SortedList
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
        SortedCalendar::len(self)
    }

    fn clear(&mut self) {
        SortedCalendar::clear(self);
    }

    fn ordered(&self) -> Vec<&CalendarEntry<P>> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_fast_path() {
        let mut cal = SortedCalendar::new();
        for i in 0..5 {
            cal.push(i);
        }
        assert_eq!(cal.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_insert_in_middle_and_front() {
        let mut cal = SortedCalendar::new();
        cal.push(10);
        cal.push(30);
        cal.push(20);
        cal.push(5);
        assert_eq!(cal.iter().copied().collect::<Vec<_>>(), vec![5, 10, 20, 30]);
        assert_eq!(cal.pop(), Some(5));
        assert_eq!(cal.peek(), Some(&10));
    }

    #[test]
    fn test_empty() {
        let mut cal: SortedCalendar<u32> = SortedCalendar::default();
        assert!(cal.is_empty());
        assert!(cal.pop().is_none());
        cal.push(1);
        cal.clear();
        assert_eq!(cal.len(), 0);
    }
}
