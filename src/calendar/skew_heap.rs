//! Skew-heap calendar.
//!
//! A self-adjusting binary tree in the leftist-heap family. Merge is the
//! only primitive: insert merges a singleton tree into the root, and
//! remove-min merges the root's two children. No balance information is
//! stored; the child swap after every merge step is what keeps the tree
//! from degenerating, giving amortized O(log n) per operation.
//!
//! The merge walks the right spines iteratively and relinks on the way
//! back up, and teardown is iterative too, so a deep tree cannot
//! overflow the call stack.

use std::mem;

use crate::event::CalendarEntry;

use super::{CalendarKind, EventCalendar};

type Link<T> = Option<Box<Node<T>>>;

#[derive(Debug)]
struct Node<T> {
    item: T,
    left: Link<T>,
    right: Link<T>,
}

#[derive(Debug)]
pub struct SkewHeapCalendar<T> {
    root: Link<T>,
    len: usize,
}

impl<T: Ord> SkewHeapCalendar<T> {
    pub fn new() -> Self {
        SkewHeapCalendar { root: None, len: 0 }
    }

    pub fn push(&mut self, item: T) {
        let singleton = Box::new(Node {
            item,
            left: None,
            right: None,
        });
        let root = self.root.take();
        self.root = merge(root, Some(singleton));
        self.len += 1;
    }

    pub fn peek(&self) -> Option<&T> {
        self.root.as_ref().map(|node| &node.item)
    }

    pub fn pop(&mut self) -> Option<T> {
        let mut root = self.root.take()?;
        self.root = merge(root.left.take(), root.right.take());
        self.len -= 1;
        Some(root.item)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        let mut stack: Vec<Box<Node<T>>> = self.root.take().into_iter().collect();
        while let Some(mut node) = stack.pop() {
            stack.extend(node.left.take());
            stack.extend(node.right.take());
        }
        self.len = 0;
    }

    /// Entries in order, gathered by a full traversal and sorted.
    pub fn sorted_refs(&self) -> Vec<&T> {
        let mut refs = Vec::with_capacity(self.len);
        let mut stack: Vec<&Node<T>> = self.root.as_deref().into_iter().collect();
        while let Some(node) = stack.pop() {
            refs.push(&node.item);
            stack.extend(node.left.as_deref());
            stack.extend(node.right.as_deref());
        }
        refs.sort_unstable();
        refs
    }
}

/// Merge two skew heaps.
///
/// Recursive definition: the root with the smaller item wins; its right
/// subtree is merged with the other heap, then its children are swapped.
/// Here the descent pushes each winning root onto `spine` and the ascent
/// attaches the merged result as its right child before swapping.
fn merge<T: Ord>(a: Link<T>, b: Link<T>) -> Link<T> {
    let mut spine: Vec<Box<Node<T>>> = Vec::new();
    let (mut a, mut b) = (a, b);

    let mut merged = loop {
        match (a.take(), b.take()) {
            (None, rest) | (rest, None) => break rest,
            (Some(mut x), Some(mut y)) => {
                if y.item < x.item {
                    mem::swap(&mut x, &mut y);
                }
                a = x.right.take();
                b = Some(y);
                spine.push(x);
            }
        }
    };

    while let Some(mut node) = spine.pop() {
        node.right = merged;
        mem::swap(&mut node.left, &mut node.right);
        merged = Some(node);
    }
    merged
}

impl<T: Ord> Default for SkewHeapCalendar<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for SkewHeapCalendar<T> {
    fn drop(&mut self) {
        let mut stack: Vec<Box<Node<T>>> = self.root.take().into_iter().collect();
        while let Some(mut node) = stack.pop() {
            stack.extend(node.left.take());
            stack.extend(node.right.take());
        }
    }
}

impl<P> EventCalendar<P> for SkewHeapCalendar<CalendarEntry<P>> {
    fn kind(&self) -> CalendarKind {
        CalendarKind::SkewHeap
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
        SkewHeapCalendar::len(self)
    }

    fn clear(&mut self) {
        SkewHeapCalendar::clear(self);
    }

    fn ordered(&self) -> Vec<&CalendarEntry<P>> {
        self.sorted_refs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(cal: &mut SkewHeapCalendar<u32>) -> Vec<u32> {
        std::iter::from_fn(|| cal.pop()).collect()
    }

    #[test]
    fn test_pops_in_order() {
        let mut cal = SkewHeapCalendar::new();
        for v in [7, 3, 9, 1, 4, 8, 2] {
            cal.push(v);
        }
        assert_eq!(cal.len(), 7);
        assert_eq!(cal.peek(), Some(&1));
        assert_eq!(drain(&mut cal), vec![1, 2, 3, 4, 7, 8, 9]);
        assert!(cal.is_empty());
    }

    #[test]
    fn test_merge_keeps_min_at_root() {
        let a = Some(Box::new(Node { item: 5, left: None, right: None }));
        let b = Some(Box::new(Node { item: 2, left: None, right: None }));
        let merged = merge(a, b).unwrap();
        assert_eq!(merged.item, 2);
        // The loser was attached on the right, then swapped to the left.
        assert_eq!(merged.left.as_ref().map(|n| n.item), Some(5));
        assert!(merged.right.is_none());
    }

    #[test]
    fn test_sequential_inserts_do_not_recurse() {
        // Ascending then descending runs are the classic worst cases.
        let mut cal = SkewHeapCalendar::new();
        for v in 0..100_000u32 {
            cal.push(v);
        }
        for v in (100_000..200_000u32).rev() {
            cal.push(v);
        }
        assert_eq!(cal.pop(), Some(0));
        assert_eq!(cal.pop(), Some(1));
        assert_eq!(cal.len(), 199_998);
        cal.clear();
        assert!(cal.peek().is_none());
    }

    #[test]
    fn test_sorted_refs_matches_drain() {
        let mut cal = SkewHeapCalendar::new();
        for v in [12, 5, 19, 5, 3] {
            cal.push(v);
        }
        let refs: Vec<u32> = cal.sorted_refs().into_iter().copied().collect();
        assert_eq!(refs, drain(&mut cal));
    }
}
