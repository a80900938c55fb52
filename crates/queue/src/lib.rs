//! Mergeable min-priority queue with stable handles.
//!
//! A pairing heap over a generational arena: insert, find-min and
//! decrease-priority are O(1) (the latter amortised), extract-min is
//! O(log n) amortised. Lower priority values dequeue first; among equal
//! priorities, insertion order wins (FIFO).
//!
//! Handles are generational arena indices, so a handle whose element has
//! been extracted or removed is detected as stale instead of aliasing a
//! recycled slot.

use core::cmp::Ordering;

use thiserror::Error;
use thunderdome::{Arena, Index};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QueueError {
    /// The handle's element was already extracted or removed.
    #[error("stale queue handle: element no longer in the queue")]
    StaleHandle,

    /// `decrease_priority` was asked to raise a priority. Callers that need
    /// to deprioritise must remove and re-insert instead.
    #[error("cannot raise priority from {current} to {requested}")]
    PriorityIncrease { current: f64, requested: f64 },
}

/// Opaque reference to a queued element, valid only within the queue that
/// issued it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Handle(Index);

#[derive(Debug)]
struct Node<T> {
    priority: f64,
    seq: u64,
    value: T,
    parent: Option<Index>,
    first_child: Option<Index>,
    prev: Option<Index>,
    next: Option<Index>,
}

/// Min-priority queue keyed by `(priority, insertion sequence)`.
#[derive(Debug)]
pub struct PriorityQueue<T> {
    arena: Arena<Node<T>>,
    root: Option<Index>,
    next_seq: u64,
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PriorityQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
            next_seq: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Inserts a value. O(1).
    pub fn insert(&mut self, priority: f64, value: T) -> Handle {
        let seq = self.next_seq;
        self.next_seq += 1;

        let idx = self.arena.insert(Node {
            priority,
            seq,
            value,
            parent: None,
            first_child: None,
            prev: None,
            next: None,
        });

        self.root = Some(match self.root {
            None => idx,
            Some(root) => self.meld(root, idx),
        });

        Handle(idx)
    }

    /// Minimum element without removing it. O(1).
    #[must_use]
    pub fn find_min(&self) -> Option<&T> {
        self.root.map(|root| &self.arena[root].value)
    }

    /// Priority of the minimum element. O(1).
    #[must_use]
    pub fn min_priority(&self) -> Option<f64> {
        self.root.map(|root| self.arena[root].priority)
    }

    /// Removes and returns the minimum element. O(log n) amortised.
    pub fn extract_min(&mut self) -> Option<T> {
        let root = self.root?;

        let children = self.detach_children(root);
        self.root = self.merge_pairs(children);

        let node = self
            .arena
            .remove(root)
            .expect("root index is always live");
        Some(node.value)
    }

    /// Whether the handle still refers to a queued element.
    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        self.arena.get(handle.0).is_some()
    }

    /// Current priority of the element behind `handle`.
    pub fn priority(&self, handle: Handle) -> Result<f64, QueueError> {
        self.arena
            .get(handle.0)
            .map(|node| node.priority)
            .ok_or(QueueError::StaleHandle)
    }

    /// Lowers an element's priority. O(1) amortised.
    ///
    /// `new_priority` must not exceed the current one; raising a priority
    /// this way would silently violate the heap order, so it is rejected.
    pub fn decrease_priority(
        &mut self,
        handle: Handle,
        new_priority: f64,
    ) -> Result<(), QueueError> {
        let idx = handle.0;
        let node = self.arena.get_mut(idx).ok_or(QueueError::StaleHandle)?;

        if new_priority > node.priority {
            return Err(QueueError::PriorityIncrease {
                current: node.priority,
                requested: new_priority,
            });
        }

        node.priority = new_priority;

        let Some(parent) = node.parent else {
            // Already a root; lowering its key cannot break heap order.
            return Ok(());
        };

        if self.orders_before(idx, parent) {
            self.cut(idx);
            let root = self.root.expect("a parented node implies a root");
            self.root = Some(self.meld(root, idx));
        }

        Ok(())
    }

    /// Removes an arbitrary element by handle.
    ///
    /// Needed by callers that drop queued work out of band: assignment and
    /// cancellation both delete entries that are not the minimum.
    pub fn remove(&mut self, handle: Handle) -> Result<T, QueueError> {
        let idx = handle.0;

        if self.arena.get(idx).is_none() {
            return Err(QueueError::StaleHandle);
        }

        if self.root == Some(idx) {
            return self.extract_min().ok_or(QueueError::StaleHandle);
        }

        self.cut(idx);
        let children = self.detach_children(idx);
        if let Some(subtree) = self.merge_pairs(children) {
            let root = self.root.expect("non-root removal implies a root");
            self.root = Some(self.meld(root, subtree));
        }

        let node = self
            .arena
            .remove(idx)
            .expect("presence checked above");
        Ok(node.value)
    }

    /// Drains `other` into this queue.
    ///
    /// Relative FIFO order among `other`'s equal-priority elements is
    /// preserved; all of `other`'s handles are invalidated. The arena
    /// backing makes this O(n) melds rather than the pointer-heap O(1) -
    /// the price of generational staleness detection.
    pub fn merge(&mut self, other: Self) {
        let mut nodes: Vec<Node<T>> = other.arena.into_iter().map(|(_, node)| node).collect();
        nodes.sort_by_key(|node| node.seq);

        for node in nodes {
            let _handle = self.insert(node.priority, node.value);
        }
    }

    /// `(priority, seq)` ordering; total because of `f64::total_cmp`.
    fn orders_before(&self, a: Index, b: Index) -> bool {
        let (na, nb) = (&self.arena[a], &self.arena[b]);

        match na.priority.total_cmp(&nb.priority) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => na.seq < nb.seq,
        }
    }

    /// Melds two detached trees; returns the winning root.
    fn meld(&mut self, a: Index, b: Index) -> Index {
        let (winner, loser) = if self.orders_before(b, a) {
            (b, a)
        } else {
            (a, b)
        };

        let old_first = self.arena[winner].first_child;

        {
            let node = &mut self.arena[loser];
            node.parent = Some(winner);
            node.prev = None;
            node.next = old_first;
        }
        if let Some(first) = old_first {
            self.arena[first].prev = Some(loser);
        }
        self.arena[winner].first_child = Some(loser);

        winner
    }

    /// Unlinks a node from its parent and siblings, leaving it a detached
    /// tree (children stay attached).
    fn cut(&mut self, idx: Index) {
        let (parent, prev, next) = {
            let node = &self.arena[idx];
            (node.parent, node.prev, node.next)
        };

        if let Some(prev) = prev {
            self.arena[prev].next = next;
        } else if let Some(parent) = parent {
            self.arena[parent].first_child = next;
        }
        if let Some(next) = next {
            self.arena[next].prev = prev;
        }

        let node = &mut self.arena[idx];
        node.parent = None;
        node.prev = None;
        node.next = None;
    }

    /// Detaches and returns a node's children, left to right.
    fn detach_children(&mut self, idx: Index) -> Vec<Index> {
        let mut children = Vec::new();
        let mut cursor = self.arena[idx].first_child;
        self.arena[idx].first_child = None;

        while let Some(child) = cursor {
            cursor = self.arena[child].next;

            let node = &mut self.arena[child];
            node.parent = None;
            node.prev = None;
            node.next = None;

            children.push(child);
        }

        children
    }

    /// Standard two-pass pairing: meld adjacent pairs left to right, then
    /// fold the pair roots right to left.
    fn merge_pairs(&mut self, children: Vec<Index>) -> Option<Index> {
        let mut pairs = Vec::with_capacity(children.len().div_ceil(2));
        let mut iter = children.into_iter();

        while let Some(first) = iter.next() {
            match iter.next() {
                Some(second) => pairs.push(self.meld(first, second)),
                None => pairs.push(first),
            }
        }

        let mut merged: Option<Index> = None;
        while let Some(tree) = pairs.pop() {
            merged = Some(match merged {
                None => tree,
                Some(acc) => self.meld(tree, acc),
            });
        }

        merged
    }
}

#[cfg(test)]
mod tests;
