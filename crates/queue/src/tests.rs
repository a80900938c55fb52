//! Unit tests for the priority queue.
//!
//! Tests cover:
//! - Extraction order and FIFO tie-breaking
//! - Decrease-priority semantics
//! - Handle staleness
//! - Arbitrary removal
//! - Merging
//! - Randomised heap-order stress

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;

fn drain<T>(queue: &mut PriorityQueue<T>) -> Vec<T> {
    let mut out = Vec::with_capacity(queue.len());
    while let Some(value) = queue.extract_min() {
        out.push(value);
    }
    out
}

// ============================================================
// Ordering
// ============================================================

#[test]
fn extracts_in_priority_order() {
    let mut queue = PriorityQueue::new();

    let _w5 = queue.insert(5.0, "w5");
    let _w1 = queue.insert(1.0, "w1");
    let _w3 = queue.insert(3.0, "w3");
    let _w7 = queue.insert(7.0, "w7");

    assert_eq!(queue.len(), 4);
    assert_eq!(drain(&mut queue), vec!["w1", "w3", "w5", "w7"]);
    assert!(queue.is_empty());
}

#[test]
fn equal_priorities_dequeue_fifo() {
    let mut queue = PriorityQueue::new();

    let _a = queue.insert(2.0, "a");
    let _b = queue.insert(2.0, "b");
    let _c = queue.insert(1.0, "c");
    let _d = queue.insert(2.0, "d");

    assert_eq!(drain(&mut queue), vec!["c", "a", "b", "d"]);
}

#[test]
fn find_min_does_not_remove() {
    let mut queue = PriorityQueue::new();

    assert!(queue.find_min().is_none());

    let _x = queue.insert(4.0, "x");
    let _y = queue.insert(2.0, "y");

    assert_eq!(queue.find_min(), Some(&"y"));
    assert_eq!(queue.find_min(), Some(&"y"));
    assert_eq!(queue.min_priority(), Some(2.0));
    assert_eq!(queue.len(), 2);
}

#[test]
fn extract_on_empty_returns_none() {
    let mut queue: PriorityQueue<&str> = PriorityQueue::new();

    assert!(queue.extract_min().is_none());
}

// ============================================================
// Decrease-priority
// ============================================================

#[test]
fn decrease_moves_element_to_front() {
    let mut queue = PriorityQueue::new();

    let _a = queue.insert(3.0, "a");
    let b = queue.insert(5.0, "b");
    let _c = queue.insert(4.0, "c");

    queue.decrease_priority(b, 1.0).unwrap();

    assert_eq!(queue.find_min(), Some(&"b"));
    assert_eq!(drain(&mut queue), vec!["b", "a", "c"]);
}

#[test]
fn decrease_to_equal_priority_is_allowed() {
    let mut queue = PriorityQueue::new();

    let a = queue.insert(3.0, "a");

    queue.decrease_priority(a, 3.0).unwrap();

    assert_eq!(queue.priority(a).unwrap(), 3.0);
}

#[test]
fn decrease_rejects_priority_increase() {
    let mut queue = PriorityQueue::new();

    let a = queue.insert(3.0, "a");

    let result = queue.decrease_priority(a, 9.0);

    assert!(matches!(
        result,
        Err(QueueError::PriorityIncrease {
            current,
            requested,
        }) if current == 3.0 && requested == 9.0
    ));
    // The element is untouched.
    assert_eq!(queue.priority(a).unwrap(), 3.0);
    assert_eq!(queue.extract_min(), Some("a"));
}

#[test]
fn decrease_deep_in_heap_restores_order() {
    let mut queue = PriorityQueue::new();

    let mut handles = Vec::new();
    for i in 0..32 {
        handles.push(queue.insert(f64::from(i), i));
    }
    // Force some structure.
    assert_eq!(queue.extract_min(), Some(0));

    queue.decrease_priority(handles[20], 0.5).unwrap();

    assert_eq!(queue.extract_min(), Some(20));
    assert_eq!(queue.extract_min(), Some(1));
}

// ============================================================
// Handle staleness
// ============================================================

#[test]
fn extracted_handle_goes_stale() {
    let mut queue = PriorityQueue::new();

    let a = queue.insert(1.0, "a");
    let b = queue.insert(2.0, "b");

    assert_eq!(queue.extract_min(), Some("a"));

    assert!(!queue.contains(a));
    assert!(matches!(
        queue.decrease_priority(a, 0.5),
        Err(QueueError::StaleHandle)
    ));
    assert!(matches!(queue.priority(a), Err(QueueError::StaleHandle)));

    // Surviving handles remain valid.
    assert!(queue.contains(b));
    queue.decrease_priority(b, 0.5).unwrap();
}

#[test]
fn stale_handle_is_not_resurrected_by_reuse() {
    let mut queue = PriorityQueue::new();

    let a = queue.insert(1.0, "a");
    assert_eq!(queue.extract_min(), Some("a"));

    // New insertions may recycle the arena slot; the old generation must
    // still read as stale.
    let _b = queue.insert(1.0, "b");
    let _c = queue.insert(2.0, "c");

    assert!(!queue.contains(a));
    assert!(matches!(queue.remove(a), Err(QueueError::StaleHandle)));
}

// ============================================================
// Removal
// ============================================================

#[test]
fn remove_takes_out_arbitrary_elements() {
    let mut queue = PriorityQueue::new();

    let _a = queue.insert(1.0, "a");
    let b = queue.insert(2.0, "b");
    let _c = queue.insert(3.0, "c");
    let _d = queue.insert(4.0, "d");

    assert_eq!(queue.remove(b).unwrap(), "b");
    assert_eq!(queue.len(), 3);
    assert_eq!(drain(&mut queue), vec!["a", "c", "d"]);
}

#[test]
fn remove_of_minimum_behaves_like_extract() {
    let mut queue = PriorityQueue::new();

    let a = queue.insert(1.0, "a");
    let _b = queue.insert(2.0, "b");

    assert_eq!(queue.remove(a).unwrap(), "a");
    assert_eq!(queue.find_min(), Some(&"b"));
}

#[test]
fn remove_keeps_children_queued() {
    let mut queue = PriorityQueue::new();

    let mut handles = Vec::new();
    for i in 0..16 {
        handles.push(queue.insert(f64::from(i), i));
    }
    // Build tree structure, then delete an interior element.
    assert_eq!(queue.extract_min(), Some(0));
    assert_eq!(queue.remove(handles[3]).unwrap(), 3);

    let rest = drain(&mut queue);
    let expected: Vec<i32> = (1..16).filter(|&i| i != 3).collect();
    assert_eq!(rest, expected);
}

// ============================================================
// Merge
// ============================================================

#[test]
fn merge_combines_queues_in_order() {
    let mut ours = PriorityQueue::new();
    let mut theirs = PriorityQueue::new();

    let _a = ours.insert(1.0, "a");
    let _c = ours.insert(3.0, "c");
    let _b = theirs.insert(2.0, "b");
    let _d = theirs.insert(4.0, "d");

    ours.merge(theirs);

    assert_eq!(ours.len(), 4);
    assert_eq!(drain(&mut ours), vec!["a", "b", "c", "d"]);
}

#[test]
fn merge_preserves_fifo_within_source() {
    let mut ours = PriorityQueue::new();
    let mut theirs = PriorityQueue::new();

    let _x = theirs.insert(2.0, "x");
    let _y = theirs.insert(2.0, "y");
    let _z = theirs.insert(2.0, "z");

    ours.merge(theirs);

    assert_eq!(drain(&mut ours), vec!["x", "y", "z"]);
}

#[test]
fn merge_with_empty_is_noop() {
    let mut ours = PriorityQueue::new();
    let _a = ours.insert(1.0, "a");

    ours.merge(PriorityQueue::new());

    assert_eq!(ours.len(), 1);
}

// ============================================================
// Stress
// ============================================================

#[test]
fn random_operations_keep_heap_order() {
    let mut rng = StdRng::seed_from_u64(0x6d65_7368);
    let mut queue = PriorityQueue::new();
    let mut live = Vec::new();
    let mut removed = 0;

    for i in 0..500 {
        let priority = rng.gen_range(0.0..1000.0);
        live.push(queue.insert(priority, i));

        // Occasionally decrease a random live element.
        if i % 7 == 0 {
            let pick = live[rng.gen_range(0..live.len())];
            if let Ok(current) = queue.priority(pick) {
                queue.decrease_priority(pick, current / 2.0).unwrap();
            }
        }

        // Occasionally remove a random live element.
        if i % 11 == 0 {
            let pick = live.swap_remove(rng.gen_range(0..live.len()));
            if queue.contains(pick) {
                let _value = queue.remove(pick).unwrap();
                removed += 1;
            }
        }
    }

    let mut previous = f64::NEG_INFINITY;
    let mut count = 0;
    while let Some(priority) = queue.min_priority() {
        assert!(priority >= previous, "extraction order must be non-decreasing");
        previous = priority;
        let _value = queue.extract_min();
        count += 1;
    }

    assert_eq!(count, 500 - removed);
    assert!(queue.is_empty());
}
