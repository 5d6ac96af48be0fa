// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! BTreeSet Tests
//!
//! Covers ordered and reverse-ordered bulk insertion, erase-to-empty,
//! hinted insertion through Extend, bound lookups, iteration symmetry and
//! custom comparators.

use compact_btree::{BTreeSet, KeyCompare, OrdCompareTo};

/// Upper bound on tree height for `len` values: the worst case packs only
/// half a node per level.
fn height_bound(capacity: usize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let min = (capacity / 2).max(2) as f64;
    ((len + 1) as f64).log(min).ceil() as usize + 1
}

/// Test ascending bulk insert: structure, bounds and iteration order
#[test]
fn test_insert_ascending() {
    let mut set: BTreeSet<i32> = BTreeSet::new();
    for k in 1..=1000 {
        assert!(set.insert(k));
    }

    assert_eq!(set.len(), 1000);
    set.verify();

    assert_eq!(set.iter().next(), Some(&1));
    assert_eq!(set.iter().next_back(), Some(&1000));

    let capacity = BTreeSet::<i32>::node_capacity();
    assert!(set.height() >= 2);
    assert!(set.height() <= height_bound(capacity, 1000));

    // Ascending inserts hit the biased split, so leaves stay dense.
    let fullness = set.fullness();
    assert!(
        (0.5..=1.0).contains(&fullness),
        "fullness {fullness} outside [0.5, 1.0]"
    );
}

/// Test descending bulk insert yields the same sorted content
#[test]
fn test_insert_descending() {
    let mut set: BTreeSet<i32> = BTreeSet::new();
    for k in (1..=1000).rev() {
        assert!(set.insert(k));
    }

    assert_eq!(set.len(), 1000);
    set.verify();

    let collected: Vec<i32> = set.iter().copied().collect();
    let expected: Vec<i32> = (1..=1000).collect();
    assert_eq!(collected, expected);

    let capacity = BTreeSet::<i32>::node_capacity();
    assert!(set.height() <= height_bound(capacity, 1000));
}

/// Test erasing every key in insertion order, verifying after each erase
#[test]
fn test_erase_in_insertion_order() {
    let mut set: BTreeSet<i32> = BTreeSet::new();
    for k in 1..=100 {
        set.insert(k);
    }
    set.verify();

    for k in 1..=100 {
        assert!(set.remove(&k), "missing {k}");
        set.verify();
        assert_eq!(set.len() as i32, 100 - k);
    }

    assert!(set.is_empty());
    assert_eq!(set.height(), 0);
    assert_eq!(set.nodes(), 0);
}

/// Test round-trip: find after insert, end after erase
#[test]
fn test_find_roundtrip() {
    let mut set: BTreeSet<i64> = BTreeSet::new();
    for k in [42, 17, 99, 3] {
        set.insert(k);
    }

    assert_eq!(set.get(&17), Some(&17));
    assert!(set.contains(&42));
    assert!(!set.contains(&18));

    assert!(set.remove(&17));
    assert_eq!(set.get(&17), None);
    assert!(!set.remove(&17));
    assert_eq!(set.len(), 3);
}

/// Test hinted insertion through Extend over sorted input
#[test]
fn test_extend_sorted_input() {
    let mut set: BTreeSet<i32> = BTreeSet::new();
    set.extend((1..=100).map(|k| k * 10));

    assert_eq!(set.len(), 100);
    set.verify();

    let collected: Vec<i32> = set.iter().copied().collect();
    let expected: Vec<i32> = (1..=100).map(|k| k * 10).collect();
    assert_eq!(collected, expected);

    // A second extend with the same keys inserts nothing.
    set.extend((1..=100).map(|k| k * 10));
    assert_eq!(set.len(), 100);
    set.verify();
}

/// Test that the hint path and the plain path build equivalent trees
#[test]
fn test_extend_matches_insert() {
    let mut hinted: BTreeSet<i32> = BTreeSet::new();
    hinted.extend(1..=1000);

    let mut plain: BTreeSet<i32> = BTreeSet::new();
    for k in 1..=1000 {
        plain.insert(k);
    }

    assert_eq!(hinted.len(), plain.len());
    assert_eq!(hinted.height(), plain.height());
    assert!(hinted.iter().eq(plain.iter()));
    hinted.verify();
}

/// Test unsorted extend falls back to the full locate path
#[test]
fn test_extend_unsorted_input() {
    let mut set: BTreeSet<i32> = BTreeSet::new();
    set.extend([5, 1, 9, 3, 7, 2, 8, 4, 6, 0]);
    assert_eq!(set.len(), 10);
    set.verify();
    let collected: Vec<i32> = set.iter().copied().collect();
    assert_eq!(collected, (0..=9).collect::<Vec<i32>>());
}

/// Test lower_bound and upper_bound lookups
#[test]
fn test_bounds() {
    let set: BTreeSet<i32> = (0..100).step_by(10).collect();

    assert_eq!(set.lower_bound(&35), Some(&40));
    assert_eq!(set.lower_bound(&40), Some(&40));
    assert_eq!(set.upper_bound(&40), Some(&50));
    assert_eq!(set.lower_bound(&0), Some(&0));
    assert_eq!(set.lower_bound(&91), None);
    assert_eq!(set.upper_bound(&90), None);
}

/// Test iteration from both ends meets in the middle
#[test]
fn test_double_ended_iteration() {
    let set: BTreeSet<i32> = (0..500).collect();

    let forward: Vec<i32> = set.iter().copied().collect();
    let mut backward: Vec<i32> = set.iter().rev().copied().collect();
    backward.reverse();
    assert_eq!(forward, backward);

    let mut iter = set.iter();
    assert_eq!(iter.next(), Some(&0));
    assert_eq!(iter.next_back(), Some(&499));
    assert_eq!(iter.len(), 498);
}

/// Test iterator count equals len and nth skips correctly
#[test]
fn test_iter_distance() {
    let set: BTreeSet<i32> = (0..1234).collect();
    assert_eq!(set.iter().count(), set.len());
    assert_eq!(set.iter().len(), set.len());

    let mut iter = set.iter();
    assert_eq!(iter.nth(100), Some(&100));
    assert_eq!(iter.next(), Some(&101));
    assert_eq!(set.iter().nth(5000), None);
}

/// Test a reverse-order Boolean comparator
#[test]
fn test_custom_comparator() {
    #[derive(Clone, Copy, Default)]
    struct Reverse;

    impl KeyCompare<i32> for Reverse {
        fn less(&self, a: &i32, b: &i32) -> bool {
            b < a
        }
    }

    let mut set: BTreeSet<i32, Reverse> = BTreeSet::new();
    for k in [3, 1, 4, 1, 5, 9, 2, 6] {
        set.insert(k);
    }

    assert_eq!(set.len(), 7);
    set.verify();
    let collected: Vec<i32> = set.iter().copied().collect();
    assert_eq!(collected, [9, 6, 5, 4, 3, 2, 1]);
}

/// Test string keys with a three-way comparator
#[test]
fn test_three_way_string_set() {
    let mut set: BTreeSet<String, OrdCompareTo> = BTreeSet::new();
    for word in ["delta", "alpha", "echo", "bravo", "charlie", "alpha"] {
        set.insert(word.to_string());
    }

    assert_eq!(set.len(), 5);
    set.verify();
    assert!(set.contains(&"bravo".to_string()));
    assert!(!set.contains(&"foxtrot".to_string()));

    let collected: Vec<&String> = set.iter().collect();
    assert_eq!(collected, ["alpha", "bravo", "charlie", "delta", "echo"]);

    assert!(set.remove(&"alpha".to_string()));
    assert_eq!(set.len(), 4);
    set.verify();
}

/// Test clone produces an independent deep copy
#[test]
fn test_clone_is_deep() {
    let mut original: BTreeSet<i32> = (0..300).collect();
    let copy = original.clone();

    original.remove(&150);
    assert_eq!(original.len(), 299);
    assert_eq!(copy.len(), 300);
    assert!(copy.contains(&150));
    copy.verify();
}

/// Test swap exchanges contents
#[test]
fn test_swap() {
    let mut a: BTreeSet<i32> = (0..10).collect();
    let mut b: BTreeSet<i32> = (100..105).collect();

    a.swap(&mut b);
    assert_eq!(a.len(), 5);
    assert_eq!(b.len(), 10);
    assert!(a.contains(&100));
    assert!(b.contains(&0));
}

/// Test clear frees everything and the set is reusable
#[test]
fn test_clear_and_reuse() {
    let mut set: BTreeSet<i32> = (0..1000).collect();
    set.clear();
    assert!(set.is_empty());
    assert_eq!(set.nodes(), 0);

    set.insert(7);
    assert_eq!(set.len(), 1);
    set.verify();
}

/// Test dump renders keys in order with bracketed depths
#[test]
fn test_dump() {
    let set: BTreeSet<i32> = [2, 1, 3].into_iter().collect();
    let mut out = String::new();
    set.dump(&mut out).unwrap();
    assert_eq!(out, "1 [0]\n2 [0]\n3 [0]\n");

    let big: BTreeSet<i32> = (0..500).collect();
    let mut out = String::new();
    big.dump(&mut out).unwrap();
    assert_eq!(out.lines().count(), 500);
    // Keys on deeper nodes are indented, with the depth in brackets.
    assert!(out.lines().any(|line| line.starts_with("  ") && line.ends_with("[1]")));
}

/// Test structural statistics stay consistent with each other
#[test]
fn test_statistics() {
    let set: BTreeSet<i32> = (0..2000).collect();

    assert_eq!(set.nodes(), set.leaf_nodes() + set.internal_nodes());
    assert!(set.bytes_used() > 2000 * std::mem::size_of::<i32>());
    assert!(set.fullness() > 0.0 && set.fullness() <= 1.0);
    assert!(set.overhead() > 0.0);
    assert!(BTreeSet::<i32>::average_bytes_per_value() > 4.0);
}

/// Test the tiny-root growth path: one, two, four values
#[test]
fn test_small_tree_growth() {
    let mut set: BTreeSet<i32> = BTreeSet::new();
    for k in 0..8 {
        set.insert(k);
        set.verify();
        assert_eq!(set.len() as i32, k + 1);
        assert_eq!(set.height(), 1);
    }
    // A small tree stays in one undersized root node.
    assert_eq!(set.nodes(), 1);
}
