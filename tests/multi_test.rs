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

//! Multi-key Container Tests
//!
//! Duplicate handling in BTreeMultiSet and BTreeMultiMap: counting,
//! equal-range iteration and bulk removal of an equal run.

use compact_btree::{BTreeMultiMap, BTreeMultiSet};

/// Test one key inserted a hundred times, then removed as a block
#[test]
fn test_hundred_duplicates() {
    let mut set: BTreeMultiSet<i32> = BTreeMultiSet::new();
    for _ in 0..100 {
        set.insert(7);
    }

    assert_eq!(set.len(), 100);
    assert_eq!(set.count(&7), 100);
    set.verify();

    assert_eq!(set.remove_all(&7), 100);
    assert!(set.is_empty());
    assert_eq!(set.height(), 0);
    set.verify();
}

/// Test duplicates interleaved with distinct keys
#[test]
fn test_duplicates_among_distinct_keys() {
    let mut set: BTreeMultiSet<i32> = BTreeMultiSet::new();
    for k in 0..100 {
        set.insert(k);
    }
    for _ in 0..50 {
        set.insert(42);
    }

    assert_eq!(set.len(), 150);
    assert_eq!(set.count(&42), 51);
    assert_eq!(set.count(&41), 1);
    assert_eq!(set.count(&200), 0);
    set.verify();

    // The run sits contiguously in iteration order.
    let run: Vec<i32> = set.equal_range(&42).copied().collect();
    assert_eq!(run.len(), 51);
    assert!(run.iter().all(|&k| k == 42));

    assert_eq!(set.remove_all(&42), 51);
    assert_eq!(set.len(), 99);
    assert_eq!(set.count(&42), 0);
    set.verify();

    // Neighbors survive.
    assert!(set.contains(&41));
    assert!(set.contains(&43));
}

/// Test multiset iteration is non-strictly sorted
#[test]
fn test_multiset_ordering() {
    let mut set: BTreeMultiSet<i32> = BTreeMultiSet::new();
    for k in [5, 3, 5, 1, 3, 5, 9, 1] {
        set.insert(k);
    }

    let collected: Vec<i32> = set.iter().copied().collect();
    assert_eq!(collected, [1, 1, 3, 3, 5, 5, 5, 9]);
    set.verify();
}

/// Test remove_all of an absent key is a no-op
#[test]
fn test_remove_absent() {
    let mut set: BTreeMultiSet<i32> = BTreeMultiSet::new();
    set.insert(1);
    assert_eq!(set.remove_all(&9), 0);
    assert_eq!(set.len(), 1);
}

/// Test multimap keeps every entry and equal_range sees them all
#[test]
fn test_multimap_basics() {
    let mut map: BTreeMultiMap<String, i64> = BTreeMultiMap::new();
    map.insert("a".to_string(), 1);
    map.insert("b".to_string(), 2);
    map.insert("a".to_string(), 3);
    map.insert("a".to_string(), 4);

    assert_eq!(map.len(), 4);
    assert_eq!(map.count(&"a".to_string()), 3);
    assert_eq!(map.get_first(&"a".to_string()), Some(&1));
    map.verify();

    // Values under one key keep insertion order.
    let values: Vec<i64> = map.equal_range(&"a".to_string()).map(|(_, v)| *v).collect();
    assert_eq!(values, [1, 3, 4]);

    assert_eq!(map.remove_all(&"a".to_string()), 3);
    assert_eq!(map.len(), 1);
    assert_eq!(map.get_first(&"b".to_string()), Some(&2));
    map.verify();
}

/// Test a large batch of duplicate runs across node boundaries
#[test]
fn test_large_runs() {
    let mut map: BTreeMultiMap<i32, i32> = BTreeMultiMap::new();
    for k in 0..50 {
        for i in 0..40 {
            map.insert(k, i);
        }
    }

    assert_eq!(map.len(), 2000);
    map.verify();
    for k in 0..50 {
        assert_eq!(map.count(&k), 40, "key {k}");
        let values: Vec<i32> = map.equal_range(&k).map(|(_, v)| *v).collect();
        assert_eq!(values, (0..40).collect::<Vec<i32>>(), "key {k}");
    }

    for k in (0..50).step_by(2) {
        assert_eq!(map.remove_all(&k), 40);
        map.verify();
    }
    assert_eq!(map.len(), 1000);
}

/// Test multiset Extend uses the end hint on sorted duplicate input
#[test]
fn test_multiset_extend() {
    let mut set: BTreeMultiSet<i32> = BTreeMultiSet::new();
    set.extend([1, 1, 1, 2, 2, 3, 3, 3, 3]);
    assert_eq!(set.len(), 9);
    assert_eq!(set.count(&3), 4);
    set.verify();
}
