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

//! Invariant Tests
//!
//! Randomized mixed workloads checked against a reference container with
//! full structural verification after every operation, allocation balance,
//! and the height bound.

use std::alloc::Layout;
use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

use compact_btree::{BTreeSet, Heap, OrdLess, RawAllocator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Test a seeded 10k-operation insert/erase mix against std's BTreeSet,
/// verifying the tree after every operation
#[test]
fn test_randomized_against_reference() {
    let mut set: BTreeSet<i32> = BTreeSet::new();
    let mut reference = std::collections::BTreeSet::new();
    let mut rng = StdRng::seed_from_u64(0xB7EE);

    for _ in 0..10_000 {
        let key = rng.random_range(0..10_000);
        if rng.random_bool(0.5) {
            assert_eq!(set.insert(key), reference.insert(key));
        } else {
            assert_eq!(set.remove(&key), reference.remove(&key));
        }
        set.verify();
        assert_eq!(set.len(), reference.len());
    }

    let survivors: Vec<i32> = set.iter().copied().collect();
    let expected: Vec<i32> = reference.iter().copied().collect();
    assert_eq!(survivors, expected);
}

/// Test the same mix at the minimum node capacity of three, which drives
/// the deepest trees and the most splits and merges per operation
#[test]
fn test_randomized_minimum_capacity() {
    // A 1-byte target forces the capacity floor.
    let mut set: BTreeSet<i32, OrdLess, Heap, 1> = BTreeSet::new();
    assert_eq!(BTreeSet::<i32, OrdLess, Heap, 1>::node_capacity(), 3);

    let mut reference = std::collections::BTreeSet::new();
    let mut rng = StdRng::seed_from_u64(0x5EED);

    for _ in 0..4_000 {
        let key = rng.random_range(0..500);
        if rng.random_bool(0.5) {
            assert_eq!(set.insert(key), reference.insert(key));
        } else {
            assert_eq!(set.remove(&key), reference.remove(&key));
        }
        set.verify();
    }

    let survivors: Vec<i32> = set.iter().copied().collect();
    let expected: Vec<i32> = reference.iter().copied().collect();
    assert_eq!(survivors, expected);
}

/// Test the height bound: height <= ceil(log_min(len + 1)) + 1
#[test]
fn test_height_bound() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut set: BTreeSet<i32> = BTreeSet::new();
    let capacity = BTreeSet::<i32>::node_capacity();
    let min = (capacity / 2).max(2) as f64;

    for _ in 0..20_000 {
        set.insert(rng.random_range(0..1_000_000));
    }

    let bound = ((set.len() + 1) as f64).log(min).ceil() as usize + 1;
    assert!(
        set.height() <= bound,
        "height {} exceeds bound {bound} for {} values",
        set.height(),
        set.len()
    );
}

/// Test random erase interleaved with iteration stays sorted
#[test]
fn test_partial_erase_keeps_order() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut set: BTreeSet<i64> = (0..5_000).collect();

    for _ in 0..2_500 {
        let key = rng.random_range(0..5_000);
        set.remove(&key);
    }
    set.verify();

    let collected: Vec<i64> = set.iter().copied().collect();
    assert!(collected.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(collected.len(), set.len());
}

/// An allocator that tracks net outstanding bytes.
#[derive(Clone, Default)]
struct CountingAlloc {
    outstanding: Rc<Cell<isize>>,
}

impl RawAllocator for CountingAlloc {
    fn allocate(&mut self, layout: Layout) -> NonNull<u8> {
        self.outstanding.set(self.outstanding.get() + layout.size() as isize);
        Heap.allocate(layout)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        self.outstanding.set(self.outstanding.get() - layout.size() as isize);
        Heap.deallocate(ptr, layout);
    }
}

/// Test every allocation is freed with its original size: node growth,
/// splits, merges, shrink and drop must all balance
#[test]
fn test_allocation_balance() {
    let alloc = CountingAlloc::default();
    let outstanding = alloc.outstanding.clone();

    {
        let mut set: BTreeSet<i64, OrdLess, CountingAlloc> = BTreeSet::new_in(OrdLess, alloc);
        let mut rng = StdRng::seed_from_u64(0xA110C);

        for _ in 0..5_000 {
            let key = rng.random_range(0..2_000);
            if rng.random_bool(0.6) {
                set.insert(key);
            } else {
                set.remove(&key);
            }
        }
        assert!(outstanding.get() > 0);

        // Erase everything through the shrink path as well.
        loop {
            let Some(&key) = set.iter().next() else { break };
            set.remove(&key);
        }
        assert!(set.is_empty());
        assert_eq!(outstanding.get(), 0, "empty tree must hold no nodes");

        set.insert(1);
        assert!(outstanding.get() > 0);
    }

    assert_eq!(outstanding.get(), 0, "leaked {} bytes", outstanding.get());
}

/// Test clear on a deep tree frees every node
#[test]
fn test_clear_releases_all_nodes() {
    let alloc = CountingAlloc::default();
    let outstanding = alloc.outstanding.clone();

    let mut set: BTreeSet<i64, OrdLess, CountingAlloc> = BTreeSet::new_in(OrdLess, alloc);
    for k in 0..10_000 {
        set.insert(k);
    }
    assert!(set.height() >= 3);

    set.clear();
    assert_eq!(outstanding.get(), 0);
}

/// Test the FIFO deletion pattern that exercises the skipped-rebalance
/// optimization: nodes may dip below the fill floor transiently but the
/// structure self-repairs and verify stays green
#[test]
fn test_fifo_churn() {
    let mut set: BTreeSet<i32> = BTreeSet::new();
    for k in 0..1_000 {
        set.insert(k);
    }

    // Pop from the front while pushing at the back, queue style.
    for k in 1_000..3_000 {
        let front = *set.iter().next().unwrap();
        assert!(set.remove(&front));
        assert!(set.insert(k));
        set.verify();
        assert_eq!(set.len(), 1_000);
    }

    let collected: Vec<i32> = set.iter().copied().collect();
    assert_eq!(collected, (2_000..3_000).collect::<Vec<i32>>());
}
