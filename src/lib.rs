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

//! # compact-btree - Cache-efficient ordered containers
//!
//! Sorted sets and maps backed by a B-tree instead of a binary tree. Values
//! are packed dozens to a node, which cuts per-element memory overhead to a
//! fraction of a node-per-element tree's and keeps searches walking hot
//! cache lines. The trade-off is iterator stability: any insert or erase may
//! move values between nodes, invalidating every outstanding iterator.
//!
//! ## Key Features
//!
//! - **Four containers** - [`BTreeSet`], [`BTreeMap`] and their multi-key
//!   variants [`BTreeMultiSet`], [`BTreeMultiMap`]
//! - **Low overhead** - one allocation per node, three node size classes,
//!   leaves pay nothing for child pointers
//! - **Tunable node size** - a const parameter sets the per-node byte
//!   budget (default 256) that the per-node capacity is derived from
//! - **Pluggable comparison** - Boolean less-than by default; three-way
//!   comparators opt in and save a comparison per lookup
//! - **Pluggable allocation** - nodes come from a [`RawAllocator`]
//! - **Self-checking** - `verify()` asserts every structural invariant,
//!   `dump()` renders the tree for inspection
//!
//! ## Quick Start
//!
//! ```rust
//! use compact_btree::BTreeMap;
//!
//! let mut map: BTreeMap<i64, &str> = BTreeMap::new();
//! map.insert(3, "three");
//! map.insert(1, "one");
//! map.insert(2, "two");
//!
//! assert_eq!(map.get(&2), Some(&"two"));
//! let keys: Vec<i64> = map.keys().copied().collect();
//! assert_eq!(keys, [1, 2, 3]);
//! ```
//!
//! ## Modules
//!
//! - [`set`] / [`map`] - the container facades
//! - [`tree`] - the B-tree engine the facades wrap
//! - [`compare`] - comparator traits ([`OrdLess`], [`OrdCompareTo`])
//! - [`params`] - parameter bundles and per-key search selection
//! - [`alloc`] - the raw node allocator
//! - [`error`] - structural verification errors

pub mod alloc;
pub mod compare;
pub mod error;
pub mod iter;
pub mod map;
pub mod params;
pub mod set;
pub mod tree;

mod node;

// Re-export main types for convenience
pub use alloc::{Heap, RawAllocator};
pub use compare::{KeyCompare, OrdCompareTo, OrdLess};
pub use error::VerifyError;
pub use map::{BTreeMap, BTreeMultiMap, Entry};
pub use params::{KeyTraits, MapParams, SetParams, TreeParams};
pub use set::{BTreeMultiSet, BTreeSet};
pub use tree::BTree;
