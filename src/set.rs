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

//! Sorted sets
//!
//! Thin facades over the B-tree engine: [`BTreeSet`] keeps one value per
//! key, [`BTreeMultiSet`] keeps every inserted value. Compared to the
//! standard library's sets these trade iterator stability on mutation for
//! lower per-element overhead and better cache behavior.

use std::fmt;

use crate::alloc::{Heap, RawAllocator};
use crate::compare::{KeyCompare, OrdLess};
use crate::error::VerifyError;
use crate::iter::Iter;
use crate::params::{KeyTraits, SetParams};
use crate::tree::BTree;

/// A sorted set with unique keys.
///
/// `TARGET_NODE_SIZE` tunes the per-node byte budget that the per-node value
/// capacity is derived from; 256 suits most value sizes.
pub struct BTreeSet<K, C = OrdLess, A = Heap, const TARGET_NODE_SIZE: usize = 256>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    tree: BTree<SetParams<K, C, TARGET_NODE_SIZE>, A>,
}

impl<K, C, A, const T: usize> BTreeSet<K, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    pub fn new() -> Self
    where
        C: Default,
        A: Default,
    {
        Self::new_in(C::default(), A::default())
    }

    pub fn with_comparator(comp: C) -> Self
    where
        A: Default,
    {
        Self::new_in(comp, A::default())
    }

    pub fn new_in(comp: C, alloc: A) -> Self {
        BTreeSet { tree: BTree::new(comp, alloc) }
    }

    /// Values per node for this instantiation.
    pub const fn node_capacity() -> usize {
        BTree::<SetParams<K, C, T>, A>::capacity()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.tree.count_unique(key) == 1
    }

    /// The stored value equal to `key`, if any.
    pub fn get(&self, key: &K) -> Option<&K> {
        let iter = self.tree.find_unique(key);
        iter.node().map(|_| iter.value())
    }

    /// Inserts `value`; returns false if an equal key was already present
    /// (the set is unchanged in that case).
    pub fn insert(&mut self, value: K) -> bool {
        self.tree.insert_unique(value).1.is_none()
    }

    /// Removes the value equal to `key`; returns whether one was present.
    pub fn remove(&mut self, key: &K) -> bool {
        self.tree.erase_unique(key).is_some()
    }

    /// Removes and returns the value equal to `key`.
    pub fn take(&mut self, key: &K) -> Option<K> {
        self.tree.erase_unique(key)
    }

    /// The first value not less than `key`.
    pub fn lower_bound(&self, key: &K) -> Option<&K> {
        let iter = self.tree.lower_bound_iter(key);
        if iter == self.tree.raw_end() {
            None
        } else {
            Some(iter.value())
        }
    }

    /// The first value strictly greater than `key`.
    pub fn upper_bound(&self, key: &K) -> Option<&K> {
        let iter = self.tree.upper_bound_iter(key);
        if iter == self.tree.raw_end() {
            None
        } else {
            Some(iter.value())
        }
    }

    /// In-order iterator over the values.
    pub fn iter(&self) -> Iter<'_, SetParams<K, C, T>> {
        self.tree.iter()
    }

    /// Iterator over the values comparing equal to `key` (at most one here;
    /// the multiset variant makes this interesting).
    pub fn equal_range(&self, key: &K) -> Iter<'_, SetParams<K, C, T>> {
        self.tree.equal_range(key)
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    pub fn swap(&mut self, other: &mut Self) {
        self.tree.swap(&mut other.tree);
    }

    // Structure introspection, forwarded from the engine.

    pub fn height(&self) -> usize {
        self.tree.height()
    }

    pub fn leaf_nodes(&self) -> usize {
        self.tree.leaf_nodes()
    }

    pub fn internal_nodes(&self) -> usize {
        self.tree.internal_nodes()
    }

    pub fn nodes(&self) -> usize {
        self.tree.nodes()
    }

    pub fn bytes_used(&self) -> usize {
        self.tree.bytes_used()
    }

    pub fn average_bytes_per_value() -> f64 {
        BTree::<SetParams<K, C, T>, A>::average_bytes_per_value()
    }

    pub fn fullness(&self) -> f64 {
        self.tree.fullness()
    }

    pub fn overhead(&self) -> f64 {
        self.tree.overhead()
    }

    /// Writes the keys in order, indented by node depth.
    pub fn dump<W: fmt::Write>(&self, out: &mut W) -> fmt::Result
    where
        K: fmt::Display,
    {
        self.tree.dump(out)
    }

    /// Panics if any structural invariant is broken.
    pub fn verify(&self) {
        self.tree.verify();
    }

    pub fn try_verify(&self) -> Result<(), VerifyError> {
        self.tree.try_verify()
    }
}

impl<K, C, A, const T: usize> Default for BTreeSet<K, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone + Default,
    A: RawAllocator + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, C, A, const T: usize> Clone for BTreeSet<K, C, A, T>
where
    K: KeyTraits + Clone,
    C: KeyCompare<K> + Clone,
    A: RawAllocator + Clone,
{
    fn clone(&self) -> Self {
        BTreeSet { tree: self.tree.clone() }
    }
}

impl<K, C, A, const T: usize> Extend<K> for BTreeSet<K, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    /// Each value is offered at the end first, so extending from sorted
    /// input runs in amortized constant time per value.
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for value in iter {
            let end = self.tree.raw_end();
            self.tree.insert_unique_hint(end, value);
        }
    }
}

impl<K, C, A, const T: usize> FromIterator<K> for BTreeSet<K, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone + Default,
    A: RawAllocator + Default,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a, K, C, A, const T: usize> IntoIterator for &'a BTreeSet<K, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    type Item = &'a K;
    type IntoIter = Iter<'a, SetParams<K, C, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, C, A, const T: usize> fmt::Debug for BTreeSet<K, C, A, T>
where
    K: KeyTraits + fmt::Debug,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K, C, A, const T: usize> PartialEq for BTreeSet<K, C, A, T>
where
    K: KeyTraits + PartialEq,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K, C, A, const T: usize> Eq for BTreeSet<K, C, A, T>
where
    K: KeyTraits + Eq,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
}

/// A sorted set keeping every inserted value, including duplicates.
pub struct BTreeMultiSet<K, C = OrdLess, A = Heap, const TARGET_NODE_SIZE: usize = 256>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    tree: BTree<SetParams<K, C, TARGET_NODE_SIZE>, A>,
}

impl<K, C, A, const T: usize> BTreeMultiSet<K, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    pub fn new() -> Self
    where
        C: Default,
        A: Default,
    {
        Self::new_in(C::default(), A::default())
    }

    pub fn with_comparator(comp: C) -> Self
    where
        A: Default,
    {
        Self::new_in(comp, A::default())
    }

    pub fn new_in(comp: C, alloc: A) -> Self {
        BTreeMultiSet { tree: BTree::new(comp, alloc) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.tree.find_multi(key).node().is_some()
    }

    /// How many values compare equal to `key`.
    pub fn count(&self, key: &K) -> usize {
        self.tree.count_multi(key)
    }

    /// Inserts `value`, keeping any equal values already present. Equal
    /// values are stored in insertion order.
    pub fn insert(&mut self, value: K) {
        self.tree.insert_multi(value);
    }

    /// Removes every value comparing equal to `key`; returns how many.
    pub fn remove_all(&mut self, key: &K) -> usize {
        self.tree.erase_multi(key)
    }

    pub fn iter(&self) -> Iter<'_, SetParams<K, C, T>> {
        self.tree.iter()
    }

    /// Iterator over the values comparing equal to `key`.
    pub fn equal_range(&self, key: &K) -> Iter<'_, SetParams<K, C, T>> {
        self.tree.equal_range(key)
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    pub fn swap(&mut self, other: &mut Self) {
        self.tree.swap(&mut other.tree);
    }

    pub fn height(&self) -> usize {
        self.tree.height()
    }

    pub fn nodes(&self) -> usize {
        self.tree.nodes()
    }

    pub fn bytes_used(&self) -> usize {
        self.tree.bytes_used()
    }

    pub fn fullness(&self) -> f64 {
        self.tree.fullness()
    }

    pub fn dump<W: fmt::Write>(&self, out: &mut W) -> fmt::Result
    where
        K: fmt::Display,
    {
        self.tree.dump(out)
    }

    pub fn verify(&self) {
        self.tree.verify();
    }

    pub fn try_verify(&self) -> Result<(), VerifyError> {
        self.tree.try_verify()
    }
}

impl<K, C, A, const T: usize> Default for BTreeMultiSet<K, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone + Default,
    A: RawAllocator + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, C, A, const T: usize> Clone for BTreeMultiSet<K, C, A, T>
where
    K: KeyTraits + Clone,
    C: KeyCompare<K> + Clone,
    A: RawAllocator + Clone,
{
    fn clone(&self) -> Self {
        BTreeMultiSet { tree: self.tree.clone() }
    }
}

impl<K, C, A, const T: usize> Extend<K> for BTreeMultiSet<K, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for value in iter {
            let end = self.tree.raw_end();
            self.tree.insert_multi_hint(end, value);
        }
    }
}

impl<K, C, A, const T: usize> FromIterator<K> for BTreeMultiSet<K, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone + Default,
    A: RawAllocator + Default,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a, K, C, A, const T: usize> IntoIterator for &'a BTreeMultiSet<K, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    type Item = &'a K;
    type IntoIter = Iter<'a, SetParams<K, C, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, C, A, const T: usize> fmt::Debug for BTreeMultiSet<K, C, A, T>
where
    K: KeyTraits + fmt::Debug,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
