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

//! Sorted maps
//!
//! [`BTreeMap`] keeps one entry per key, [`BTreeMultiMap`] keeps every
//! inserted entry. Entries are stored as `(key, value)` pairs inside the
//! engine; keys are never handed out mutably, so an entry's position can't
//! be invalidated from outside.

use std::fmt;
use std::marker::PhantomData;
use std::mem;

use crate::alloc::{Heap, RawAllocator};
use crate::compare::{KeyCompare, OrdLess};
use crate::error::VerifyError;
use crate::iter::{Iter as RawValueIter, RawIter};
use crate::params::{KeyTraits, MapParams};
use crate::tree::BTree;

/// A sorted map with unique keys.
pub struct BTreeMap<K, V, C = OrdLess, A = Heap, const TARGET_NODE_SIZE: usize = 256>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    tree: BTree<MapParams<K, V, C, TARGET_NODE_SIZE>, A>,
}

/// Double-ended iterator over a map's entries in key order.
pub struct Iter<'a, K, V, C, A, const T: usize>
where
    K: KeyTraits + 'a,
    V: 'a,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    inner: RawValueIter<'a, MapParams<K, V, C, T>>,
    _marker: PhantomData<A>,
}

impl<'a, K, V, C, A, const T: usize> Iterator for Iter<'a, K, V, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<(&'a K, &'a V)> {
        self.inner.next().map(|(k, v)| (k, v))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V, C, A, const T: usize> DoubleEndedIterator for Iter<'a, K, V, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    #[inline]
    fn next_back(&mut self) -> Option<(&'a K, &'a V)> {
        self.inner.next_back().map(|(k, v)| (k, v))
    }
}

impl<K, V, C, A, const T: usize> ExactSizeIterator for Iter<'_, K, V, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
}

/// Iterator over a map's entries yielding values mutably. Keys stay shared:
/// mutating a key in place would break the ordering invariant.
pub struct IterMut<'a, K, V, C, A, const T: usize>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    front: RawIter<MapParams<K, V, C, T>>,
    back: RawIter<MapParams<K, V, C, T>>,
    _marker: PhantomData<(&'a mut V, A)>,
}

impl<'a, K, V, C, A, const T: usize> Iterator for IterMut<'a, K, V, C, A, T>
where
    K: KeyTraits + 'a,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<(&'a K, &'a mut V)> {
        if self.front == self.back {
            return None;
        }
        let entry = self.front.value_ptr();
        self.front.increment();
        // SAFETY: the entry is live and the iterator holds the map's unique
        // borrow; each entry is yielded exactly once, so no two &mut alias.
        unsafe { Some((&(*entry).0, &mut (*entry).1)) }
    }
}

impl<K, V, C, A, const T: usize> BTreeMap<K, V, C, A, T>
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
        BTreeMap { tree: BTree::new(comp, alloc) }
    }

    /// Entries per node for this instantiation.
    pub const fn node_capacity() -> usize {
        BTree::<MapParams<K, V, C, T>, A>::capacity()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.tree.find_unique(key).node().is_some()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let iter = self.tree.find_unique(key);
        iter.node().map(|_| &iter.value().1)
    }

    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let iter = self.tree.find_unique(key);
        iter.node().map(|_| {
            let (k, v) = iter.value();
            (k, v)
        })
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let iter = self.tree.find_unique(key);
        iter.node()?;
        // SAFETY: the entry is live and &mut self guarantees exclusivity.
        unsafe { Some(&mut (*iter.value_ptr()).1) }
    }

    /// Inserts `value` under `key`. If the key was present, its value is
    /// replaced and the old one returned; the stored key is kept.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let (iter, rejected) = self.tree.insert_unique((key, value));
        let (_, value) = rejected?;
        // SAFETY: rejected means iter points at the existing live entry and
        // &mut self guarantees exclusivity.
        unsafe { Some(mem::replace(&mut (*iter.value_ptr()).1, value)) }
    }

    /// Removes the entry for `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.tree.erase_unique(key).map(|(_, v)| v)
    }

    /// Removes the entry for `key`, returning the stored pair.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        self.tree.erase_unique(key)
    }

    /// The entry for in-place inspection and insertion. The value for a
    /// vacant entry is only constructed if one of the inserting methods
    /// runs.
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, C, A, T> {
        let iter = self.tree.find_unique(&key);
        if iter.node().is_some() {
            Entry::Occupied(OccupiedEntry { iter, _marker: PhantomData })
        } else {
            Entry::Vacant(VacantEntry { map: self, key })
        }
    }

    pub fn iter(&self) -> Iter<'_, K, V, C, A, T> {
        Iter { inner: self.tree.iter(), _marker: PhantomData }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V, C, A, T> {
        IterMut {
            front: self.tree.raw_begin(),
            back: self.tree.raw_end(),
            _marker: PhantomData,
        }
    }

    pub fn keys<'a>(&'a self) -> impl DoubleEndedIterator<Item = &'a K> + 'a {
        self.tree.iter().map(|(k, _)| k)
    }

    pub fn values<'a>(&'a self) -> impl DoubleEndedIterator<Item = &'a V> + 'a {
        self.tree.iter().map(|(_, v)| v)
    }

    /// Iterator over the entries comparing equal to `key`.
    pub fn equal_range(&self, key: &K) -> Iter<'_, K, V, C, A, T> {
        Iter { inner: self.tree.equal_range(key), _marker: PhantomData }
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
        BTree::<MapParams<K, V, C, T>, A>::average_bytes_per_value()
    }

    pub fn fullness(&self) -> f64 {
        self.tree.fullness()
    }

    pub fn overhead(&self) -> f64 {
        self.tree.overhead()
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

impl<K, V, C, A, const T: usize> Default for BTreeMap<K, V, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone + Default,
    A: RawAllocator + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C, A, const T: usize> Clone for BTreeMap<K, V, C, A, T>
where
    K: KeyTraits + Clone,
    V: Clone,
    C: KeyCompare<K> + Clone,
    A: RawAllocator + Clone,
{
    fn clone(&self) -> Self {
        BTreeMap { tree: self.tree.clone() }
    }
}

impl<K, V, C, A, const T: usize> Extend<(K, V)> for BTreeMap<K, V, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    /// Entries are offered at the end first, so extending from sorted input
    /// runs in amortized constant time per entry.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for entry in iter {
            let end = self.tree.raw_end();
            self.tree.insert_unique_hint(end, entry);
        }
    }
}

impl<K, V, C, A, const T: usize> FromIterator<(K, V)> for BTreeMap<K, V, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone + Default,
    A: RawAllocator + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, C, A, const T: usize> IntoIterator for &'a BTreeMap<K, V, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, C, A, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, C, A, const T: usize> fmt::Debug for BTreeMap<K, V, C, A, T>
where
    K: KeyTraits + fmt::Debug,
    V: fmt::Debug,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// A view into a single map entry, occupied or vacant.
pub enum Entry<'a, K, V, C, A, const T: usize>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    Occupied(OccupiedEntry<'a, K, V, C, A, T>),
    Vacant(VacantEntry<'a, K, V, C, A, T>),
}

impl<'a, K, V, C, A, const T: usize> Entry<'a, K, V, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    pub fn or_insert_with<F: FnOnce() -> V>(self, default: F) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert_with(default),
        }
    }

    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

/// An occupied map entry.
pub struct OccupiedEntry<'a, K, V, C, A, const T: usize>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    iter: RawIter<MapParams<K, V, C, T>>,
    _marker: PhantomData<&'a mut BTreeMap<K, V, C, A, T>>,
}

impl<'a, K, V, C, A, const T: usize> OccupiedEntry<'a, K, V, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    pub fn key(&self) -> &K {
        &self.iter.value().0
    }

    pub fn get(&self) -> &V {
        &self.iter.value().1
    }

    pub fn get_mut(&mut self) -> &mut V {
        // SAFETY: the entry is live and this view holds the map's unique
        // borrow for 'a.
        unsafe { &mut (*self.iter.value_ptr()).1 }
    }

    pub fn into_mut(self) -> &'a mut V {
        // SAFETY: as in get_mut; the returned borrow keeps 'a alive.
        unsafe { &mut (*self.iter.value_ptr()).1 }
    }

    /// Replaces the value, returning the old one. The stored key is kept.
    pub fn insert(&mut self, value: V) -> V {
        mem::replace(self.get_mut(), value)
    }
}

/// A vacant map entry.
pub struct VacantEntry<'a, K, V, C, A, const T: usize>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    map: &'a mut BTreeMap<K, V, C, A, T>,
    key: K,
}

impl<'a, K, V, C, A, const T: usize> VacantEntry<'a, K, V, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn insert(self, value: V) -> &'a mut V {
        self.insert_with(|| value)
    }

    pub fn insert_with<F: FnOnce() -> V>(self, default: F) -> &'a mut V {
        let (iter, inserted) = self.map.tree.insert_unique_with(self.key, |k| (k, default()));
        debug_assert!(inserted);
        // SAFETY: iter points at the entry just inserted; the map's unique
        // borrow lives for 'a.
        unsafe { &mut (*iter.value_ptr()).1 }
    }
}

/// A sorted map keeping every inserted entry, including duplicate keys.
pub struct BTreeMultiMap<K, V, C = OrdLess, A = Heap, const TARGET_NODE_SIZE: usize = 256>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    tree: BTree<MapParams<K, V, C, TARGET_NODE_SIZE>, A>,
}

impl<K, V, C, A, const T: usize> BTreeMultiMap<K, V, C, A, T>
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
        BTreeMultiMap { tree: BTree::new(comp, alloc) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.tree.find_multi(key).node().is_some()
    }

    /// The value of the first entry for `key`, if any.
    pub fn get_first(&self, key: &K) -> Option<&V> {
        let iter = self.tree.find_multi(key);
        iter.node().map(|_| &iter.value().1)
    }

    /// How many entries share `key`.
    pub fn count(&self, key: &K) -> usize {
        self.tree.count_multi(key)
    }

    /// Inserts an entry, keeping any existing entries with an equal key.
    pub fn insert(&mut self, key: K, value: V) {
        self.tree.insert_multi((key, value));
    }

    /// Removes every entry with a key equal to `key`; returns how many.
    pub fn remove_all(&mut self, key: &K) -> usize {
        self.tree.erase_multi(key)
    }

    pub fn iter(&self) -> Iter<'_, K, V, C, A, T> {
        Iter { inner: self.tree.iter(), _marker: PhantomData }
    }

    /// Iterator over the entries whose keys compare equal to `key`.
    pub fn equal_range(&self, key: &K) -> Iter<'_, K, V, C, A, T> {
        Iter { inner: self.tree.equal_range(key), _marker: PhantomData }
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

impl<K, V, C, A, const T: usize> Default for BTreeMultiMap<K, V, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone + Default,
    A: RawAllocator + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C, A, const T: usize> Clone for BTreeMultiMap<K, V, C, A, T>
where
    K: KeyTraits + Clone,
    V: Clone,
    C: KeyCompare<K> + Clone,
    A: RawAllocator + Clone,
{
    fn clone(&self) -> Self {
        BTreeMultiMap { tree: self.tree.clone() }
    }
}

impl<K, V, C, A, const T: usize> Extend<(K, V)> for BTreeMultiMap<K, V, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for entry in iter {
            let end = self.tree.raw_end();
            self.tree.insert_multi_hint(end, entry);
        }
    }
}

impl<K, V, C, A, const T: usize> FromIterator<(K, V)> for BTreeMultiMap<K, V, C, A, T>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone + Default,
    A: RawAllocator + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K, V, C, A, const T: usize> fmt::Debug for BTreeMultiMap<K, V, C, A, T>
where
    K: KeyTraits + fmt::Debug,
    V: fmt::Debug,
    C: KeyCompare<K> + Clone,
    A: RawAllocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
