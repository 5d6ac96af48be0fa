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

//! The B-tree engine
//!
//! Owns the root and orchestrates everything above the single-node level:
//! the root lifecycle (a one-slot leaf that doubles as it fills, promotion to
//! an internal root, demotion and shrink on the way back down), top-down
//! locate, the insertion path with pre-insertion rebalance or split, the
//! deletion path with merge or post-deletion rebalance, and the structural
//! checker.
//!
//! Reads flow top-down (locate descends root to leaf); structural repair
//! after a write flows bottom-up from the touched leaf.
//!
//! The root node object is special: it carries the tree size and the
//! rightmost-leaf pointer, and its parent pointer aliases the leftmost leaf.
//! Growth and shrink therefore never replace an internal root; they swap
//! contents with a freshly allocated ordinary node so the metadata stays put.

use std::alloc::Layout;
use std::fmt;
use std::mem;
use std::ptr::{self, NonNull};

use crate::alloc::{Heap, RawAllocator};
use crate::compare::KeyCompare;
use crate::error::VerifyError;
use crate::iter::{distance, Iter, RawIter};
use crate::node::{Node, NodeRef, EXACT_MATCH, MATCH_MASK};
use crate::params::TreeParams;

/// Locate result marker: the key was found during the descent.
const EXACT: i32 = EXACT_MATCH as i32;

#[derive(Clone, Copy, Default)]
struct NodeStats {
    leaf_nodes: usize,
    internal_nodes: usize,
}

/// The B-tree engine. The container facades wrap this; use those unless you
/// are providing your own parameter bundle.
pub struct BTree<P: TreeParams, A: RawAllocator = Heap> {
    root: Option<NodeRef<P>>,
    comp: P::Compare,
    alloc: A,
}

// SAFETY: all node memory is owned by the tree and reached only through its
// root; mutation requires &mut. The raw pointers never alias another tree.
unsafe impl<P: TreeParams, A: RawAllocator + Send> Send for BTree<P, A>
where
    P::Value: Send,
    P::Compare: Send,
{
}
unsafe impl<P: TreeParams, A: RawAllocator + Sync> Sync for BTree<P, A>
where
    P::Value: Sync,
    P::Compare: Sync,
{
}

impl<P: TreeParams, A: RawAllocator> BTree<P, A> {
    /// Creates an empty tree with the given comparator and allocator.
    pub fn new(comp: P::Compare, alloc: A) -> Self {
        // The count fields are u16 and search results pack positions below
        // the EXACT_MATCH bit; both bound the usable capacity.
        assert!(
            Node::<P>::CAPACITY < u16::MAX as usize,
            "target node size yields too many values per node"
        );
        assert!((Node::<P>::CAPACITY as u32) < MATCH_MASK);
        BTree { root: None, comp, alloc }
    }

    /// Values per node for this instantiation.
    pub const fn capacity() -> usize {
        Node::<P>::CAPACITY
    }

    #[inline]
    fn compare_keys(&self, a: &P::Key, b: &P::Key) -> bool {
        self.comp.less(a, b)
    }

    // ------------------------------------------------------------------
    // Size and node accessors
    // ------------------------------------------------------------------

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Total live values. Stored in the root for internal roots; a leaf root
    /// is its own count.
    #[inline]
    pub fn size(&self) -> usize {
        match self.root {
            None => 0,
            Some(root) if root.leaf() => root.count(),
            Some(root) => root.tree_size(),
        }
    }

    #[inline]
    fn leftmost_node(&self) -> Option<NodeRef<P>> {
        self.root.map(|root| root.parent())
    }

    #[inline]
    fn rightmost_node(&self) -> Option<NodeRef<P>> {
        self.root.map(|root| if root.leaf() { root } else { root.rightmost() })
    }

    #[inline]
    pub(crate) fn raw_begin(&self) -> RawIter<P> {
        RawIter::new(self.leftmost_node(), 0)
    }

    #[inline]
    pub(crate) fn raw_end(&self) -> RawIter<P> {
        match self.rightmost_node() {
            Some(node) => RawIter::new_at(node, node.count() as i32),
            None => RawIter::null(),
        }
    }

    #[inline]
    fn internal_end(&self, iter: RawIter<P>) -> RawIter<P> {
        if iter.node().is_some() {
            iter
        } else {
            self.raw_end()
        }
    }

    /// In-order iterator over every stored value.
    #[inline]
    pub fn iter(&self) -> Iter<'_, P> {
        Iter::new(self.raw_begin(), self.raw_end(), self.size())
    }

    /// Iterator over the values comparing equal to `key`.
    pub fn equal_range(&self, key: &P::Key) -> Iter<'_, P> {
        let lower = self.lower_bound_iter(key);
        let upper = self.upper_bound_iter(key);
        Iter::new(lower, upper, distance(lower, upper))
    }

    // ------------------------------------------------------------------
    // Node allocation
    // ------------------------------------------------------------------

    fn leaf_layout(max_count: usize) -> Layout {
        Layout::from_size_align(Node::<P>::leaf_size(max_count), Node::<P>::ALIGN)
            .expect("node layout overflow")
    }

    fn internal_layout() -> Layout {
        Layout::from_size_align(Node::<P>::INTERNAL_SIZE, Node::<P>::ALIGN)
            .expect("node layout overflow")
    }

    fn root_layout() -> Layout {
        Layout::from_size_align(Node::<P>::ROOT_SIZE, Node::<P>::ALIGN)
            .expect("node layout overflow")
    }

    fn new_leaf_node(&mut self, parent: NodeRef<P>) -> NodeRef<P> {
        let raw = self.alloc.allocate(Self::leaf_layout(Node::<P>::CAPACITY));
        // SAFETY: the block was just allocated with the leaf layout.
        unsafe { NodeRef::init_leaf(raw.as_ptr() as *mut Node<P>, parent.as_ptr(), Node::<P>::CAPACITY) }
    }

    /// A leaf that is also the root: it is its own parent (the leftmost
    /// cycle) and may be smaller than a full node.
    fn new_leaf_root_node(&mut self, max_count: usize) -> NodeRef<P> {
        let raw = self.alloc.allocate(Self::leaf_layout(max_count)).as_ptr() as *mut Node<P>;
        // SAFETY: the block was just allocated with the leaf layout for
        // max_count slots; a leaf root parents itself.
        unsafe { NodeRef::init_leaf(raw, raw, max_count) }
    }

    fn new_internal_node(&mut self, parent: NodeRef<P>) -> NodeRef<P> {
        let raw = self.alloc.allocate(Self::internal_layout());
        // SAFETY: the block was just allocated with the internal layout.
        unsafe { NodeRef::init_internal(raw.as_ptr() as *mut Node<P>, parent.as_ptr()) }
    }

    /// A new internal root above the current leaf root. Inherits the old
    /// root's parent (itself, i.e. the leftmost leaf) and seeds rightmost
    /// and size from it.
    fn new_internal_root_node(&mut self) -> NodeRef<P> {
        let old_root = self.root.expect("promoting the root of an empty tree");
        let raw = self.alloc.allocate(Self::root_layout());
        // SAFETY: the block was just allocated with the root layout; the old
        // root is the live leaf the tree grew out of.
        unsafe { NodeRef::init_root(raw.as_ptr() as *mut Node<P>, old_root.parent().as_ptr()) }
    }

    fn delete_leaf_node(&mut self, node: NodeRef<P>) {
        debug_assert!(node.leaf());
        node.destroy_values();
        let layout = Self::leaf_layout(node.max_count());
        // SAFETY: leaf nodes are allocated with exactly this layout.
        unsafe {
            self.alloc.deallocate(NonNull::new_unchecked(node.as_ptr() as *mut u8), layout)
        };
    }

    fn delete_internal_node(&mut self, node: NodeRef<P>) {
        debug_assert!(!node.leaf());
        debug_assert!(Some(node) != self.root);
        node.destroy_values();
        // SAFETY: non-root internal nodes are allocated with the internal
        // layout.
        unsafe {
            self.alloc
                .deallocate(NonNull::new_unchecked(node.as_ptr() as *mut u8), Self::internal_layout())
        };
    }

    fn delete_internal_root_node(&mut self, node: NodeRef<P>) {
        debug_assert!(!node.leaf());
        node.destroy_values();
        // SAFETY: internal roots are allocated with the root layout.
        unsafe {
            self.alloc
                .deallocate(NonNull::new_unchecked(node.as_ptr() as *mut u8), Self::root_layout())
        };
    }

    // ------------------------------------------------------------------
    // Locate
    // ------------------------------------------------------------------

    /// Descends from the root to the leaf position where `key` belongs.
    ///
    /// With a three-way comparator the descent reports EXACT the moment a
    /// node-level search sees the key, and the iterator may point into an
    /// internal node. With a Boolean comparator the result is always a leaf
    /// position and the second field is 0: the caller resolves equality with
    /// one more comparison against the located key.
    fn internal_locate(&self, key: &P::Key, mut iter: RawIter<P>) -> (RawIter<P>, i32) {
        if P::Compare::COMPARE_TO {
            loop {
                let node = iter.node_ref();
                let res = node.lower_bound(key, &self.comp);
                iter.position = (res & MATCH_MASK) as i32;
                if res & EXACT_MATCH != 0 {
                    return (iter, EXACT);
                }
                if node.leaf() {
                    break;
                }
                iter.set_node(node.child(iter.position as usize));
            }
            (iter, -EXACT)
        } else {
            loop {
                let node = iter.node_ref();
                iter.position = (node.lower_bound(key, &self.comp) & MATCH_MASK) as i32;
                if node.leaf() {
                    break;
                }
                iter.set_node(node.child(iter.position as usize));
            }
            (iter, 0)
        }
    }

    /// Normalizes an iterator that may sit one past the end of its node by
    /// climbing to the nearest ancestor position holding the next value.
    /// Null node on return means there is no next value.
    fn internal_last(mut iter: RawIter<P>) -> RawIter<P> {
        while iter.node().is_some() && iter.position as usize == iter.node_ref().count() {
            let node = iter.node_ref();
            iter.position = node.position() as i32;
            let parent = node.parent();
            if parent.leaf() {
                return RawIter::null();
            }
            iter.set_node(parent);
        }
        iter
    }

    fn internal_lower_bound(&self, key: &P::Key, mut iter: RawIter<P>) -> RawIter<P> {
        if iter.node().is_some() {
            loop {
                let node = iter.node_ref();
                iter.position = (node.lower_bound(key, &self.comp) & MATCH_MASK) as i32;
                if node.leaf() {
                    break;
                }
                iter.set_node(node.child(iter.position as usize));
            }
            iter = Self::internal_last(iter);
        }
        iter
    }

    fn internal_upper_bound(&self, key: &P::Key, mut iter: RawIter<P>) -> RawIter<P> {
        if iter.node().is_some() {
            loop {
                let node = iter.node_ref();
                iter.position = node.upper_bound(key, &self.comp) as i32;
                if node.leaf() {
                    break;
                }
                iter.set_node(node.child(iter.position as usize));
            }
            iter = Self::internal_last(iter);
        }
        iter
    }

    fn internal_find_unique(&self, key: &P::Key, iter: RawIter<P>) -> RawIter<P> {
        if iter.node().is_none() {
            return RawIter::null();
        }
        let (iter, res) = self.internal_locate(key, iter);
        if res == EXACT {
            return iter;
        }
        if res == 0 {
            let iter = Self::internal_last(iter);
            if iter.node().is_some() && !self.compare_keys(key, iter.key()) {
                return iter;
            }
        }
        RawIter::null()
    }

    fn internal_find_multi(&self, key: &P::Key, iter: RawIter<P>) -> RawIter<P> {
        if iter.node().is_none() {
            return RawIter::null();
        }
        let iter = self.internal_lower_bound(key, iter);
        if iter.node().is_some() && !self.compare_keys(key, iter.key()) {
            return iter;
        }
        RawIter::null()
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Iterator at the key, or the null sentinel if absent.
    #[inline]
    pub(crate) fn find_unique(&self, key: &P::Key) -> RawIter<P> {
        self.internal_find_unique(key, RawIter::new(self.root, 0))
    }

    /// Iterator at the first value comparing equal to the key.
    #[inline]
    pub(crate) fn find_multi(&self, key: &P::Key) -> RawIter<P> {
        self.internal_find_multi(key, RawIter::new(self.root, 0))
    }

    /// Iterator at the first value whose key is not less than `key`; end()
    /// if none.
    #[inline]
    pub(crate) fn lower_bound_iter(&self, key: &P::Key) -> RawIter<P> {
        let iter = self.internal_lower_bound(key, RawIter::new(self.root, 0));
        self.internal_end(iter)
    }

    /// Iterator at the first value whose key is greater than `key`; end()
    /// if none.
    #[inline]
    pub(crate) fn upper_bound_iter(&self, key: &P::Key) -> RawIter<P> {
        let iter = self.internal_upper_bound(key, RawIter::new(self.root, 0));
        self.internal_end(iter)
    }

    pub(crate) fn count_unique(&self, key: &P::Key) -> usize {
        if self.find_unique(key).node().is_some() {
            1
        } else {
            0
        }
    }

    pub(crate) fn count_multi(&self, key: &P::Key) -> usize {
        distance(self.lower_bound_iter(key), self.upper_bound_iter(key))
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Inserts `value` if its key is not already present. On a duplicate the
    /// value is handed back untouched along with the iterator at the
    /// existing entry.
    pub(crate) fn insert_unique(&mut self, value: P::Value) -> (RawIter<P>, Option<P::Value>) {
        if self.root.is_none() {
            self.root = Some(self.new_leaf_root_node(1));
        }

        let (iter, res) = self.internal_locate(P::key(&value), RawIter::new(self.root, 0));
        if res == EXACT {
            return (Self::internal_last(iter), Some(value));
        }
        if res == 0 {
            let last = Self::internal_last(iter);
            if last.node().is_some() && !self.compare_keys(P::key(&value), last.key()) {
                return (last, Some(value));
            }
        }
        (self.internal_insert(iter, value), None)
    }

    /// Insert-if-absent with a deferred value: `make` runs only when the key
    /// is not already present, so callers with expensive values pay nothing
    /// on the duplicate path.
    pub(crate) fn insert_unique_with<F>(&mut self, key: P::Key, make: F) -> (RawIter<P>, bool)
    where
        F: FnOnce(P::Key) -> P::Value,
    {
        if self.root.is_none() {
            self.root = Some(self.new_leaf_root_node(1));
        }

        let (iter, res) = self.internal_locate(&key, RawIter::new(self.root, 0));
        if res == EXACT {
            return (Self::internal_last(iter), false);
        }
        if res == 0 {
            let last = Self::internal_last(iter);
            if last.node().is_some() && !self.compare_keys(&key, last.key()) {
                return (last, false);
            }
        }
        let value = make(key);
        (self.internal_insert(iter, value), true)
    }

    /// Hinted unique insert: if the value belongs immediately before
    /// `position` the insert is amortized O(1); otherwise this falls back to
    /// the full locate.
    pub(crate) fn insert_unique_hint(
        &mut self,
        position: RawIter<P>,
        value: P::Value,
    ) -> (RawIter<P>, Option<P::Value>) {
        if !self.is_empty() {
            let key = P::key(&value);
            let end = self.raw_end();
            if position == end || self.compare_keys(key, position.key()) {
                let after_prev = position == self.raw_begin() || {
                    let mut prev = position;
                    prev.decrement();
                    self.compare_keys(prev.key(), key)
                };
                if after_prev {
                    // prev.key() < key < position.key()
                    return (self.internal_insert(position, value), None);
                }
            } else if self.compare_keys(position.key(), key) {
                let mut next = position;
                next.increment();
                if next == end || self.compare_keys(key, next.key()) {
                    // position.key() < key < next.key()
                    return (self.internal_insert(next, value), None);
                }
            } else {
                // position.key() == key
                return (position, Some(value));
            }
        }
        self.insert_unique(value)
    }

    /// Inserts `value`, allowing duplicate keys; lands after any equal run.
    pub(crate) fn insert_multi(&mut self, value: P::Value) -> RawIter<P> {
        if self.root.is_none() {
            self.root = Some(self.new_leaf_root_node(1));
        }

        let iter = self.internal_upper_bound(P::key(&value), RawIter::new(self.root, 0));
        let iter = self.internal_end(iter);
        self.internal_insert(iter, value)
    }

    /// Hinted multi insert; non-strict bounds because duplicates are legal.
    pub(crate) fn insert_multi_hint(&mut self, position: RawIter<P>, value: P::Value) -> RawIter<P> {
        if !self.is_empty() {
            let key = P::key(&value);
            let end = self.raw_end();
            if position == end || !self.compare_keys(position.key(), key) {
                let after_prev = position == self.raw_begin() || {
                    let mut prev = position;
                    prev.decrement();
                    !self.compare_keys(key, prev.key())
                };
                if after_prev {
                    // prev.key() <= key <= position.key()
                    return self.internal_insert(position, value);
                }
            } else {
                let mut next = position;
                next.increment();
                if next == end || !self.compare_keys(next.key(), key) {
                    // position.key() < key <= next.key()
                    return self.internal_insert(next, value);
                }
            }
        }
        self.insert_multi(value)
    }

    /// Inserts `value` immediately before `iter`. The caller has established
    /// that this is the right spot.
    fn internal_insert(&mut self, mut iter: RawIter<P>, value: P::Value) -> RawIter<P> {
        if !iter.node_ref().leaf() {
            // Values can only be inserted on leaves. The in-order
            // predecessor of an internal position is the last value of a
            // leaf; insert just past it.
            iter.decrement();
            iter.position += 1;
        }

        let node = iter.node_ref();
        if node.count() == node.max_count() {
            if node.max_count() < Node::<P>::CAPACITY {
                // A leaf root below full size grows by reallocating, doubling
                // until it reaches the full node capacity.
                debug_assert!(Some(node) == self.root);
                let old_root = self.root.unwrap();
                let bigger =
                    self.new_leaf_root_node(Node::<P>::CAPACITY.min(2 * node.max_count()));
                bigger.swap_contents(old_root);
                self.delete_leaf_node(old_root);
                self.root = Some(bigger);
                iter.set_node(bigger);
            } else {
                self.rebalance_or_split(&mut iter);
                // rebalance_or_split promotes a full leaf root first, so the
                // root is internal here and carries the size.
                let root = self.root.unwrap();
                root.set_tree_size(root.tree_size() + 1);
            }
        } else if !self.root.unwrap().leaf() {
            let root = self.root.unwrap();
            root.set_tree_size(root.tree_size() + 1);
        }
        iter.node_ref().insert_value(iter.position as usize, value);
        iter
    }

    /// Makes room at the full node `iter` points into: borrow toward a
    /// sibling with slack, else split, recursing up first when the parent
    /// itself is full. `iter` is retargeted to where the pending insertion
    /// should now go.
    fn rebalance_or_split(&mut self, iter: &mut RawIter<P>) {
        let mut node = iter.node_ref();
        let mut insert_position = iter.position;
        debug_assert_eq!(node.count(), node.max_count());

        let mut parent = node.parent();
        let root = self.root.unwrap();
        if node != root {
            if node.position() > 0 {
                // Try rebalancing with the left sibling. The amount moved is
                // biased by where the insertion lands: inserting at the far
                // right end means the left sibling can swallow all the slack.
                let left = parent.child(node.position() - 1);
                if left.count() < left.max_count() {
                    let denom = 1 + ((insert_position as usize) < left.max_count()) as usize;
                    let to_move = ((left.max_count() - left.count()) / denom).max(1);

                    if insert_position as usize >= to_move
                        || left.count() + to_move < left.max_count()
                    {
                        left.rebalance_right_to_left(node, to_move);

                        debug_assert_eq!(node.max_count() - node.count(), to_move);
                        insert_position -= to_move as i32;
                        if insert_position < 0 {
                            insert_position += left.count() as i32 + 1;
                            node = left;
                        }

                        debug_assert!(node.count() < node.max_count());
                        *iter = RawIter::new_at(node, insert_position);
                        return;
                    }
                }
            }

            if node.position() < parent.count() {
                // Try rebalancing with the right sibling, mirrored bias.
                let right = parent.child(node.position() + 1);
                if right.count() < right.max_count() {
                    let denom = 1 + (insert_position > 0) as usize;
                    let to_move = ((right.max_count() - right.count()) / denom).max(1);

                    if insert_position as usize <= node.count() - to_move
                        || right.count() + to_move < right.max_count()
                    {
                        node.rebalance_left_to_right(right, to_move);

                        if insert_position as usize > node.count() {
                            insert_position -= node.count() as i32 + 1;
                            node = right;
                        }

                        debug_assert!(node.count() < node.max_count());
                        *iter = RawIter::new_at(node, insert_position);
                        return;
                    }
                }
            }

            // No sibling slack. The split pushes a value into the parent, so
            // make room there first.
            if parent.count() == parent.max_count() {
                let mut parent_iter = RawIter::new_at(parent, node.position() as i32);
                self.rebalance_or_split(&mut parent_iter);
            }
        } else if root.leaf() {
            // The root is a full leaf: grow the tree a level. The new root
            // takes over the metadata; the old leaf stays the leftmost.
            parent = self.new_internal_root_node();
            parent.set_child(0, root);
            self.root = Some(parent);
            debug_assert!(self.root.unwrap().rightmost() == parent.child(0));
        } else {
            // An internal root never splits in place: it holds the size and
            // rightmost fields and its object identity must survive. Demote
            // its contents into a fresh internal node and split that.
            parent = self.new_internal_node(parent);
            parent.set_child(0, parent);
            parent.swap_contents(root);
            node = parent;
        }

        let split_node;
        if node.leaf() {
            split_node = self.new_leaf_node(parent);
            node.split(split_node, insert_position as usize);
            if self.rightmost_node() == Some(node) {
                self.root.unwrap().set_rightmost(split_node);
            }
        } else {
            split_node = self.new_internal_node(parent);
            node.split(split_node, insert_position as usize);
        }

        if insert_position as usize > node.count() {
            insert_position -= node.count() as i32 + 1;
            node = split_node;
        }
        *iter = RawIter::new_at(node, insert_position);
    }

    // ------------------------------------------------------------------
    // Erase
    // ------------------------------------------------------------------

    /// Erases the value at `iter` (which must not be end()), returning the
    /// iterator at its in-order successor and the removed value.
    pub(crate) fn erase(&mut self, mut iter: RawIter<P>) -> (RawIter<P>, P::Value) {
        let mut internal_delete = false;
        if !iter.node_ref().leaf() {
            // Deleting from an internal node: swap with the in-order
            // predecessor, which one decrement lands on a leaf, then delete
            // there.
            let target = iter;
            iter.decrement();
            debug_assert!(iter.node_ref().leaf());
            debug_assert!(!self.compare_keys(target.key(), iter.key()));
            // SAFETY: the two slots are live values in distinct nodes.
            unsafe { ptr::swap(iter.value_ptr(), target.value_ptr()) };
            internal_delete = true;
            let root = self.root.unwrap();
            root.set_tree_size(root.tree_size() - 1);
        } else if !self.root.unwrap().leaf() {
            let root = self.root.unwrap();
            root.set_tree_size(root.tree_size() - 1);
        }

        let value = iter.node_ref().remove_value(iter.position as usize);

        // Walk back up repairing undersized nodes; remember the deepest leaf
        // position, which is where the successor ends up.
        let mut res = iter;
        loop {
            if Some(iter.node_ref()) == self.root {
                self.try_shrink();
                if self.is_empty() {
                    return (self.raw_end(), value);
                }
                break;
            }
            if iter.node_ref().count() >= Node::<P>::MIN_COUNT {
                break;
            }
            let merged = self.try_merge_or_rebalance(&mut iter);
            if iter.node_ref().leaf() {
                res = iter;
            }
            if !merged {
                break;
            }
            let parent = iter.node_ref().parent();
            iter.set_node(parent);
        }

        // Pointing one past the end of a node means the successor is the
        // next in-order value.
        if res.position == res.node_ref().count() as i32 {
            res.position = res.node_ref().count() as i32 - 1;
            res.increment();
        }
        // An internal-node delete swapped the target down; its successor is
        // one further on.
        if internal_delete {
            res.increment();
        }
        (res, value)
    }

    /// Erases `[begin, end)`, one value at a time (each erase invalidates
    /// the rest of the range, so the successor iterator drives the loop).
    pub(crate) fn erase_range(&mut self, begin: RawIter<P>, end: RawIter<P>) -> usize {
        let count = distance(begin, end);
        let mut iter = begin;
        for _ in 0..count {
            iter = self.erase(iter).0;
        }
        count
    }

    /// Erases the value with the given key, if present.
    pub(crate) fn erase_unique(&mut self, key: &P::Key) -> Option<P::Value> {
        let iter = self.find_unique(key);
        iter.node()?;
        Some(self.erase(iter).1)
    }

    /// Erases every value comparing equal to `key`; returns how many.
    pub(crate) fn erase_multi(&mut self, key: &P::Key) -> usize {
        let begin = self.internal_lower_bound(key, RawIter::new(self.root, 0));
        if begin.node().is_none() {
            return 0;
        }
        let end = self.upper_bound_iter(key);
        self.erase_range(begin, end)
    }

    /// Repairs the undersized node at `iter`: merge into a sibling when the
    /// combined counts fit, else rebalance from the fuller sibling. Returns
    /// true if a merge consumed the node.
    fn try_merge_or_rebalance(&mut self, iter: &mut RawIter<P>) -> bool {
        let node = iter.node_ref();
        let parent = node.parent();

        if node.position() > 0 {
            let left = parent.child(node.position() - 1);
            if 1 + left.count() + node.count() <= left.max_count() {
                iter.position += 1 + left.count() as i32;
                self.merge_nodes(left, node);
                iter.set_node(left);
                return true;
            }
        }
        if node.position() < parent.count() {
            let right = parent.child(node.position() + 1);
            if 1 + node.count() + right.count() <= right.max_count() {
                self.merge_nodes(node, right);
                return true;
            }
            // Skip the rebalance when the deletion took the first value of a
            // non-empty node: FIFO deletion patterns hit this spot every
            // time, and the next operation repairs the node anyway.
            if right.count() > Node::<P>::MIN_COUNT
                && (node.count() == 0 || iter.position > 0)
            {
                let to_move = ((right.count() - node.count()) / 2).min(right.count() - 1);
                node.rebalance_right_to_left(right, to_move);
                return false;
            }
        }
        if node.position() > 0 {
            // Mirror case for LIFO deletion at the back.
            let left = parent.child(node.position() - 1);
            if left.count() > Node::<P>::MIN_COUNT
                && (node.count() == 0 || (iter.position as usize) < node.count())
            {
                let to_move = ((left.count() - node.count()) / 2).min(left.count() - 1);
                left.rebalance_left_to_right(node, to_move);
                iter.position += to_move as i32;
                return false;
            }
        }
        false
    }

    fn merge_nodes(&mut self, left: NodeRef<P>, right: NodeRef<P>) {
        left.merge(right);
        if right.leaf() {
            if self.rightmost_node() == Some(right) {
                self.root.unwrap().set_rightmost(left);
            }
            self.delete_leaf_node(right);
        } else {
            self.delete_internal_node(right);
        }
    }

    /// Shrinks the tree a level after an erase emptied the root.
    fn try_shrink(&mut self) {
        let root = self.root.unwrap();
        if root.count() > 0 {
            return;
        }
        if root.leaf() {
            debug_assert_eq!(self.size(), 0);
            self.delete_leaf_node(root);
            self.root = None;
        } else {
            let child = root.child(0);
            if child.leaf() {
                // The lone child is a leaf: it becomes the root, closing the
                // leftmost cycle on itself.
                child.make_root();
                self.delete_internal_root_node(root);
                self.root = Some(child);
            } else {
                // The lone child is internal: keep the root object (it holds
                // size and rightmost) and absorb the child's contents.
                child.swap_contents(root);
                self.delete_internal_node(child);
            }
        }
    }

    // ------------------------------------------------------------------
    // Clear / assign / swap
    // ------------------------------------------------------------------

    /// Drops every value and frees every node.
    pub fn clear(&mut self) {
        if let Some(root) = self.root {
            self.internal_clear(root);
        }
        self.root = None;
    }

    fn internal_clear(&mut self, node: NodeRef<P>) {
        if node.leaf() {
            self.delete_leaf_node(node);
        } else {
            for i in 0..=node.count() {
                self.internal_clear(node.child(i));
            }
            if Some(node) == self.root {
                self.delete_internal_root_node(node);
            } else {
                self.delete_internal_node(node);
            }
        }
    }

    /// Replaces this tree's contents with a copy of `other`'s. The source
    /// order is already sorted, so every value is appended at the end with
    /// no comparisons.
    pub fn assign(&mut self, other: &Self)
    where
        P::Value: Clone,
        A: Clone,
    {
        self.clear();
        self.comp = other.comp.clone();
        self.alloc = other.alloc.clone();

        let mut iter = other.raw_begin();
        let end = other.raw_end();
        while iter != end {
            let value = iter.value().clone();
            if self.is_empty() {
                self.insert_multi(value);
            } else {
                let at_end = self.raw_end();
                self.internal_insert(at_end, value);
            }
            iter.increment();
        }
    }

    /// Swaps the contents of two trees.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.root, &mut other.root);
        mem::swap(&mut self.comp, &mut other.comp);
        mem::swap(&mut self.alloc, &mut other.alloc);
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Tree height; an empty tree has height 0.
    pub fn height(&self) -> usize {
        let mut height = 0;
        if let Some(root) = self.root {
            // The chain from the root through the leftmost leaf back up to
            // the root has one link per level.
            let mut node = root;
            loop {
                height += 1;
                node = node.parent();
                if node == root {
                    break;
                }
            }
        }
        height
    }

    fn internal_stats(&self, node: Option<NodeRef<P>>) -> NodeStats {
        let Some(node) = node else {
            return NodeStats::default();
        };
        if node.leaf() {
            return NodeStats { leaf_nodes: 1, internal_nodes: 0 };
        }
        let mut stats = NodeStats { leaf_nodes: 0, internal_nodes: 1 };
        for i in 0..=node.count() {
            let child = self.internal_stats(Some(node.child(i)));
            stats.leaf_nodes += child.leaf_nodes;
            stats.internal_nodes += child.internal_nodes;
        }
        stats
    }

    pub fn leaf_nodes(&self) -> usize {
        self.internal_stats(self.root).leaf_nodes
    }

    pub fn internal_nodes(&self) -> usize {
        self.internal_stats(self.root).internal_nodes
    }

    pub fn nodes(&self) -> usize {
        let stats = self.internal_stats(self.root);
        stats.leaf_nodes + stats.internal_nodes
    }

    /// Total bytes held by the tree and its nodes.
    pub fn bytes_used(&self) -> usize {
        let stats = self.internal_stats(self.root);
        if stats.leaf_nodes == 1 && stats.internal_nodes == 0 {
            mem::size_of::<Self>() + Node::<P>::leaf_size(self.root.unwrap().max_count())
        } else {
            mem::size_of::<Self>()
                + (Node::<P>::ROOT_SIZE - Node::<P>::INTERNAL_SIZE)
                + stats.leaf_nodes * Node::<P>::leaf_size(Node::<P>::CAPACITY)
                + stats.internal_nodes * Node::<P>::INTERNAL_SIZE
        }
    }

    /// Bytes per value on a leaf node that is 75% full, which matches the
    /// observed fill of randomly built trees.
    pub fn average_bytes_per_value() -> f64 {
        Node::<P>::leaf_size(Node::<P>::CAPACITY) as f64 / (Node::<P>::CAPACITY as f64 * 0.75)
    }

    /// Stored values divided by total value slots; 1.0 is perfect packing.
    pub fn fullness(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.size() as f64 / (self.nodes() * Node::<P>::CAPACITY) as f64
    }

    /// Structural overhead in bytes per stored value.
    pub fn overhead(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        (self.bytes_used() - self.size() * mem::size_of::<P::Value>()) as f64 / self.size() as f64
    }

    /// Writes every key in order, one per line, indented by depth with the
    /// depth in brackets.
    pub fn dump<W: fmt::Write>(&self, out: &mut W) -> fmt::Result
    where
        P::Key: fmt::Display,
    {
        if let Some(root) = self.root {
            self.dump_node(out, root, 0)?;
        }
        Ok(())
    }

    fn dump_node<W: fmt::Write>(&self, out: &mut W, node: NodeRef<P>, level: usize) -> fmt::Result
    where
        P::Key: fmt::Display,
    {
        for i in 0..node.count() {
            if !node.leaf() {
                self.dump_node(out, node.child(i), level + 1)?;
            }
            for _ in 0..level {
                out.write_str("  ")?;
            }
            writeln!(out, "{} [{}]", node.key(i), level)?;
        }
        if !node.leaf() {
            self.dump_node(out, node.child(node.count()), level + 1)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Verification
    // ------------------------------------------------------------------

    /// Panics if any structural invariant is broken.
    pub fn verify(&self) {
        if let Err(err) = self.try_verify() {
            panic!("btree invariant violated: {err}");
        }
    }

    /// Checks every structural invariant, returning the first violation.
    pub fn try_verify(&self) -> Result<(), VerifyError> {
        let Some(root) = self.root else {
            return Ok(());
        };

        let mut leaf_depth = None;
        let actual = self.verify_node(root, None, None, 0, &mut leaf_depth)?;
        let recorded = self.size();
        if actual != recorded {
            return Err(VerifyError::SizeMismatch { recorded, actual });
        }

        // The leftmost leaf is the root's parent; the rightmost leaf is the
        // root's rightmost field. Both must agree with actual traversal.
        let mut first = RawIter::new_at(root, -1);
        first.increment();
        if self.leftmost_node() != first.node()
            || !self.leftmost_node().is_some_and(NodeRef::leaf)
        {
            return Err(VerifyError::BadLeftmost);
        }
        let mut last = RawIter::new_at(root, root.count() as i32);
        last.decrement();
        if self.rightmost_node() != last.node()
            || !self.rightmost_node().is_some_and(NodeRef::leaf)
        {
            return Err(VerifyError::BadRightmost);
        }
        Ok(())
    }

    fn verify_node(
        &self,
        node: NodeRef<P>,
        lo: Option<&P::Key>,
        hi: Option<&P::Key>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
    ) -> Result<usize, VerifyError> {
        let count = node.count();
        if count == 0 || count > node.max_count() {
            return Err(VerifyError::BadCount { count, max: node.max_count() });
        }
        if let Some(lo) = lo {
            if self.compare_keys(node.key(0), lo) {
                return Err(VerifyError::OutOfBounds { position: 0 });
            }
        }
        if let Some(hi) = hi {
            if self.compare_keys(hi, node.key(count - 1)) {
                return Err(VerifyError::OutOfBounds { position: count - 1 });
            }
        }
        for i in 1..count {
            if self.compare_keys(node.key(i), node.key(i - 1)) {
                return Err(VerifyError::OutOfOrder { position: i });
            }
        }

        if node.leaf() {
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(expected) if expected != depth => {
                    return Err(VerifyError::UnevenDepth { expected, found: depth });
                }
                Some(_) => {}
            }
            return Ok(count);
        }

        let mut total = count;
        for i in 0..=count {
            let Some(child) = node.child_or_null(i) else {
                return Err(VerifyError::MissingChild { position: i });
            };
            if child.parent() != node {
                return Err(VerifyError::BadParentLink { position: i });
            }
            if child.position() != i {
                return Err(VerifyError::BadChildPosition { position: i, recorded: child.position() });
            }
            let child_lo = if i == 0 { lo } else { Some(node.key(i - 1)) };
            let child_hi = if i == count { hi } else { Some(node.key(i)) };
            total += self.verify_node(child, child_lo, child_hi, depth + 1, leaf_depth)?;
        }
        Ok(total)
    }
}

impl<P: TreeParams, A: RawAllocator> Drop for BTree<P, A> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<P: TreeParams, A: RawAllocator + Clone> Clone for BTree<P, A>
where
    P::Value: Clone,
{
    fn clone(&self) -> Self {
        let mut tree = BTree::new(self.comp.clone(), self.alloc.clone());
        tree.assign(self);
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{OrdCompareTo, OrdLess};
    use crate::params::SetParams;

    type IntTree = BTree<SetParams<i64>>;

    fn with_values(values: impl IntoIterator<Item = i64>) -> IntTree {
        let mut tree = IntTree::new(OrdLess, Heap);
        for v in values {
            assert!(tree.insert_unique(v).1.is_none());
        }
        tree
    }

    #[test]
    fn test_insert_and_find() {
        let tree = with_values([5, 3, 8, 1, 9]);
        assert_eq!(tree.size(), 5);
        for k in [1, 3, 5, 8, 9] {
            assert!(tree.find_unique(&k).node().is_some(), "missing {k}");
        }
        assert!(tree.find_unique(&2).node().is_none());
        tree.verify();
    }

    #[test]
    fn test_duplicate_insert_hands_value_back() {
        let mut tree = with_values([1, 2, 3]);
        let (_, rejected) = tree.insert_unique(2);
        assert_eq!(rejected, Some(2));
        assert_eq!(tree.size(), 3);
    }

    #[test]
    fn test_grow_through_root_promotions() {
        // Enough values to force several levels with the default 256-byte
        // nodes, exercising consecutive internal-root splits.
        let tree = with_values(0..20_000);
        assert_eq!(tree.size(), 20_000);
        assert!(tree.height() >= 3);
        tree.verify();

        let collected: Vec<i64> = tree.iter().copied().collect();
        assert!(collected.iter().zip(collected.iter().skip(1)).all(|(a, b)| a < b));
        assert_eq!(collected.len(), 20_000);
    }

    #[test]
    fn test_erase_to_empty_shrinks_root() {
        let mut tree = with_values(0..500);
        for k in 0..500 {
            assert!(tree.erase_unique(&k).is_some(), "missing {k}");
            tree.verify();
        }
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn test_erase_returns_successor() {
        let mut tree = with_values([10, 20, 30]);
        let iter = tree.find_unique(&20);
        let (next, removed) = tree.erase(iter);
        assert_eq!(removed, 20);
        assert_eq!(*next.key(), 30);
    }

    #[test]
    fn test_multi_insert_keeps_duplicates() {
        let mut tree = IntTree::new(OrdLess, Heap);
        for _ in 0..10 {
            tree.insert_multi(7);
        }
        tree.insert_multi(3);
        tree.insert_multi(9);
        assert_eq!(tree.size(), 12);
        assert_eq!(tree.count_multi(&7), 10);
        tree.verify();
        assert_eq!(tree.erase_multi(&7), 10);
        assert_eq!(tree.size(), 2);
        tree.verify();
    }

    #[test]
    fn test_hint_insert_at_end() {
        let mut tree = IntTree::new(OrdLess, Heap);
        for v in 0..1000 {
            let end = tree.raw_end();
            assert!(tree.insert_unique_hint(end, v).1.is_none());
        }
        assert_eq!(tree.size(), 1000);
        tree.verify();
    }

    #[test]
    fn test_three_way_comparator_over_strings() {
        let mut tree: BTree<SetParams<String, OrdCompareTo>> = BTree::new(OrdCompareTo, Heap);
        for word in ["pear", "apple", "fig", "apple", "date"] {
            tree.insert_unique(word.to_string());
        }
        assert_eq!(tree.size(), 4);
        assert!(tree.find_unique(&"fig".to_string()).node().is_some());
        assert!(tree.find_unique(&"kiwi".to_string()).node().is_none());
        let words: Vec<&String> = tree.iter().collect();
        assert_eq!(words, ["apple", "date", "fig", "pear"]);
        tree.verify();
    }

    #[test]
    fn test_dump_format() {
        let tree = with_values([2, 1, 3]);
        let mut out = String::new();
        tree.dump(&mut out).unwrap();
        assert_eq!(out, "1 [0]\n2 [0]\n3 [0]\n");
    }

    #[test]
    fn test_assign_deep_copies() {
        let source = with_values(0..300);
        let mut copy = IntTree::new(OrdLess, Heap);
        copy.assign(&source);
        assert_eq!(copy.size(), 300);
        copy.verify();
        let a: Vec<i64> = source.iter().copied().collect();
        let b: Vec<i64> = copy.iter().copied().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bytes_and_fullness() {
        let tree = with_values(0..1000);
        assert!(tree.bytes_used() > 0);
        assert!(tree.fullness() > 0.5 && tree.fullness() <= 1.0);
        assert!(tree.overhead() > 0.0);
        assert!(IntTree::average_bytes_per_value() > 8.0);
    }
}
