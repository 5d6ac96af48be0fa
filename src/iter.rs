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

//! Bidirectional in-order traversal
//!
//! An iterator is a (node, position) pair. Position −1 means "just before
//! the first slot of a leaf" and `count` means "just after the last"; both
//! arise transiently while stepping. end() is (rightmost leaf, its count).
//!
//! Stepping off the edge of a leaf walks the parent chain. Because the
//! root's parent is the leftmost leaf, the walk's termination test is
//! `is_root()` (one leaf check), never a null check. A full scan touches
//! each edge twice, so iteration is O(1) amortized per step.

use std::marker::PhantomData;

use crate::node::{Node, NodeRef};
use crate::params::TreeParams;

/// The raw (node, position) cursor the tree works in terms of.
///
/// A null node is the "not found" sentinel inside the tree and the end
/// iterator of an empty tree. Any insert or erase may invalidate any cursor.
pub(crate) struct RawIter<P: TreeParams> {
    node: *mut Node<P>,
    pub(crate) position: i32,
}

impl<P: TreeParams> Clone for RawIter<P> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: TreeParams> Copy for RawIter<P> {}

impl<P: TreeParams> PartialEq for RawIter<P> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.position == other.position
    }
}

impl<P: TreeParams> Eq for RawIter<P> {}

impl<P: TreeParams> RawIter<P> {
    #[inline]
    pub(crate) fn new(node: Option<NodeRef<P>>, position: i32) -> Self {
        RawIter {
            node: node.map_or(std::ptr::null_mut(), NodeRef::as_ptr),
            position,
        }
    }

    #[inline]
    pub(crate) fn new_at(node: NodeRef<P>, position: i32) -> Self {
        RawIter { node: node.as_ptr(), position }
    }

    #[inline]
    pub(crate) fn null() -> Self {
        RawIter { node: std::ptr::null_mut(), position: 0 }
    }

    #[inline]
    pub(crate) fn node(&self) -> Option<NodeRef<P>> {
        NodeRef::from_raw(self.node)
    }

    /// The node under the cursor. Must not be the null sentinel.
    #[inline]
    pub(crate) fn node_ref(&self) -> NodeRef<P> {
        debug_assert!(!self.node.is_null());
        NodeRef::from_raw(self.node).unwrap()
    }

    #[inline]
    pub(crate) fn set_node(&mut self, node: NodeRef<P>) {
        self.node = node.as_ptr();
    }

    #[inline]
    pub(crate) fn key<'a>(&self) -> &'a P::Key
    where
        P::Value: 'a,
    {
        self.node_ref().key(self.position as usize)
    }

    #[inline]
    pub(crate) fn value_ptr(&self) -> *mut P::Value {
        self.node_ref().value_ptr(self.position as usize)
    }

    #[inline]
    pub(crate) fn value<'a>(&self) -> &'a P::Value {
        self.node_ref().value(self.position as usize)
    }

    /// Advances to the in-order successor. Must not be at end().
    #[inline]
    pub(crate) fn increment(&mut self) {
        let node = self.node_ref();
        if node.leaf() {
            self.position += 1;
            if (self.position as usize) < node.count() {
                return;
            }
        }
        self.increment_slow();
    }

    pub(crate) fn increment_slow(&mut self) {
        let node = self.node_ref();
        if node.leaf() {
            debug_assert!(self.position as usize >= node.count());
            let save = *self;
            while self.position as usize == self.node_ref().count() && !self.node_ref().is_root() {
                let n = self.node_ref();
                debug_assert!(n.parent().child(n.position()) == n);
                self.position = n.position() as i32;
                self.set_node(n.parent());
            }
            if self.position as usize == self.node_ref().count() {
                // Walked off the rightmost edge: we were at end().
                *self = save;
            }
        } else {
            debug_assert!(self.position < node.count() as i32);
            let mut n = node.child((self.position + 1) as usize);
            while !n.leaf() {
                n = n.child(0);
            }
            self.set_node(n);
            self.position = 0;
        }
    }

    /// Advances `count` steps, jumping leaf-locally where possible. Linear
    /// in `count` with one up-and-over per crossed node boundary.
    pub(crate) fn increment_by(&mut self, mut count: usize) {
        while count > 0 {
            let node = self.node_ref();
            if node.leaf() {
                let rest = node.count() - self.position as usize;
                self.position += rest.min(count) as i32;
                count = count.saturating_sub(rest);
                if (self.position as usize) < node.count() {
                    return;
                }
            } else {
                count -= 1;
            }
            self.increment_slow();
        }
    }

    /// Steps to the in-order predecessor. Must not be at begin().
    #[inline]
    pub(crate) fn decrement(&mut self) {
        let node = self.node_ref();
        if node.leaf() {
            self.position -= 1;
            if self.position >= 0 {
                return;
            }
        }
        self.decrement_slow();
    }

    pub(crate) fn decrement_slow(&mut self) {
        let node = self.node_ref();
        if node.leaf() {
            debug_assert!(self.position <= -1);
            let save = *self;
            while self.position < 0 && !self.node_ref().is_root() {
                let n = self.node_ref();
                debug_assert!(n.parent().child(n.position()) == n);
                self.position = n.position() as i32 - 1;
                self.set_node(n.parent());
            }
            if self.position < 0 {
                // Walked off the leftmost edge: we were at begin().
                *self = save;
            }
        } else {
            debug_assert!(self.position >= 0);
            let mut n = node.child(self.position as usize);
            while !n.leaf() {
                n = n.child(n.count());
            }
            self.set_node(n);
            self.position = n.count() as i32 - 1;
        }
    }
}

/// Distance from `a` to `b` in forward steps. `b` must be reachable from `a`.
pub(crate) fn distance<P: TreeParams>(mut a: RawIter<P>, b: RawIter<P>) -> usize {
    let mut n = 0;
    while a != b {
        a.increment();
        n += 1;
    }
    n
}

/// A double-ended iterator over a half-open range of stored values.
///
/// This is what `iter()` and `equal_range()` hand out; map facades project
/// key/value pairs out of it. The length is known exactly, which lets `nth`
/// skip with leaf-local jumps instead of stepping.
pub struct Iter<'a, P: TreeParams> {
    front: RawIter<P>,
    back: RawIter<P>,
    remaining: usize,
    _marker: PhantomData<&'a P::Value>,
}

// SAFETY: the iterator only hands out shared references to values owned by
// the tree the lifetime borrows from.
unsafe impl<P: TreeParams> Send for Iter<'_, P> where P::Value: Sync {}
unsafe impl<P: TreeParams> Sync for Iter<'_, P> where P::Value: Sync {}

impl<'a, P: TreeParams> Iter<'a, P> {
    #[inline]
    pub(crate) fn new(front: RawIter<P>, back: RawIter<P>, remaining: usize) -> Self {
        Iter { front, back, remaining, _marker: PhantomData }
    }
}

impl<P: TreeParams> Clone for Iter<'_, P> {
    #[inline]
    fn clone(&self) -> Self {
        Iter {
            front: self.front,
            back: self.back,
            remaining: self.remaining,
            _marker: PhantomData,
        }
    }
}

impl<'a, P: TreeParams> Iterator for Iter<'a, P> {
    type Item = &'a P::Value;

    #[inline]
    fn next(&mut self) -> Option<&'a P::Value> {
        if self.front == self.back {
            return None;
        }
        let value = self.front.value();
        self.front.increment();
        self.remaining -= 1;
        Some(value)
    }

    fn nth(&mut self, n: usize) -> Option<&'a P::Value> {
        if n >= self.remaining {
            self.front = self.back;
            self.remaining = 0;
            return None;
        }
        self.front.increment_by(n);
        self.remaining -= n;
        self.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, P: TreeParams> DoubleEndedIterator for Iter<'a, P> {
    #[inline]
    fn next_back(&mut self) -> Option<&'a P::Value> {
        if self.front == self.back {
            return None;
        }
        self.back.decrement();
        self.remaining -= 1;
        Some(self.back.value())
    }
}

impl<P: TreeParams> ExactSizeIterator for Iter<'_, P> {
    #[inline]
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<P: TreeParams> std::iter::FusedIterator for Iter<'_, P> {}
