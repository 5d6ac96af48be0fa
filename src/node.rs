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

//! Node layout and in-node operations
//!
//! Every node is one contiguous allocation: a fixed header followed by the
//! value array, then (internal nodes only) the child-pointer array, then
//! (root only) the tree-wide metadata. Leaf nodes pay only for the header and
//! values; the three allocation sizes are recomputed from the node's kind at
//! free time, never stored.
//!
//! The same layout rules give the root its two special fields:
//! - `root.parent` points at the leftmost leaf (and a leaf root at itself),
//!   so `leftmost()` is O(1) and "is this the root?" is `parent().leaf()`.
//! - `rightmost` and `size` live in the root-only tail.
//!
//! Values occupy slots that are only initialized up to `count`; all moves go
//! through `ptr::read`/`ptr::write`/`ptr::copy` on raw slot pointers.

use std::cmp::Ordering;
use std::mem;
use std::ptr::{self, NonNull};

use crate::compare::{KeyCompare, UpperBoundAdapter};
use crate::params::TreeParams;

/// Flag bit set in a packed search result when the three-way comparator saw
/// an exact match during the search.
pub(crate) const EXACT_MATCH: u32 = 1 << 30;
/// Mask extracting the position from a packed search result.
pub(crate) const MATCH_MASK: u32 = EXACT_MATCH - 1;

pub(crate) const fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

/// Node header. The value array, child array and root fields follow it in
/// the same allocation at the offsets computed below.
#[repr(C)]
pub(crate) struct Node<P: TreeParams> {
    parent: *mut Node<P>,
    leaf: bool,
    position: u16,
    max_count: u16,
    count: u16,
}

/// Root-only tail: the rightmost leaf and the total value count.
#[repr(C)]
pub(crate) struct RootFields<P: TreeParams> {
    rightmost: *mut Node<P>,
    size: usize,
}

impl<P: TreeParams> Node<P> {
    const VALUE_SIZE: usize = {
        let size = mem::size_of::<P::Value>();
        if size == 0 {
            1
        } else {
            size
        }
    };

    pub(crate) const VALUES_OFFSET: usize =
        align_up(mem::size_of::<Node<P>>(), mem::align_of::<P::Value>());

    /// Values per node, derived from the target node size with a floor of 3:
    /// a split needs one value for each half plus one delimiter for the
    /// parent.
    pub(crate) const CAPACITY: usize = {
        let space = P::TARGET_NODE_SIZE.saturating_sub(Self::VALUES_OFFSET);
        let n = space / Self::VALUE_SIZE;
        if n < 3 {
            3
        } else {
            n
        }
    };

    /// Minimum live count for any non-root node.
    pub(crate) const MIN_COUNT: usize = Self::CAPACITY / 2;

    pub(crate) const CHILDREN_OFFSET: usize = align_up(
        Self::VALUES_OFFSET + Self::CAPACITY * mem::size_of::<P::Value>(),
        mem::align_of::<*mut Node<P>>(),
    );

    pub(crate) const ROOT_OFFSET: usize = align_up(
        Self::CHILDREN_OFFSET + (Self::CAPACITY + 1) * mem::size_of::<*mut Node<P>>(),
        mem::align_of::<RootFields<P>>(),
    );

    pub(crate) const ALIGN: usize = {
        let a = mem::align_of::<Node<P>>();
        let b = mem::align_of::<P::Value>();
        if a > b {
            a
        } else {
            b
        }
    };

    pub(crate) const INTERNAL_SIZE: usize = Self::ROOT_OFFSET;
    pub(crate) const ROOT_SIZE: usize = Self::ROOT_OFFSET + mem::size_of::<RootFields<P>>();

    /// Size of a leaf allocation holding `max_count` value slots.
    pub(crate) const fn leaf_size(max_count: usize) -> usize {
        Self::VALUES_OFFSET + max_count * mem::size_of::<P::Value>()
    }
}

/// A non-owning reference to a node.
///
/// The tree owns every node it reaches from its root; a `NodeRef` is valid
/// for as long as that node has not been freed. All methods assume a live
/// node. This is the raw-pointer rendition of the parent/child/leftmost/
/// rightmost back-references the structure needs; none of them own anything.
pub(crate) struct NodeRef<P: TreeParams> {
    ptr: NonNull<Node<P>>,
}

impl<P: TreeParams> Clone for NodeRef<P> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: TreeParams> Copy for NodeRef<P> {}

impl<P: TreeParams> PartialEq for NodeRef<P> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<P: TreeParams> Eq for NodeRef<P> {}

impl<P: TreeParams> NodeRef<P> {
    #[inline]
    pub(crate) fn from_raw(ptr: *mut Node<P>) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| NodeRef { ptr })
    }

    #[inline]
    pub(crate) fn as_ptr(self) -> *mut Node<P> {
        self.ptr.as_ptr()
    }

    #[inline]
    fn base(self) -> *mut u8 {
        self.ptr.as_ptr() as *mut u8
    }

    // ------------------------------------------------------------------
    // Header fields
    // ------------------------------------------------------------------

    #[inline]
    pub(crate) fn leaf(self) -> bool {
        // SAFETY: self points to a live node; the header is always valid.
        unsafe { (*self.as_ptr()).leaf }
    }

    #[inline]
    pub(crate) fn position(self) -> usize {
        unsafe { (*self.as_ptr()).position as usize }
    }

    #[inline]
    pub(crate) fn set_position(self, position: usize) {
        unsafe { (*self.as_ptr()).position = position as u16 }
    }

    #[inline]
    pub(crate) fn count(self) -> usize {
        unsafe { (*self.as_ptr()).count as usize }
    }

    #[inline]
    pub(crate) fn set_count(self, count: usize) {
        debug_assert!(count <= self.max_count());
        unsafe { (*self.as_ptr()).count = count as u16 }
    }

    #[inline]
    pub(crate) fn max_count(self) -> usize {
        unsafe { (*self.as_ptr()).max_count as usize }
    }

    #[inline]
    pub(crate) fn parent(self) -> NodeRef<P> {
        // SAFETY: a live node's parent pointer is never null; the root's
        // parent is the leftmost leaf and a lone leaf root points at itself.
        unsafe { NodeRef { ptr: NonNull::new_unchecked((*self.as_ptr()).parent) } }
    }

    #[inline]
    pub(crate) fn set_parent(self, parent: NodeRef<P>) {
        unsafe { (*self.as_ptr()).parent = parent.as_ptr() }
    }

    /// The parent of the root is the leftmost leaf, so this test needs no
    /// dedicated flag and no null check.
    #[inline]
    pub(crate) fn is_root(self) -> bool {
        self.parent().leaf()
    }

    /// Re-establishes the root parent cycle when this node becomes the root:
    /// its parent becomes its grandparent (the old root's parent, i.e. the
    /// leftmost leaf).
    #[inline]
    pub(crate) fn make_root(self) {
        debug_assert!(self.parent().is_root());
        self.set_parent(self.parent().parent());
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    #[inline]
    pub(crate) fn value_ptr(self, i: usize) -> *mut P::Value {
        // One past the end is a legal pointer for zero-length copies.
        debug_assert!(i <= self.max_count());
        // SAFETY: the value array starts at VALUES_OFFSET and holds max_count
        // slots; i is in bounds.
        unsafe { self.base().add(Node::<P>::VALUES_OFFSET).cast::<P::Value>().add(i) }
    }

    /// The value at slot `i`. Slot must be initialized (i < count).
    ///
    /// The lifetime is the caller's responsibility: the reference is valid
    /// until the value is moved or its node freed.
    #[inline]
    pub(crate) fn value<'a>(self, i: usize) -> &'a P::Value {
        debug_assert!(i < self.count());
        unsafe { &*self.value_ptr(i) }
    }

    #[inline]
    pub(crate) fn key<'a>(self, i: usize) -> &'a P::Key
    where
        P::Value: 'a,
    {
        P::key(self.value(i))
    }

    /// Drops the live values. Called just before the node is freed.
    pub(crate) fn destroy_values(self) {
        for i in 0..self.count() {
            // SAFETY: slots 0..count are initialized; the node is about to be
            // freed, so nothing reads them afterwards.
            unsafe { ptr::drop_in_place(self.value_ptr(i)) };
        }
    }

    // ------------------------------------------------------------------
    // Children (internal nodes only)
    // ------------------------------------------------------------------

    #[inline]
    fn child_slot(self, i: usize) -> *mut *mut Node<P> {
        debug_assert!(!self.leaf());
        // One past the end is a legal pointer for zero-length copies.
        debug_assert!(i <= Node::<P>::CAPACITY + 1);
        // SAFETY: internal allocations extend through CHILDREN_OFFSET plus
        // CAPACITY + 1 pointer slots; i is in bounds.
        unsafe {
            self.base()
                .add(Node::<P>::CHILDREN_OFFSET)
                .cast::<*mut Node<P>>()
                .add(i)
        }
    }

    /// The child at slot `i`. Must exist (i <= count on a live node).
    #[inline]
    pub(crate) fn child(self, i: usize) -> NodeRef<P> {
        // SAFETY: children 0..=count are always non-null on a live internal
        // node (invariant 4).
        unsafe { NodeRef { ptr: NonNull::new_unchecked(*self.child_slot(i)) } }
    }

    #[inline]
    pub(crate) fn child_or_null(self, i: usize) -> Option<NodeRef<P>> {
        NodeRef::from_raw(unsafe { *self.child_slot(i) })
    }

    /// Installs `child` at slot `i`, fixing its parent and position.
    #[inline]
    pub(crate) fn set_child(self, i: usize, child: NodeRef<P>) {
        unsafe { *self.child_slot(i) = child.as_ptr() };
        child.set_parent(self);
        child.set_position(i);
    }

    #[inline]
    fn clear_child(self, i: usize) {
        unsafe { *self.child_slot(i) = ptr::null_mut() };
    }

    // ------------------------------------------------------------------
    // Root fields (root node only)
    // ------------------------------------------------------------------

    #[inline]
    fn root_fields(self) -> *mut RootFields<P> {
        // SAFETY: only called on the root, whose allocation extends through
        // ROOT_OFFSET plus the root fields.
        unsafe { self.base().add(Node::<P>::ROOT_OFFSET).cast::<RootFields<P>>() }
    }

    #[inline]
    pub(crate) fn rightmost(self) -> NodeRef<P> {
        unsafe { NodeRef { ptr: NonNull::new_unchecked((*self.root_fields()).rightmost) } }
    }

    #[inline]
    pub(crate) fn set_rightmost(self, node: NodeRef<P>) {
        unsafe { (*self.root_fields()).rightmost = node.as_ptr() }
    }

    #[inline]
    pub(crate) fn tree_size(self) -> usize {
        unsafe { (*self.root_fields()).size }
    }

    #[inline]
    pub(crate) fn set_tree_size(self, size: usize) {
        unsafe { (*self.root_fields()).size = size }
    }

    // ------------------------------------------------------------------
    // Initialization
    // ------------------------------------------------------------------

    /// Initializes a freshly allocated leaf.
    ///
    /// # Safety
    ///
    /// `raw` must point to at least `leaf_size(max_count)` bytes aligned to
    /// `ALIGN`; `parent` must be a live node or `raw` itself (leaf root).
    pub(crate) unsafe fn init_leaf(
        raw: *mut Node<P>,
        parent: *mut Node<P>,
        max_count: usize,
    ) -> NodeRef<P> {
        ptr::write(
            raw,
            Node {
                parent,
                leaf: true,
                position: 0,
                max_count: max_count as u16,
                count: 0,
            },
        );
        NodeRef { ptr: NonNull::new_unchecked(raw) }
    }

    /// Initializes a freshly allocated internal node. Child slots start null.
    ///
    /// # Safety
    ///
    /// `raw` must point to at least `INTERNAL_SIZE` bytes aligned to `ALIGN`.
    pub(crate) unsafe fn init_internal(raw: *mut Node<P>, parent: *mut Node<P>) -> NodeRef<P> {
        let node = Self::init_leaf(raw, parent, Node::<P>::CAPACITY);
        (*raw).leaf = false;
        ptr::write_bytes(node.child_slot(0), 0, Node::<P>::CAPACITY + 1);
        node
    }

    /// Initializes a freshly allocated internal root. `leftmost` is the old
    /// root (a leaf); it seeds the parent cycle, the rightmost pointer and
    /// the size field.
    ///
    /// # Safety
    ///
    /// `raw` must point to at least `ROOT_SIZE` bytes aligned to `ALIGN`;
    /// `leftmost` must be the live leaf the tree grew out of.
    pub(crate) unsafe fn init_root(raw: *mut Node<P>, leftmost: *mut Node<P>) -> NodeRef<P> {
        let node = Self::init_internal(raw, leftmost);
        (*node.root_fields()).rightmost = leftmost;
        (*node.root_fields()).size = (*leftmost).count as usize;
        node
    }

    // ------------------------------------------------------------------
    // In-node search
    // ------------------------------------------------------------------

    /// Position of the first value whose key is not less than `key`, packed:
    /// the low bits hold the position; EXACT_MATCH is set when the
    /// comparator's three-way path saw an exact match.
    #[inline]
    pub(crate) fn lower_bound<C: KeyCompare<P::Key>>(self, key: &P::Key, comp: &C) -> u32 {
        if P::LINEAR_SEARCH {
            if C::COMPARE_TO {
                self.linear_search_compare_to(key, comp)
            } else {
                self.linear_search_plain(key, comp)
            }
        } else if C::COMPARE_TO {
            self.binary_search_compare_to(key, comp)
        } else {
            self.binary_search_plain(key, comp)
        }
    }

    /// Position of the first value whose key is strictly greater than `key`.
    #[inline]
    pub(crate) fn upper_bound<C: KeyCompare<P::Key>>(self, key: &P::Key, comp: &C) -> usize {
        let upper = UpperBoundAdapter(comp);
        let res = if P::LINEAR_SEARCH {
            self.linear_search_plain(key, &upper)
        } else {
            self.binary_search_plain(key, &upper)
        };
        res as usize
    }

    fn linear_search_plain<C: KeyCompare<P::Key>>(self, key: &P::Key, comp: &C) -> u32 {
        let mut s = 0;
        let e = self.count();
        while s < e {
            if !comp.less(self.key(s), key) {
                break;
            }
            s += 1;
        }
        s as u32
    }

    fn linear_search_compare_to<C: KeyCompare<P::Key>>(self, key: &P::Key, comp: &C) -> u32 {
        let mut s = 0;
        let e = self.count();
        while s < e {
            match comp.compare(self.key(s), key) {
                Ordering::Equal => return s as u32 | EXACT_MATCH,
                Ordering::Greater => break,
                Ordering::Less => s += 1,
            }
        }
        s as u32
    }

    fn binary_search_plain<C: KeyCompare<P::Key>>(self, key: &P::Key, comp: &C) -> u32 {
        let mut s = 0;
        let mut e = self.count();
        while s != e {
            let mid = (s + e) / 2;
            if comp.less(self.key(mid), key) {
                s = mid + 1;
            } else {
                e = mid;
            }
        }
        s as u32
    }

    fn binary_search_compare_to<C: KeyCompare<P::Key>>(self, key: &P::Key, comp: &C) -> u32 {
        let mut s = 0;
        let mut e = self.count();
        while s != e {
            let mid = (s + e) / 2;
            match comp.compare(self.key(mid), key) {
                Ordering::Less => s = mid + 1,
                Ordering::Greater => e = mid,
                Ordering::Equal => {
                    // The result must still be the first not-less position,
                    // which is guaranteed to be another exact match.
                    e = mid;
                    while s != e {
                        let mid = (s + e) / 2;
                        if comp.compare(self.key(mid), key) == Ordering::Less {
                            s = mid + 1;
                        } else {
                            e = mid;
                        }
                    }
                    return s as u32 | EXACT_MATCH;
                }
            }
        }
        s as u32
    }

    // ------------------------------------------------------------------
    // Local structural edits
    // ------------------------------------------------------------------

    /// Inserts `value` at slot `i`, shifting values (and children, on an
    /// internal node) at positions >= i right by one. The vacated child slot
    /// i+1 is left null for the caller to fill.
    pub(crate) fn insert_value(self, i: usize, value: P::Value) {
        let count = self.count();
        debug_assert!(i <= count);
        debug_assert!(count < self.max_count());
        // SAFETY: count < max_count, so slot `count` is free; the shifted
        // range stays inside the value array.
        unsafe {
            ptr::copy(self.value_ptr(i), self.value_ptr(i + 1), count - i);
            ptr::write(self.value_ptr(i), value);
        }
        self.set_count(count + 1);

        if !self.leaf() {
            // SAFETY: internal nodes have count+1 live children; shifting
            // slots i+1..=count to i+2..=count+1 stays inside the array
            // because count < CAPACITY.
            unsafe {
                ptr::copy(self.child_slot(i + 1), self.child_slot(i + 2), count - i);
            }
            for j in (i + 2)..=(count + 1) {
                self.child(j).set_position(j);
            }
            self.clear_child(i + 1);
        }
    }

    /// Closes the gap at slot `i` after its value has been moved out,
    /// shifting later values (and children past i+1) left by one. On an
    /// internal node the child at i+1 must already be empty: deletions only
    /// ever remove a value next to a drained child.
    pub(crate) fn remove_vacated(self, i: usize) {
        let count = self.count();
        debug_assert!(i < count);
        if !self.leaf() {
            debug_assert_eq!(self.child(i + 1).count(), 0);
            // SAFETY: slots i+2..=count move to i+1..=count-1; all in bounds.
            unsafe {
                ptr::copy(self.child_slot(i + 2), self.child_slot(i + 1), count - i - 1);
            }
            for j in (i + 1)..count {
                self.child(j).set_position(j);
            }
            self.clear_child(count);
        }
        // SAFETY: values i+1..count move to i..count-1; slot count-1 becomes
        // logically dead and is excluded by the count update.
        unsafe {
            ptr::copy(self.value_ptr(i + 1), self.value_ptr(i), count - i - 1);
        }
        self.set_count(count - 1);
    }

    /// Removes and returns the value at slot `i`.
    #[inline]
    pub(crate) fn remove_value(self, i: usize) -> P::Value {
        // SAFETY: slot i is initialized; remove_vacated excludes it afterwards.
        let value = unsafe { ptr::read(self.value_ptr(i)) };
        self.remove_vacated(i);
        value
    }

    /// Moves `to_move` values from the front of `right` onto the back of
    /// `self`, rotating through the delimiting value in the parent.
    pub(crate) fn rebalance_right_to_left(self, right: NodeRef<P>, to_move: usize) {
        debug_assert!(self.parent() == right.parent());
        debug_assert_eq!(self.position() + 1, right.position());
        debug_assert!((1..=right.count()).contains(&to_move));

        let parent = self.parent();
        let pos = self.position();
        let lc = self.count();
        let rc = right.count();
        debug_assert!(lc + to_move <= self.max_count());

        // SAFETY: all slot indices are within the respective nodes' arrays:
        // self gains to_move values after lc, right loses them from its
        // front, and the parent's delimiter slot is rewritten in place.
        unsafe {
            // The delimiter moves down to the left node's tail.
            ptr::write(self.value_ptr(lc), ptr::read(parent.value_ptr(pos)));
            // The first to_move-1 right values follow it.
            ptr::copy_nonoverlapping(right.value_ptr(0), self.value_ptr(lc + 1), to_move - 1);
            // The last moved value becomes the new delimiter.
            ptr::write(parent.value_ptr(pos), ptr::read(right.value_ptr(to_move - 1)));
            // Compact the right node's survivors.
            ptr::copy(right.value_ptr(to_move), right.value_ptr(0), rc - to_move);
        }

        if !self.leaf() {
            for i in 0..to_move {
                self.set_child(lc + 1 + i, right.child(i));
            }
            for i in 0..=(rc - to_move) {
                let child = right.child(i + to_move);
                right.set_child(i, child);
                right.clear_child(i + to_move);
            }
        }

        self.set_count(lc + to_move);
        right.set_count(rc - to_move);
    }

    /// Mirror image: moves `to_move` values from the back of `self` onto the
    /// front of `dest`.
    pub(crate) fn rebalance_left_to_right(self, dest: NodeRef<P>, to_move: usize) {
        debug_assert!(self.parent() == dest.parent());
        debug_assert_eq!(self.position() + 1, dest.position());
        debug_assert!((1..=self.count()).contains(&to_move));

        let parent = self.parent();
        let pos = self.position();
        let lc = self.count();
        let rc = dest.count();
        debug_assert!(rc + to_move <= dest.max_count());

        // SAFETY: dest has room for to_move more values; the shifted and
        // copied ranges stay inside the respective arrays.
        unsafe {
            // Make room at the front of the right node.
            ptr::copy(dest.value_ptr(0), dest.value_ptr(to_move), rc);
            // The delimiter moves down into the gap's last slot.
            ptr::write(dest.value_ptr(to_move - 1), ptr::read(parent.value_ptr(pos)));
            // The left node's value before the moved block becomes the new
            // delimiter.
            ptr::write(parent.value_ptr(pos), ptr::read(self.value_ptr(lc - to_move)));
            // The remaining moved values fill the front of the gap.
            ptr::copy_nonoverlapping(self.value_ptr(lc - to_move + 1), dest.value_ptr(0), to_move - 1);
        }

        if !self.leaf() {
            for i in (0..=rc).rev() {
                let child = dest.child(i);
                dest.set_child(i + to_move, child);
                dest.clear_child(i);
            }
            for i in 1..=to_move {
                let child = self.child(lc - to_move + i);
                dest.set_child(i - 1, child);
                self.clear_child(lc - to_move + i);
            }
        }

        self.set_count(lc - to_move);
        dest.set_count(rc + to_move);
    }

    /// Splits this full node: moves a block of values to the empty sibling
    /// `dest` and promotes the largest remaining value into the parent as
    /// the delimiter. The split point is biased toward the side opposite the
    /// pending insertion so the insert lands in a non-full node.
    ///
    /// The parent must have room for the promoted value; the tree arranges
    /// that before calling.
    pub(crate) fn split(self, dest: NodeRef<P>, insert_position: usize) {
        debug_assert_eq!(dest.count(), 0);
        debug_assert!(self.parent().count() < self.parent().max_count());

        let count = self.count();
        let dest_count = if insert_position == 0 {
            count - 1
        } else if insert_position == self.max_count() {
            0
        } else {
            count / 2
        };
        // An insert at position 0 empties this node entirely; the pending
        // insertion refills it.
        let keep = count - dest_count;
        debug_assert!(keep >= 1);

        // SAFETY: the moved block [keep, count) fits at the front of the
        // empty dest; the promoted value at keep-1 is read out exactly once.
        unsafe {
            ptr::copy_nonoverlapping(self.value_ptr(keep), dest.value_ptr(0), dest_count);
        }
        dest.set_count(dest_count);
        self.set_count(keep - 1);

        let promoted = unsafe { ptr::read(self.value_ptr(keep - 1)) };
        let parent = self.parent();
        parent.insert_value(self.position(), promoted);
        parent.set_child(self.position() + 1, dest);

        if !self.leaf() {
            for i in 0..=dest_count {
                let child = self.child(keep + i);
                dest.set_child(i, child);
                self.clear_child(keep + i);
            }
        }
    }

    /// Merges the right sibling `src` into this node, pulling the delimiting
    /// value in the parent down between them. `src` is left empty; the
    /// caller frees it.
    pub(crate) fn merge(self, src: NodeRef<P>) {
        debug_assert!(self.parent() == src.parent());
        debug_assert_eq!(self.position() + 1, src.position());

        let parent = self.parent();
        let pos = self.position();
        let lc = self.count();
        let sc = src.count();
        debug_assert!(1 + lc + sc <= self.max_count());

        // SAFETY: the combined count fits (checked above); the parent's
        // delimiter slot is moved out and the gap closed by remove_vacated
        // below.
        unsafe {
            ptr::write(self.value_ptr(lc), ptr::read(parent.value_ptr(pos)));
            ptr::copy_nonoverlapping(src.value_ptr(0), self.value_ptr(lc + 1), sc);
        }

        if !self.leaf() {
            for i in 0..=sc {
                let child = src.child(i);
                self.set_child(lc + 1 + i, child);
                src.clear_child(i);
            }
        }

        self.set_count(1 + lc + sc);
        src.set_count(0);
        parent.remove_vacated(pos);
    }

    /// Exchanges the full contents of two same-leafness nodes: value slots,
    /// child arrays and counts. Used only to promote or demote the root
    /// without reallocating it; `max_count`, the nodes' own parent/position
    /// fields and the root-only tail stay put.
    pub(crate) fn swap_contents(self, other: NodeRef<P>) {
        debug_assert_eq!(self.leaf(), other.leaf());

        let a_count = self.count();
        let b_count = other.count();
        let n = a_count.max(b_count);
        debug_assert!(n <= self.max_count() && n <= other.max_count());

        // SAFETY: both value regions hold at least n slots; swapping the
        // uninitialized tail bytes along with the live ones is harmless
        // because the counts are exchanged below.
        unsafe {
            ptr::swap_nonoverlapping(
                self.value_ptr(0) as *mut u8,
                other.value_ptr(0) as *mut u8,
                n * mem::size_of::<P::Value>(),
            );
        }

        if !self.leaf() {
            for i in 0..=n {
                // SAFETY: both child arrays hold CAPACITY + 1 slots.
                unsafe {
                    let tmp = *self.child_slot(i);
                    *self.child_slot(i) = *other.child_slot(i);
                    *other.child_slot(i) = tmp;
                }
            }
        }

        self.set_count(b_count);
        other.set_count(a_count);

        if !self.leaf() {
            for i in 0..=self.count() {
                self.child(i).set_parent(self);
            }
            for i in 0..=other.count() {
                other.child(i).set_parent(other);
            }
        }
    }
}
