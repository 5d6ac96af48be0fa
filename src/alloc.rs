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

//! Raw node allocation
//!
//! The tree allocates every node as one contiguous block. Nodes come in three
//! sizes (leaf, internal, root) and must be freed with the layout they were
//! allocated with; the tree knows which kind each node is, so the layout is
//! recomputed structurally rather than stored per node.

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;

/// A raw-byte allocator for tree nodes.
///
/// Implementations may pool or arena-allocate; the tree calls `allocate`
/// before mutating any existing node in a multi-step reorganization, so an
/// allocator that diverts on failure leaves the tree consistent.
pub trait RawAllocator {
    /// Allocates a block for `layout`. Must not return on failure unless the
    /// returned pointer is valid for the full layout.
    fn allocate(&mut self, layout: Layout) -> NonNull<u8>;

    /// Frees a block previously returned by `allocate`.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate` on this allocator with the same
    /// `layout`, and must not be freed twice.
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout);
}

/// The default allocator: the global heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Heap;

impl RawAllocator for Heap {
    #[inline]
    fn allocate(&mut self, layout: Layout) -> NonNull<u8> {
        debug_assert!(layout.size() > 0);
        // SAFETY: layout has non-zero size (the smallest node is a one-value
        // leaf root, which is never zero-sized).
        let ptr = unsafe { alloc(layout) };
        match NonNull::new(ptr) {
            Some(ptr) => ptr,
            None => handle_alloc_error(layout),
        }
    }

    #[inline]
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        dealloc(ptr.as_ptr(), layout);
    }
}
