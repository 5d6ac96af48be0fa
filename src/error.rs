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

//! Structural error types
//!
//! `try_verify` walks the whole tree and reports the first invariant it finds
//! broken. `verify` panics with the same message; it is what the tests call
//! after every mutation.

use thiserror::Error;

/// A structural invariant violation detected by `try_verify`.
///
/// Positions are slot indices inside the offending node. None of these can
/// occur unless the tree's own logic (or an inconsistent comparator) has
/// corrupted the structure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// A node's live count is outside the allowed 1..=max_count range.
    #[error("node holds {count} values, expected 1..={max}")]
    BadCount { count: usize, max: usize },

    /// Adjacent values within one node compare out of order.
    #[error("values out of order at position {position}")]
    OutOfOrder { position: usize },

    /// A value violates the bound inherited from its parent delimiter.
    #[error("value at position {position} escapes its subtree bounds")]
    OutOfBounds { position: usize },

    /// An internal node is missing a child pointer in 0..=count.
    #[error("missing child at position {position}")]
    MissingChild { position: usize },

    /// A child's parent pointer does not point back at the node holding it.
    #[error("child at position {position} has a broken parent link")]
    BadParentLink { position: usize },

    /// A child's recorded position disagrees with its slot in the parent.
    #[error("child in slot {position} records position {recorded}")]
    BadChildPosition { position: usize, recorded: usize },

    /// The root's size field disagrees with the number of stored values.
    #[error("tree records {recorded} values but holds {actual}")]
    SizeMismatch { recorded: usize, actual: usize },

    /// Leaves are not all at the same depth.
    #[error("leaf depth {found} differs from expected depth {expected}")]
    UnevenDepth { expected: usize, found: usize },

    /// The root's parent pointer does not reach the leftmost leaf.
    #[error("root parent does not reach the leftmost leaf")]
    BadLeftmost,

    /// The root's rightmost pointer does not reach the last leaf.
    #[error("rightmost pointer does not reach the last leaf")]
    BadRightmost,
}
