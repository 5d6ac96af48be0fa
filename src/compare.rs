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

//! Key comparators
//!
//! The tree is parametric over how keys are compared. A comparator is at
//! minimum a Boolean less-than; a comparator that can also answer with a full
//! three-way ordering opts in through `COMPARE_TO`, which lets the tree use a
//! fused locate that detects exact matches during the descent instead of
//! re-comparing at the leaf. The win is one full key comparison per lookup,
//! which matters for expensive keys such as long strings.

use std::cmp::Ordering;

/// A total order over keys.
///
/// `less` must induce a strict weak order. When `COMPARE_TO` is true,
/// `compare` must be consistent with `less` (`compare(a, b) == Less` exactly
/// when `less(a, b)`). An inconsistent comparator invalidates every tree
/// invariant.
pub trait KeyCompare<K: ?Sized> {
    /// True for comparators that implement `compare` natively. Enables the
    /// fused three-way locate path; the default derives `compare` from two
    /// `less` calls and gains nothing from it.
    const COMPARE_TO: bool = false;

    /// Boolean less-than.
    fn less(&self, a: &K, b: &K) -> bool;

    /// Three-way comparison. Only consulted on the fused locate path, which
    /// is only taken when `COMPARE_TO` is true.
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        if self.less(a, b) {
            Ordering::Less
        } else if self.less(b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

/// The default comparator: `Ord`, consulted as a Boolean less-than.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrdLess;

impl<K: Ord + ?Sized> KeyCompare<K> for OrdLess {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        a < b
    }
}

/// `Ord` consulted as a three-way comparison.
///
/// Worth choosing over [`OrdLess`] for keys whose comparison walks memory
/// (strings, byte vectors): the fused locate reports exact matches without a
/// second comparison at the leaf.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrdCompareTo;

impl<K: Ord + ?Sized> KeyCompare<K> for OrdCompareTo {
    const COMPARE_TO: bool = true;

    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        a.cmp(b) == Ordering::Less
    }

    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Adapts a lower-bound comparator into an upper-bound one by swapping its
/// arguments: `less(a, b)` becomes `!less(b, a)`, so a lower-bound search
/// stops at the first key strictly greater than the probe.
pub(crate) struct UpperBoundAdapter<'a, C>(pub(crate) &'a C);

impl<K: ?Sized, C: KeyCompare<K>> KeyCompare<K> for UpperBoundAdapter<'_, C> {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        !self.0.less(b, a)
    }
}
