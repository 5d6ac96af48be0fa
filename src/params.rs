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

//! Tree parameter bundles
//!
//! Everything the engine needs to know about its element type is gathered in
//! one trait: the key and stored-value types, how to extract a key from a
//! value, the comparator, the target node size that drives per-node capacity,
//! and whether in-node search should be linear or binary. Sets store the key
//! itself; maps store `(key, value)` pairs.

use std::marker::PhantomData;

use crate::compare::{KeyCompare, OrdLess};

/// Per-key-type configuration.
///
/// Linear in-node search beats binary search for keys that compare in one
/// instruction, because the branch predictor wins over the log factor at
/// node sizes in the dozens. Implemented with `LINEAR_SEARCH = true` for the
/// primitive scalars; everything else gets binary search from the default.
/// A custom key type opts in with a one-line impl.
pub trait KeyTraits {
    const LINEAR_SEARCH: bool = false;
}

macro_rules! scalar_keys {
    ($($t:ty),* $(,)?) => {
        $(impl KeyTraits for $t {
            const LINEAR_SEARCH: bool = true;
        })*
    };
}

scalar_keys!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, char, bool);

impl KeyTraits for String {}
impl KeyTraits for &str {}
impl<T> KeyTraits for Vec<T> {}
impl<T, const N: usize> KeyTraits for [T; N] {}
impl<T: ?Sized> KeyTraits for Box<T> {}
impl<A, B> KeyTraits for (A, B) {}

/// The parameter bundle the engine is instantiated over.
pub trait TreeParams: Sized {
    /// The key type searches are performed on.
    type Key;
    /// The stored value type. Equal to `Key` for sets, `(Key, V)` for maps.
    type Value;
    /// The comparator type.
    type Compare: KeyCompare<Self::Key> + Clone;

    /// Target size of one node in bytes. Drives the per-node value capacity.
    const TARGET_NODE_SIZE: usize;
    /// Linear vs binary in-node search.
    const LINEAR_SEARCH: bool;

    /// Extracts the key from a stored value.
    fn key(value: &Self::Value) -> &Self::Key;
}

/// Parameters for set-like trees: the stored value is the key.
pub struct SetParams<K, C = OrdLess, const TARGET_NODE_SIZE: usize = 256> {
    _marker: PhantomData<(K, C)>,
}

impl<K, C, const TARGET_NODE_SIZE: usize> TreeParams for SetParams<K, C, TARGET_NODE_SIZE>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
{
    type Key = K;
    type Value = K;
    type Compare = C;

    const TARGET_NODE_SIZE: usize = TARGET_NODE_SIZE;
    const LINEAR_SEARCH: bool = K::LINEAR_SEARCH;

    #[inline]
    fn key(value: &K) -> &K {
        value
    }
}

/// Parameters for map-like trees: the stored value is a `(key, mapped)` pair.
pub struct MapParams<K, V, C = OrdLess, const TARGET_NODE_SIZE: usize = 256> {
    _marker: PhantomData<(K, V, C)>,
}

impl<K, V, C, const TARGET_NODE_SIZE: usize> TreeParams for MapParams<K, V, C, TARGET_NODE_SIZE>
where
    K: KeyTraits,
    C: KeyCompare<K> + Clone,
{
    type Key = K;
    type Value = (K, V);
    type Compare = C;

    const TARGET_NODE_SIZE: usize = TARGET_NODE_SIZE;
    const LINEAR_SEARCH: bool = K::LINEAR_SEARCH;

    #[inline]
    fn key(value: &(K, V)) -> &K {
        &value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_keys_search_linearly() {
        assert!(<i64 as KeyTraits>::LINEAR_SEARCH);
        assert!(<u8 as KeyTraits>::LINEAR_SEARCH);
        assert!(<char as KeyTraits>::LINEAR_SEARCH);
        assert!(!<String as KeyTraits>::LINEAR_SEARCH);
        assert!(!<Vec<u8> as KeyTraits>::LINEAR_SEARCH);
    }

    #[test]
    fn test_map_params_key_extraction() {
        let pair = (42i64, "value");
        assert_eq!(*MapParams::<i64, &str>::key(&pair), 42);
    }
}
