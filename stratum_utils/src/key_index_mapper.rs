//! Bidirectional mapping between hashable keys and dense indices.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Bidirectional mapping between keys and indices into an
/// underlying dense [`Vec`].
///
/// Items addressed through this mapper can be stored compactly
/// and reordered (notably swap removed) without invalidating
/// the keys used to look them up. The slice returned by
/// [`keys`](Self::keys) always lists the keys in index order,
/// so it can be walked in lockstep with the dense storage the
/// indices point into.
#[derive(Clone, Debug, Default)]
pub struct KeyIndexMapper<K> {
    index_of_key: HashMap<K, usize>,
    key_at_index: Vec<K>,
}

impl<K> KeyIndexMapper<K>
where
    K: Copy + Hash + Eq + Debug,
{
    /// Creates an empty mapper.
    pub fn new() -> Self {
        Self {
            index_of_key: HashMap::new(),
            key_at_index: Vec::new(),
        }
    }

    /// Whether the mapper holds no keys.
    pub fn is_empty(&self) -> bool {
        self.key_at_index.is_empty()
    }

    /// The number of mapped keys.
    pub fn len(&self) -> usize {
        self.key_at_index.len()
    }

    /// Whether the given key is present.
    pub fn contains_key(&self, key: K) -> bool {
        self.index_of_key.contains_key(&key)
    }

    /// Returns the index of the given key, or [`None`] if the key
    /// is not present.
    pub fn get(&self, key: K) -> Option<usize> {
        self.index_of_key.get(&key).copied()
    }

    /// Returns the index of the given key.
    ///
    /// # Panics
    /// If the key is not present.
    pub fn idx(&self, key: K) -> usize {
        self.index_of_key[&key]
    }

    /// Returns the key stored at the given index.
    ///
    /// # Panics
    /// If the index is out of bounds.
    pub fn key_at_idx(&self, idx: usize) -> K {
        self.key_at_index[idx]
    }

    /// All keys in index order.
    pub fn keys(&self) -> &[K] {
        &self.key_at_index
    }

    /// Maps the given key to the next free index.
    ///
    /// # Panics
    /// If the key is already present.
    pub fn push_key(&mut self, key: K) {
        let idx = self.key_at_index.len();
        self.key_at_index.push(key);
        let existing = self.index_of_key.insert(key, idx);
        assert!(existing.is_none(), "Tried to push an existing key");
    }

    /// Removes the given key and moves the key at the last index
    /// into its slot (unless the removed key was last).
    ///
    /// # Returns
    /// The index the removed key was mapped to.
    ///
    /// # Panics
    /// If the key is not present.
    pub fn swap_remove_key(&mut self, key: K) -> usize {
        let idx_of_removed = self.index_of_key.remove(&key).unwrap();
        let last_key = self.key_at_index.pop().unwrap();
        if key != last_key {
            self.key_at_index[idx_of_removed] = last_key;
            *self.index_of_key.get_mut(&last_key).unwrap() = idx_of_removed;
        }
        idx_of_removed
    }
}
