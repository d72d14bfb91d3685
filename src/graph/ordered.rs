//! Insertion-ordered map keyed by user id

use crate::directory::UserId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

/// Map from [`UserId`] to `V` that iterates in insertion order.
///
/// Entries live in a vector; a hash index maps each id to its position.
/// Nothing is ever removed, so positions stay stable.
#[derive(Debug, Clone)]
pub struct OrderedMap<V> {
    /// Mapping from user ids to positions in `entries`
    index: HashMap<UserId, usize>,

    /// Entries in insertion order
    entries: Vec<(UserId, V)>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &UserId) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &UserId) -> Option<&V> {
        self.index.get(id).map(|&pos| &self.entries[pos].1)
    }

    pub fn get_mut(&mut self, id: &UserId) -> Option<&mut V> {
        match self.index.get(id) {
            Some(&pos) => Some(&mut self.entries[pos].1),
            None => None,
        }
    }

    /// Position of `id` in insertion order
    pub fn position(&self, id: &UserId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Insert `value` unless `id` is already present.
    ///
    /// Returns `true` when the entry was created. Existing values are left
    /// untouched.
    pub fn insert_new(&mut self, id: UserId, value: V) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id, self.entries.len());
        self.entries.push((id, value));
        true
    }

    pub fn keys(&self) -> impl Iterator<Item = UserId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (UserId, &V)> + '_ {
        self.entries.iter().map(|(id, v)| (*id, v))
    }
}

impl<V> FromIterator<(UserId, V)> for OrderedMap<V> {
    /// Later duplicates of an id are dropped
    fn from_iter<I: IntoIterator<Item = (UserId, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (id, value) in iter {
            map.insert_new(id, value);
        }
        map
    }
}

impl<V: PartialEq> PartialEq for OrderedMap<V> {
    /// Equal when both hold the same entries in the same order
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

// Serialized as the ordered entry list; the index is rebuilt on load.
impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<(UserId, V)>::deserialize(deserializer)?;
        let mut map = OrderedMap::with_capacity(entries.len());
        for (id, value) in entries {
            map.insert_new(id, value);
        }
        Ok(map)
    }
}
