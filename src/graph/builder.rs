//! Adjacency list to link matrix conversion

use crate::directory::UserId;
use crate::error::MatrixError;
use crate::graph::dataset::Adjacency;
use crate::graph::matrix::{Cell, LinkMatrix};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

/// Bijection between matrix indices `0..n` and user ids
#[derive(Debug, Clone, Default)]
pub struct IndexMap {
    /// Mapping from user ids to matrix indices
    id_to_index: HashMap<UserId, usize>,

    /// User id at each matrix index
    index_to_id: Vec<UserId>,
}

impl IndexMap {
    /// Assign indices in iteration order. Repeated ids keep their first index.
    pub fn from_ids(ids: impl IntoIterator<Item = UserId>) -> Self {
        let mut map = Self::default();
        for id in ids {
            map.get_or_assign(id);
        }
        map
    }

    fn get_or_assign(&mut self, id: UserId) -> usize {
        if let Some(&idx) = self.id_to_index.get(&id) {
            return idx;
        }
        let idx = self.index_to_id.len();
        self.id_to_index.insert(id, idx);
        self.index_to_id.push(id);
        idx
    }

    pub fn index(&self, id: &UserId) -> Option<usize> {
        self.id_to_index.get(id).copied()
    }

    pub fn id(&self, index: usize) -> Option<UserId> {
        self.index_to_id.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.index_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_id.is_empty()
    }

    /// `(index, id)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, UserId)> + '_ {
        self.index_to_id.iter().copied().enumerate()
    }

    pub fn ids(&self) -> &[UserId] {
        &self.index_to_id
    }
}

impl PartialEq for IndexMap {
    fn eq(&self, other: &Self) -> bool {
        self.index_to_id == other.index_to_id
    }
}

impl Serialize for IndexMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.index_to_id.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IndexMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ids = Vec::<UserId>::deserialize(deserializer)?;
        let map = IndexMap::from_ids(ids.iter().copied());
        if map.len() != ids.len() {
            return Err(serde::de::Error::custom("index map lists a user id twice"));
        }
        Ok(map)
    }
}

/// Converts a completed adjacency list into a link matrix.
///
/// Cell `(i, j)` is set when user `i` follows user `j`, which is learned
/// either from `i`'s friend list or from `j`'s follower list.
pub struct MatrixBuilder<'a> {
    adjacency: &'a Adjacency,
}

impl<'a> MatrixBuilder<'a> {
    pub fn new(adjacency: &'a Adjacency) -> Self {
        Self { adjacency }
    }

    /// Index every adjacency key in iteration order
    pub fn index_map(&self) -> IndexMap {
        IndexMap::from_ids(self.adjacency.keys())
    }

    /// Follow links as `(follower index, followed index, 1.0)` cells
    pub fn links(&self, index: &IndexMap) -> Result<Vec<Cell>, MatrixError> {
        let lookup = |id: &UserId, referenced_by: UserId| {
            index.index(id).ok_or(MatrixError::MissingIndex {
                id: *id,
                referenced_by,
            })
        };

        let capacity = self
            .adjacency
            .values()
            .map(|e| e.friends.len() + e.followers.len())
            .sum();
        let mut cells = Vec::with_capacity(capacity);
        for (user, entry) in self.adjacency.iter() {
            let u = lookup(&user, user)?;
            for friend in &entry.friends {
                cells.push((u, lookup(friend, user)?, 1.0));
            }
            for follower in &entry.followers {
                cells.push((lookup(follower, user)?, u, 1.0));
            }
        }
        Ok(cells)
    }

    /// Build the link matrix and its index map
    pub fn build<M: LinkMatrix>(&self) -> Result<(M, IndexMap), MatrixError> {
        let index = self.index_map();
        let cells = self.links(&index)?;
        let matrix = M::from_cells(index.len(), &cells)?;

        log::info!(
            "Built {}x{} link matrix from {} recorded links ({} distinct)",
            index.len(),
            index.len(),
            cells.len(),
            matrix.nnz()
        );

        Ok((matrix, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::dataset::AdjacencyEntry;
    use crate::graph::matrix::{DenseMatrix, SparseMatrix};

    fn entry(friends: &[u64], followers: &[u64]) -> AdjacencyEntry {
        AdjacencyEntry {
            friends: friends.iter().map(|&i| UserId(i)).collect(),
            followers: followers.iter().map(|&i| UserId(i)).collect(),
        }
    }

    fn adjacency() -> Adjacency {
        [
            (UserId(30), entry(&[10, 20], &[20])),
            (UserId(10), entry(&[], &[30])),
            (UserId(20), entry(&[30], &[])),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_indices_follow_adjacency_order() {
        let adjacency = adjacency();
        let index = MatrixBuilder::new(&adjacency).index_map();

        assert_eq!(index.ids(), &[UserId(30), UserId(10), UserId(20)]);
        assert_eq!(index.index(&UserId(20)), Some(2));
        assert_eq!(index.id(1), Some(UserId(10)));
        assert_eq!(index.id(3), None);
    }

    #[test]
    fn test_friend_and_follower_links_share_cells() {
        let adjacency = adjacency();
        let (matrix, _) = MatrixBuilder::new(&adjacency).build::<DenseMatrix>().unwrap();

        // 30 follows 10 and 20; 20 follows 30 (recorded twice)
        assert_eq!(matrix.get(0, 1), 1.0);
        assert_eq!(matrix.get(0, 2), 1.0);
        assert_eq!(matrix.get(2, 0), 1.0);
        assert_eq!(matrix.nnz(), 3);
        assert_eq!(matrix.get(1, 0), 0.0);
    }

    #[test]
    fn test_missing_id_fails() {
        let mut adjacency = adjacency();
        if let Some(e) = adjacency.get_mut(&UserId(10)) {
            e.followers.push(UserId(99));
        }

        let err = MatrixBuilder::new(&adjacency)
            .build::<SparseMatrix>()
            .unwrap_err();
        assert_eq!(
            err,
            MatrixError::MissingIndex {
                id: UserId(99),
                referenced_by: UserId(10)
            }
        );
    }

    #[test]
    fn test_index_map_serde_round_trip() {
        let index = IndexMap::from_ids([UserId(4), UserId(8), UserId(15)]);
        let bytes = bincode::serialize(&index).unwrap();
        let restored: IndexMap = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored, index);
        assert_eq!(restored.index(&UserId(15)), Some(2));

        let duplicated = bincode::serialize(&vec![UserId(1), UserId(1)]).unwrap();
        assert!(bincode::deserialize::<IndexMap>(&duplicated).is_err());
    }
}
