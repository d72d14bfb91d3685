//! Snapshot files and result export
//!
//! Crawl data, index maps and matrices are stored with bincode. Every write
//! goes to a sibling `.tmp` file that is flushed, synced and renamed over the
//! destination, so readers see either the old file or the new one.

use crate::directory::UserId;
use crate::error::StorageError;
use crate::graph::algorithms::GraphSummary;
use crate::graph::builder::IndexMap;
use crate::graph::dataset::{Adjacency, Dataset, Visited};
use crate::graph::matrix::{DenseMatrix, LinkMatrix, SparseMatrix};
use crate::rank::{HitsResult, RankResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, to_string_pretty};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Link matrix as written to disk, tagged with its representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredMatrix {
    Dense(DenseMatrix),
    Sparse(SparseMatrix),
}

impl StoredMatrix {
    pub fn dim(&self) -> usize {
        match self {
            StoredMatrix::Dense(m) => m.dim(),
            StoredMatrix::Sparse(m) => m.dim(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, StoredMatrix::Sparse(_))
    }
}

impl From<DenseMatrix> for StoredMatrix {
    fn from(matrix: DenseMatrix) -> Self {
        StoredMatrix::Dense(matrix)
    }
}

impl From<SparseMatrix> for StoredMatrix {
    fn from(matrix: SparseMatrix) -> Self {
        StoredMatrix::Sparse(matrix)
    }
}

/// Removes the temporary file unless the write completed
struct PendingFile {
    path: PathBuf,
    committed: bool,
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// `path` with `suffix` appended to its final component
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Write through a temporary file and rename it into place
fn write_atomic<F>(path: &Path, write: F) -> Result<(), StorageError>
where
    F: FnOnce(&mut BufWriter<File>, &Path) -> Result<(), StorageError>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let tmp = with_suffix(path, ".tmp");
    let mut pending = PendingFile {
        path: tmp.clone(),
        committed: false,
    };

    let file = File::create(&tmp).map_err(|e| StorageError::io(&tmp, e))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer, &tmp)?;

    let file = writer
        .into_inner()
        .map_err(|e| StorageError::io(&tmp, e.into_error()))?;
    file.sync_all().map_err(|e| StorageError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StorageError::io(path, e))?;

    pending.committed = true;
    Ok(())
}

/// Serialize `value` with bincode
pub fn save_bincode<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<(), StorageError> {
    let path = path.as_ref();
    write_atomic(path, |writer, tmp| {
        bincode::serialize_into(writer, value).map_err(|source| StorageError::Encode {
            path: tmp.to_path_buf(),
            source,
        })
    })
}

pub fn load_bincode<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, StorageError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    bincode::deserialize_from(BufReader::new(file)).map_err(|source| StorageError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize `value` as pretty-printed JSON
pub fn save_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<(), StorageError> {
    let path = path.as_ref();
    write_atomic(path, |writer, tmp| {
        let text = to_string_pretty(value).map_err(|source| StorageError::Json {
            path: tmp.to_path_buf(),
            source,
        })?;
        writer
            .write_all(text.as_bytes())
            .map_err(|e| StorageError::io(tmp, e))
    })
}

pub fn save_users(path: impl AsRef<Path>, users: &Visited) -> Result<(), StorageError> {
    save_bincode(path, users)
}

pub fn load_users(path: impl AsRef<Path>) -> Result<Visited, StorageError> {
    load_bincode(path)
}

pub fn save_adjacency(path: impl AsRef<Path>, adjacency: &Adjacency) -> Result<(), StorageError> {
    save_bincode(path, adjacency)
}

pub fn load_adjacency(path: impl AsRef<Path>) -> Result<Adjacency, StorageError> {
    load_bincode(path)
}

/// Write the user map and adjacency list to their own files
pub fn save_dataset(
    users_path: impl AsRef<Path>,
    adj_list_path: impl AsRef<Path>,
    dataset: &Dataset,
) -> Result<(), StorageError> {
    save_users(users_path, &dataset.visited)?;
    save_adjacency(adj_list_path, &dataset.adjacency)
}

pub fn load_dataset(
    users_path: impl AsRef<Path>,
    adj_list_path: impl AsRef<Path>,
) -> Result<Dataset, StorageError> {
    Ok(Dataset {
        visited: load_users(users_path)?,
        adjacency: load_adjacency(adj_list_path)?,
    })
}

pub fn save_index_map(path: impl AsRef<Path>, index: &IndexMap) -> Result<(), StorageError> {
    save_bincode(path, index)
}

pub fn load_index_map(path: impl AsRef<Path>) -> Result<IndexMap, StorageError> {
    load_bincode(path)
}

pub fn save_matrix(path: impl AsRef<Path>, matrix: &StoredMatrix) -> Result<(), StorageError> {
    save_bincode(path, matrix)
}

/// Load a matrix and check that its shape is sound
pub fn load_matrix(path: impl AsRef<Path>) -> Result<StoredMatrix, StorageError> {
    let path = path.as_ref();
    let matrix: StoredMatrix = load_bincode(path)?;

    let checked = match &matrix {
        StoredMatrix::Dense(m) => m.validate(),
        StoredMatrix::Sparse(m) => m.validate(),
    };
    checked.map_err(|source| StorageError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(matrix)
}

/// Two alternating snapshot slots for live crawl saves.
///
/// Slot `k` lives at `<prefix>k`. Writes alternate `0, 1, 0, ...`, so the
/// previous snapshot is intact while the next one is being written.
#[derive(Debug, Clone)]
pub struct SnapshotSlots {
    users_prefix: PathBuf,
    adj_list_prefix: PathBuf,
    written: usize,
}

impl SnapshotSlots {
    pub fn new(users_prefix: impl Into<PathBuf>, adj_list_prefix: impl Into<PathBuf>) -> Self {
        Self {
            users_prefix: users_prefix.into(),
            adj_list_prefix: adj_list_prefix.into(),
            written: 0,
        }
    }

    /// `(users, adjacency)` paths of a slot
    pub fn paths(&self, slot: usize) -> (PathBuf, PathBuf) {
        let slot = slot.to_string();
        (
            with_suffix(&self.users_prefix, &slot),
            with_suffix(&self.adj_list_prefix, &slot),
        )
    }

    /// Snapshots written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Slot holding the newest complete snapshot
    pub fn latest(&self) -> Option<usize> {
        self.written.checked_sub(1).map(|k| k % 2)
    }

    /// Write `dataset` to the next slot and return its number
    pub fn save(&mut self, dataset: &Dataset) -> Result<usize, StorageError> {
        let slot = self.written % 2;
        let (users, adj_list) = self.paths(slot);
        save_dataset(users, adj_list, dataset)?;
        self.written += 1;
        Ok(slot)
    }

    /// Read the newest complete snapshot, if any was written
    pub fn load_latest(&self) -> Result<Option<Dataset>, StorageError> {
        match self.latest() {
            Some(slot) => {
                let (users, adj_list) = self.paths(slot);
                load_dataset(users, adj_list).map(Some)
            }
            None => Ok(None),
        }
    }
}

/// One ranked user in an exported result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedUser {
    pub index: usize,
    pub id: Option<UserId>,
    pub screen_name: Option<String>,
    pub score: f64,
}

/// Resolve `(index, score)` pairs to users
pub fn ranked_users(scores: &[(usize, f64)], index: &IndexMap, users: Option<&Visited>) -> Vec<RankedUser> {
    scores
        .iter()
        .map(|&(i, score)| {
            let id = index.id(i);
            let screen_name = id
                .zip(users)
                .and_then(|(id, users)| users.get(&id))
                .map(|record| record.screen_name.clone());
            RankedUser {
                index: i,
                id,
                screen_name,
                score,
            }
        })
        .collect()
}

/// Export a PageRank result with its `top` users
pub fn save_page_rank(
    path: impl AsRef<Path>,
    result: &RankResult,
    index: &IndexMap,
    users: Option<&Visited>,
    top: usize,
) -> Result<(), StorageError> {
    log::info!("Saving PageRank scores to {}", path.as_ref().display());

    let report = json!({
        "algorithm": "pagerank",
        "iterations": result.iterations,
        "converged": result.converged,
        "node_count": result.scores.len(),
        "top": ranked_users(&result.top_n(top), index, users),
        "scores": result.scores.to_vec(),
    });
    save_json(path, &report)
}

/// Export a HITS result with its `top` hubs and authorities
pub fn save_hits(
    path: impl AsRef<Path>,
    result: &HitsResult,
    index: &IndexMap,
    users: Option<&Visited>,
    top: usize,
) -> Result<(), StorageError> {
    log::info!("Saving HITS scores to {}", path.as_ref().display());

    let report = json!({
        "algorithm": "hits",
        "iterations": result.iterations,
        "converged": result.converged,
        "node_count": result.hubs.len(),
        "top_hubs": ranked_users(&result.top_hubs(top), index, users),
        "top_authorities": ranked_users(&result.top_auths(top), index, users),
        "hubs": result.hubs.to_vec(),
        "authorities": result.auths.to_vec(),
    });
    save_json(path, &report)
}

/// Export a structural summary of the crawl and its matrix
pub fn save_summary(
    path: impl AsRef<Path>,
    summary: &GraphSummary,
    dataset: Option<&Dataset>,
) -> Result<(), StorageError> {
    log::info!("Saving summary information");

    let avg_degree = if summary.node_count == 0 {
        0.0
    } else {
        summary.link_count as f64 / summary.node_count as f64
    };

    let report = json!({
        "graph_stats": {
            "node_count": summary.node_count,
            "link_count": summary.link_count,
            "mutual_link_count": summary.mutual_links,
            "dangling_nodes": summary.dangling_nodes,
            "max_out_degree": summary.max_out_degree,
            "max_in_degree": summary.max_in_degree,
            "avg_degree": avg_degree,
        },
        "component_stats": {
            "component_count": summary.component_count,
            "largest_component": summary.largest_component,
        },
        "crawl_stats": dataset.map(|d| json!({
            "visited": d.len(),
            "recorded_links": d.link_count(),
            "consistent": d.is_consistent(),
        })),
    });
    save_json(path, &report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::UserRecord;

    #[test]
    fn test_suffix_appends_to_file_name() {
        assert_eq!(
            with_suffix(Path::new("data/temp/users_"), "1"),
            PathBuf::from("data/temp/users_1")
        );
    }

    #[test]
    fn test_slot_paths_alternate() {
        let dir = tempfile::tempdir().unwrap();
        let mut slots = SnapshotSlots::new(dir.path().join("users_"), dir.path().join("adj_"));
        let mut dataset = Dataset::new();
        dataset.observe(UserId(1), UserRecord::new("a", "a"));

        assert_eq!(slots.latest(), None);
        assert_eq!(slots.save(&dataset).unwrap(), 0);
        assert_eq!(slots.save(&dataset).unwrap(), 1);
        assert_eq!(slots.save(&dataset).unwrap(), 0);
        assert_eq!(slots.latest(), Some(0));
        assert!(dir.path().join("users_1").exists());
        assert!(!dir.path().join("users_0.tmp").exists());
    }

    #[test]
    fn test_failed_write_leaves_no_temporary() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("broken");
        let result = write_atomic(&target, |_, tmp| {
            Err(StorageError::io(tmp, std::io::Error::new(std::io::ErrorKind::Other, "boom")))
        });

        assert!(result.is_err());
        assert!(!target.exists());
        assert!(!with_suffix(&target, ".tmp").exists());
    }
}
