//! Error types shared across the crawler, matrix builder and storage layers

use crate::directory::{Endpoint, UserId};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a [`DirectoryClient`](crate::directory::DirectoryClient)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DirectoryError {
    #[error("quota exceeded on the {0} endpoint")]
    QuotaExceeded(Endpoint),

    #[error("transient directory failure: {0}")]
    TransientFailure(String),

    #[error("unknown user: {0}")]
    UnknownUser(String),
}

impl DirectoryError {
    /// Whether the crawler should sleep and retry rather than abort
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DirectoryError::QuotaExceeded(_) | DirectoryError::TransientFailure(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("gave up on the {endpoint} endpoint after {attempts} attempts ({waited:?} spent waiting)")]
    RetriesExhausted {
        endpoint: Endpoint,
        attempts: u32,
        waited: Duration,
    },

    #[error("live snapshot failed: {0}")]
    Snapshot(#[from] StorageError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatrixError {
    #[error("user {id} is referenced by {referenced_by} but has no adjacency entry")]
    MissingIndex { id: UserId, referenced_by: UserId },

    #[error("matrix is {rows}x{cols}, expected a square matrix")]
    NotSquare { rows: usize, cols: usize },

    #[error("cell ({row}, {col}) is outside a {dim}x{dim} matrix")]
    OutOfBounds { row: usize, col: usize, dim: usize },

    #[error("row {row} does not list its columns in strictly increasing order")]
    UnsortedRow { row: usize },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("JSON error on {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid data in {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: MatrixError,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}
