//! Crawl a social follow graph and rank its users
//!
//! A [`GraphCrawler`] explores the graph breadth first through a
//! [`DirectoryClient`], pacing itself with a [`RateLimiter`]. The resulting
//! adjacency list is turned into a link matrix by [`MatrixBuilder`], and the
//! [`RankEngine`] runs PageRank or HITS power iteration over it.

pub mod config;
pub mod crawl;
pub mod directory;
pub mod error;
pub mod events;
pub mod graph;
pub mod rank;
pub mod storage;

pub use config::{CrawlConfig, OutputPaths, RankConfig};
pub use crawl::{CrawlOutcome, CrawlReport, GraphCrawler, LimitMode, RateLimiter, RetryPolicy};
pub use directory::{DirectoryClient, Endpoint, Profile, Quota, StaticDirectory, UserId, UserRecord};
pub use error::{CrawlError, DirectoryError, MatrixError, StorageError};
pub use events::{Event, EventSink, LogSink, RecordingSink};
pub use graph::{Dataset, DenseMatrix, IndexMap, LinkMatrix, MatrixBuilder, SparseMatrix};
pub use rank::{HitsResult, RankEngine, RankResult};
