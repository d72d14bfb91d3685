//! Configuration for crawling, storage paths and ranking

use crate::crawl::{LimitMode, RetryPolicy};
use std::path::PathBuf;

/// Settings for one crawl
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Seed account, by numeric id or screen name
    pub seed: String,

    /// Maximum friends fetched per explored user
    pub friends_limit: usize,

    /// Maximum followers fetched per explored user
    pub followers_limit: usize,

    /// Stop once the chosen metric reaches this value
    pub limit: usize,

    /// Which count `limit` applies to
    pub limit_on: LimitMode,

    /// Write a snapshot after every explored user
    pub live_save: bool,

    /// Prefix of the live user snapshots (slot number appended)
    pub users_temp: PathBuf,

    /// Prefix of the live adjacency snapshots (slot number appended)
    pub adj_list_temp: PathBuf,

    /// How long a single directory call may keep waiting
    pub retry: RetryPolicy,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seed: String::new(),
            friends_limit: 200,
            followers_limit: 200,
            limit: 40,
            limit_on: LimitMode::Explored,
            live_save: false,
            users_temp: PathBuf::from("data/temp/users_"),
            adj_list_temp: PathBuf::from("data/temp/adj_list_"),
            retry: RetryPolicy::default(),
        }
    }
}

impl CrawlConfig {
    /// Create a configuration for `seed` with default caps and limit
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            ..Self::default()
        }
    }

    pub fn with_caps(mut self, friends_limit: usize, followers_limit: usize) -> Self {
        self.friends_limit = friends_limit;
        self.followers_limit = followers_limit;
        self
    }

    pub fn with_limit(mut self, limit: usize, limit_on: LimitMode) -> Self {
        self.limit = limit;
        self.limit_on = limit_on;
        self
    }

    /// Enable live snapshots under the given prefixes
    pub fn with_live_save(mut self, users_temp: impl Into<PathBuf>, adj_list_temp: impl Into<PathBuf>) -> Self {
        self.live_save = true;
        self.users_temp = users_temp.into();
        self.adj_list_temp = adj_list_temp.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Where the final crawl and matrix files live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub users: PathBuf,
    pub adj_list: PathBuf,
    pub map: PathBuf,
    pub link_matrix: PathBuf,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            users: PathBuf::from("data/users"),
            adj_list: PathBuf::from("data/adj_list"),
            map: PathBuf::from("data/map"),
            link_matrix: PathBuf::from("data/link_matrix"),
        }
    }
}

/// Power-iteration settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankConfig {
    /// Per-entry convergence threshold
    pub epsilon: f64,

    /// Multiplier applied to every PageRank product
    pub damping: f64,

    /// Iteration cap; `None` iterates until convergence
    pub max_iterations: Option<usize>,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.001,
            damping: 1.0,
            max_iterations: None,
        }
    }
}

impl RankConfig {
    /// Create a configuration with custom values
    pub fn new(epsilon: f64, damping: f64, max_iterations: Option<usize>) -> Self {
        Self {
            epsilon,
            damping,
            max_iterations,
        }
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }
}
