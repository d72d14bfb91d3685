//! Breadth-first crawl producing the visited map and adjacency list

use crate::config::CrawlConfig;
use crate::crawl::clock::Clock;
use crate::crawl::limiter::{Attempts, RateLimiter};
use crate::directory::{DirectoryClient, Endpoint, Profile, UserId};
use crate::error::{CrawlError, DirectoryError};
use crate::events::{Event, EventSink};
use crate::graph::dataset::Dataset;
use crate::storage::SnapshotSlots;
use clap::ValueEnum;
use std::collections::VecDeque;

/// Count compared against the crawl limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LimitMode {
    /// Users whose lists were fetched (`visited - frontier`)
    Explored,
    /// Every user observed so far
    Visited,
}

impl LimitMode {
    pub fn metric(&self, visited: usize, frontier: usize) -> usize {
        match self {
            LimitMode::Explored => visited - frontier,
            LimitMode::Visited => visited,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// The metric reached the configured limit
    LimitReached,
    /// The reachable component ran out before the limit
    FrontierExhausted,
}

/// Result of a finished crawl
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub dataset: Dataset,
    pub outcome: CrawlOutcome,

    /// Users still queued, in FIFO order
    pub frontier: Vec<UserId>,

    /// Number of users whose lists were fetched
    pub explored: usize,

    /// Live snapshots written during the crawl
    pub snapshots_written: usize,
}

/// Crawls a [`DirectoryClient`] breadth first from a seed account.
///
/// Every list call first waits for quota through the [`RateLimiter`]; failed
/// calls back off and retry the same call, so a user's adjacency entry is
/// only appended to after a successful fetch.
pub struct GraphCrawler<D, C, S> {
    config: CrawlConfig,
    client: D,
    limiter: RateLimiter<C, S>,
    slots: Option<SnapshotSlots>,
}

impl<D, C, S> GraphCrawler<D, C, S>
where
    D: DirectoryClient,
    C: Clock,
    S: EventSink,
{
    pub fn new(config: CrawlConfig, client: D, clock: C, sink: S) -> Self {
        let limiter = RateLimiter::new(clock, sink).with_policy(config.retry);
        let slots = config
            .live_save
            .then(|| SnapshotSlots::new(&config.users_temp, &config.adj_list_temp));

        Self {
            config,
            client,
            limiter,
            slots,
        }
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn limiter(&self) -> &RateLimiter<C, S> {
        &self.limiter
    }

    /// Give the client back once crawling is done
    pub fn into_client(self) -> D {
        self.client
    }

    /// Run the crawl until the limit is reached or the frontier empties
    pub fn crawl(&mut self) -> Result<CrawlReport, CrawlError> {
        let seed = self.resolve_seed()?;
        self.limiter.sink().emit(Event::SeedResolved {
            id: seed.id,
            screen_name: seed.record.screen_name.clone(),
        });

        let mut dataset = Dataset::new();
        let mut frontier = VecDeque::new();
        dataset.observe(seed.id, seed.record);
        frontier.push_back(seed.id);

        let limit = self.config.limit;
        let mode = self.config.limit_on;
        let mut snapshots_written = 0;
        // Counts from zero so a nonzero limit always explores the seed
        let mut metric = 0;

        while metric < limit {
            let Some(user) = frontier.pop_front() else {
                break;
            };
            self.limiter.sink().emit(Event::NodeSelected {
                id: user,
                screen_name: dataset.screen_name(&user).unwrap_or_default().to_string(),
            });

            for endpoint in Endpoint::ALL {
                let cap = match endpoint {
                    Endpoint::Friends => self.config.friends_limit,
                    Endpoint::Followers => self.config.followers_limit,
                };
                let profiles = self.fetch(endpoint, user, cap)?;
                let count = profiles.len();

                let mut discovered = 0;
                for profile in profiles {
                    let other = profile.id;
                    if dataset.observe(other, profile.record) {
                        frontier.push_back(other);
                        discovered += 1;
                    }
                    match endpoint {
                        Endpoint::Friends => dataset.push_friend(&user, other),
                        Endpoint::Followers => dataset.push_follower(&user, other),
                    }
                }

                self.limiter.sink().emit(Event::Fetched {
                    endpoint,
                    id: user,
                    count,
                    discovered,
                });
            }

            metric = mode.metric(dataset.len(), frontier.len());
            self.limiter.sink().emit(Event::Progress {
                metric,
                limit,
                visited: dataset.len(),
                frontier: frontier.len(),
            });

            if let Some(slots) = self.slots.as_mut() {
                let slot = slots.save(&dataset)?;
                snapshots_written += 1;
                self.limiter.sink().emit(Event::SnapshotSaved { slot });
            }
        }

        let outcome = if metric >= limit {
            CrawlOutcome::LimitReached
        } else {
            CrawlOutcome::FrontierExhausted
        };
        let explored = dataset.len() - frontier.len();

        log::info!(
            "Crawl finished ({:?}): {} visited, {} explored, {} still queued",
            outcome,
            dataset.len(),
            explored,
            frontier.len()
        );

        Ok(CrawlReport {
            dataset,
            outcome,
            frontier: frontier.into_iter().collect(),
            explored,
            snapshots_written,
        })
    }

    fn resolve_seed(&mut self) -> Result<Profile, CrawlError> {
        let mut attempts = Attempts::default();
        loop {
            match self.client.get_profile(&self.config.seed) {
                Ok(profile) => return Ok(profile),
                Err(err) if err.is_retryable() => {
                    let endpoint = match &err {
                        DirectoryError::QuotaExceeded(endpoint) => *endpoint,
                        _ => Endpoint::Friends,
                    };
                    self.limiter
                        .back_off(&mut self.client, endpoint, &err, &mut attempts)?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// One list call, waiting for quota first and retrying failures
    fn fetch(&mut self, endpoint: Endpoint, user: UserId, cap: usize) -> Result<Vec<Profile>, CrawlError> {
        self.limiter.await_capacity(&mut self.client, endpoint)?;

        let mut attempts = Attempts::default();
        loop {
            match self.client.list(endpoint, user, cap) {
                Ok(profiles) => return Ok(profiles),
                Err(err) if err.is_retryable() => {
                    self.limiter.sink().emit(Event::FetchRetried {
                        endpoint,
                        id: user,
                        error: err.to_string(),
                    });
                    self.limiter
                        .back_off(&mut self.client, endpoint, &err, &mut attempts)?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::clock::ManualClock;
    use crate::directory::fixture::{DirectoryExport, ExportedUser};
    use crate::directory::StaticDirectory;
    use crate::events::RecordingSink;

    fn user(id: u64, friends: &[u64], followers: &[u64]) -> ExportedUser {
        ExportedUser {
            id: UserId(id),
            name: format!("User {id}"),
            screen_name: format!("user{id}"),
            friends: friends.iter().map(|&i| UserId(i)).collect(),
            followers: followers.iter().map(|&i| UserId(i)).collect(),
        }
    }

    #[test]
    fn test_limit_metric() {
        assert_eq!(LimitMode::Explored.metric(10, 4), 6);
        assert_eq!(LimitMode::Visited.metric(10, 4), 10);
    }

    #[test]
    fn test_friends_recorded_before_followers() {
        let directory = StaticDirectory::from_export(DirectoryExport {
            users: vec![user(1, &[2, 3], &[3, 4])],
        });
        let sink = RecordingSink::new();
        let config = CrawlConfig::new("1").with_limit(1, LimitMode::Explored);
        let mut crawler = GraphCrawler::new(config, directory, ManualClock::default(), &sink);

        let report = crawler.crawl().unwrap();
        let entry = report.dataset.adjacency.get(&UserId(1)).unwrap();

        assert_eq!(entry.friends, vec![UserId(2), UserId(3)]);
        assert_eq!(entry.followers, vec![UserId(3), UserId(4)]);
        assert_eq!(report.frontier, vec![UserId(2), UserId(3), UserId(4)]);
        assert_eq!(report.outcome, CrawlOutcome::LimitReached);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, Event::SeedResolved { id: UserId(1), .. })));
    }

    #[test]
    fn test_unknown_seed_is_fatal() {
        let directory = StaticDirectory::default();
        let config = CrawlConfig::new("nobody");
        let mut crawler = GraphCrawler::new(config, directory, ManualClock::default(), RecordingSink::new());

        let err = crawler.crawl().unwrap_err();
        assert!(matches!(err, CrawlError::Directory(_)));
    }
}
