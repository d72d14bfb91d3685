use follow_rank::crawl::{Clock, CrawlOutcome, GraphCrawler, LimitMode, ManualClock, RetryPolicy};
use follow_rank::directory::fixture::{DirectoryExport, ExportedUser};
use follow_rank::directory::{DirectoryClient, Endpoint, Profile, Quota, StaticDirectory, UserId};
use follow_rank::error::{CrawlError, DirectoryError};
use follow_rank::events::{Event, RecordingSink};
use follow_rank::graph::dataset::VisitState;
use follow_rank::storage::SnapshotSlots;
use follow_rank::CrawlConfig;
use std::collections::VecDeque;
use std::time::Duration;

fn user(id: u64, friends: &[u64], followers: &[u64]) -> ExportedUser {
    ExportedUser {
        id: UserId(id),
        name: format!("User {id}"),
        screen_name: format!("user{id}"),
        friends: friends.iter().map(|&i| UserId(i)).collect(),
        followers: followers.iter().map(|&i| UserId(i)).collect(),
    }
}

/// Small tree-like graph reachable from user 1
fn small_directory() -> StaticDirectory {
    StaticDirectory::from_export(DirectoryExport {
        users: vec![
            user(1, &[2, 3], &[4]),
            user(2, &[5], &[1]),
            user(3, &[1], &[]),
            user(4, &[1], &[]),
            user(5, &[], &[2]),
        ],
    })
}

/// Ten users in a ring with shortcuts, every user reachable from every other
fn ring_directory() -> StaticDirectory {
    let users = (0..10u64)
        .map(|i| user(i, &[(i + 1) % 10, (i + 3) % 10], &[(i + 9) % 10]))
        .collect();
    StaticDirectory::from_export(DirectoryExport { users })
}

fn ids(raw: &[u64]) -> Vec<UserId> {
    raw.iter().map(|&i| UserId(i)).collect()
}

/// Wraps a directory with scripted quotas and list failures, recording the
/// clock time of every list call
struct ThrottledDirectory {
    inner: StaticDirectory,
    clock: ManualClock,
    quotas: VecDeque<Quota>,
    list_failures: VecDeque<DirectoryError>,
    list_calls: Vec<(Endpoint, UserId, i64)>,
}

impl ThrottledDirectory {
    fn new(inner: StaticDirectory, clock: ManualClock) -> Self {
        Self {
            inner,
            clock,
            quotas: VecDeque::new(),
            list_failures: VecDeque::new(),
            list_calls: Vec::new(),
        }
    }
}

impl DirectoryClient for ThrottledDirectory {
    fn get_profile(&mut self, id_or_name: &str) -> Result<Profile, DirectoryError> {
        self.inner.get_profile(id_or_name)
    }

    fn list(&mut self, endpoint: Endpoint, id: UserId, cap: usize) -> Result<Vec<Profile>, DirectoryError> {
        self.list_calls.push((endpoint, id, self.clock.now()));
        if let Some(err) = self.list_failures.pop_front() {
            return Err(err);
        }
        self.inner.list(endpoint, id, cap)
    }

    fn quota(&mut self, _endpoint: Endpoint) -> Result<Quota, DirectoryError> {
        Ok(self.quotas.pop_front().unwrap_or(Quota {
            remaining: 15,
            reset_time: 0,
        }))
    }
}

#[test]
fn test_explored_limit_leaves_frontier() {
    let config = CrawlConfig::new("0").with_limit(4, LimitMode::Explored);
    let mut crawler = GraphCrawler::new(config, ring_directory(), ManualClock::default(), RecordingSink::new());

    let report = crawler.crawl().unwrap();

    assert_eq!(report.outcome, CrawlOutcome::LimitReached);
    assert_eq!(report.explored, 4);
    assert!(!report.frontier.is_empty());
    assert_eq!(report.dataset.len() - report.frontier.len(), 4);
    assert!(report.dataset.is_consistent());
}

#[test]
fn test_visited_limit_counts_every_observed_user() {
    let config = CrawlConfig::new("user1").with_limit(3, LimitMode::Visited);
    let mut crawler = GraphCrawler::new(config, small_directory(), ManualClock::default(), RecordingSink::new());

    let report = crawler.crawl().unwrap();

    // Exploring the seed alone already observes four users
    assert_eq!(report.outcome, CrawlOutcome::LimitReached);
    assert_eq!(report.explored, 1);
    assert_eq!(report.dataset.len(), 4);
    assert_eq!(report.frontier, ids(&[2, 3, 4]));
}

#[test]
fn test_visited_limit_of_one_still_explores_seed() {
    let config = CrawlConfig::new("1").with_limit(1, LimitMode::Visited);
    let mut crawler = GraphCrawler::new(config, small_directory(), ManualClock::default(), RecordingSink::new());

    let report = crawler.crawl().unwrap();

    assert_eq!(report.outcome, CrawlOutcome::LimitReached);
    assert_eq!(report.explored, 1);
    let entry = report.dataset.adjacency.get(&UserId(1)).unwrap();
    assert_eq!(entry.friends, ids(&[2, 3]));
    assert_eq!(entry.followers, ids(&[4]));
}

#[test]
fn test_zero_limit_explores_nothing() {
    let config = CrawlConfig::new("1").with_limit(0, LimitMode::Visited);
    let mut crawler = GraphCrawler::new(config, small_directory(), ManualClock::default(), RecordingSink::new());

    let report = crawler.crawl().unwrap();

    assert_eq!(report.outcome, CrawlOutcome::LimitReached);
    assert_eq!(report.explored, 0);
    assert_eq!(report.frontier, ids(&[1]));
}

#[test]
fn test_breadth_first_order_until_frontier_exhausted() {
    let sink = RecordingSink::new();
    let config = CrawlConfig::new("@USER1").with_limit(100, LimitMode::Explored);
    let mut crawler = GraphCrawler::new(config, small_directory(), ManualClock::default(), &sink);

    let report = crawler.crawl().unwrap();

    assert_eq!(report.outcome, CrawlOutcome::FrontierExhausted);
    assert!(report.frontier.is_empty());
    assert_eq!(report.explored, 5);
    assert_eq!(report.dataset.visited.keys().collect::<Vec<_>>(), ids(&[1, 2, 3, 4, 5]));

    let selected: Vec<UserId> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::NodeSelected { id, .. } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(selected, ids(&[1, 2, 3, 4, 5]));

    // Links to already visited users are still recorded
    let entry = report.dataset.adjacency.get(&UserId(2)).unwrap();
    assert_eq!(entry.friends, ids(&[5]));
    assert_eq!(entry.followers, ids(&[1]));
    assert!(report.dataset.is_consistent());
    assert_eq!(
        report.dataset.visit_state(&UserId(5), &report.frontier),
        VisitState::Explored
    );
}

#[test]
fn test_per_node_caps_truncate_lists() {
    let config = CrawlConfig::new("1")
        .with_caps(1, 0)
        .with_limit(1, LimitMode::Explored);
    let mut crawler = GraphCrawler::new(config, small_directory(), ManualClock::default(), RecordingSink::new());

    let report = crawler.crawl().unwrap();
    let entry = report.dataset.adjacency.get(&UserId(1)).unwrap();

    assert_eq!(entry.friends, ids(&[2]));
    assert!(entry.followers.is_empty());
    assert_eq!(report.dataset.len(), 2);
}

#[test]
fn test_exhausted_quota_blocks_until_reset() {
    let clock = ManualClock::starting_at(1_000);
    let mut directory = ThrottledDirectory::new(small_directory(), clock.clone());
    directory.quotas.push_back(Quota {
        remaining: 0,
        reset_time: 1_120,
    });

    let sink = RecordingSink::new();
    let config = CrawlConfig::new("1").with_limit(1, LimitMode::Explored);
    let mut crawler = GraphCrawler::new(config, &mut directory, clock.clone(), &sink);
    let report = crawler.crawl().unwrap();
    drop(crawler);

    assert_eq!(report.outcome, CrawlOutcome::LimitReached);
    assert!(clock.total_slept() >= Duration::from_secs(120));
    let (endpoint, _, first_call_at) = directory.list_calls[0];
    assert_eq!(endpoint, Endpoint::Friends);
    assert!(first_call_at >= 1_120);
    assert!(sink.total_wait() >= Duration::from_secs(120));
}

#[test]
fn test_failed_fetch_is_retried_without_duplicates() {
    let clock = ManualClock::starting_at(0);
    let mut directory = ThrottledDirectory::new(small_directory(), clock.clone());
    directory
        .list_failures
        .push_back(DirectoryError::TransientFailure("connection reset".into()));

    let sink = RecordingSink::new();
    let config = CrawlConfig::new("1")
        .with_limit(1, LimitMode::Explored)
        .with_retry(RetryPolicy::unbounded().with_fallback_wait(Duration::from_secs(5)));
    let mut crawler = GraphCrawler::new(config, &mut directory, clock.clone(), &sink);
    let report = crawler.crawl().unwrap();
    drop(crawler);

    let entry = report.dataset.adjacency.get(&UserId(1)).unwrap();
    assert_eq!(entry.friends, ids(&[2, 3]));
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5)]);
    // Friends twice (failure + retry), followers once
    assert_eq!(directory.list_calls.len(), 3);
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, Event::FetchRetried { endpoint: Endpoint::Friends, .. })));
}

#[test]
fn test_bounded_retry_surfaces_error() {
    let clock = ManualClock::starting_at(0);
    let mut directory = ThrottledDirectory::new(small_directory(), clock.clone());
    for _ in 0..10 {
        directory
            .list_failures
            .push_back(DirectoryError::QuotaExceeded(Endpoint::Friends));
    }

    let config = CrawlConfig::new("1").with_retry(RetryPolicy::unbounded().with_max_attempts(3));
    let mut crawler = GraphCrawler::new(config, &mut directory, clock.clone(), RecordingSink::new());

    match crawler.crawl() {
        Err(CrawlError::RetriesExhausted { endpoint, attempts, .. }) => {
            assert_eq!(endpoint, Endpoint::Friends);
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_live_save_alternates_slots() {
    let dir = tempfile::tempdir().unwrap();
    let users_prefix = dir.path().join("users_");
    let adj_prefix = dir.path().join("adj_list_");

    let sink = RecordingSink::new();
    let config = CrawlConfig::new("0")
        .with_limit(3, LimitMode::Explored)
        .with_live_save(&users_prefix, &adj_prefix);
    let mut crawler = GraphCrawler::new(config, ring_directory(), ManualClock::default(), &sink);
    let report = crawler.crawl().unwrap();

    assert_eq!(report.snapshots_written, 3);
    let slots: Vec<usize> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::SnapshotSaved { slot } => Some(slot),
            _ => None,
        })
        .collect();
    assert_eq!(slots, vec![0, 1, 0]);

    // The newest slot holds the final state; the other one is a step behind
    let mut reader = SnapshotSlots::new(&users_prefix, &adj_prefix);
    let (users0, adj0) = reader.paths(0);
    let (users1, adj1) = reader.paths(1);
    let newest = follow_rank::storage::load_dataset(users0, adj0).unwrap();
    let previous = follow_rank::storage::load_dataset(users1, adj1).unwrap();
    assert_eq!(newest, report.dataset);
    assert!(previous.len() <= newest.len());
    assert!(previous.is_consistent());

    // A fresh writer starts over at slot 0
    assert_eq!(reader.save(&newest).unwrap(), 0);
}
