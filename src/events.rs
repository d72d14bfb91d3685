//! Structured progress events emitted by the crawler and the rank engine
//!
//! Core code never logs directly. It reports [`Event`]s to an [`EventSink`]
//! supplied by the caller; [`LogSink`] forwards them to the `log` facade and
//! [`RecordingSink`] keeps them in memory for inspection.

use crate::directory::{Endpoint, UserId};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// The endpoint reported no remaining calls
    QuotaExhausted,
    /// A fetch failed and the reset time was available
    FetchFailed,
    /// The quota itself could not be read
    QuotaUnavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    QuotaChecked {
        endpoint: Endpoint,
        remaining: u32,
    },
    Waiting {
        endpoint: Endpoint,
        duration: Duration,
        reason: WaitReason,
    },
    SeedResolved {
        id: UserId,
        screen_name: String,
    },
    NodeSelected {
        id: UserId,
        screen_name: String,
    },
    Fetched {
        endpoint: Endpoint,
        id: UserId,
        count: usize,
        discovered: usize,
    },
    FetchRetried {
        endpoint: Endpoint,
        id: UserId,
        error: String,
    },
    Progress {
        metric: usize,
        limit: usize,
        visited: usize,
        frontier: usize,
    },
    SnapshotSaved {
        slot: usize,
    },
    RankIteration {
        algorithm: &'static str,
        iteration: usize,
        max_delta: f64,
    },
    RankFinished {
        algorithm: &'static str,
        iterations: usize,
        converged: bool,
    },
}

/// Receiver for [`Event`]s
pub trait EventSink {
    fn emit(&self, event: Event);
}

impl<S: EventSink + ?Sized> EventSink for &S {
    fn emit(&self, event: Event) {
        (**self).emit(event)
    }
}

/// Forwards events to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: Event) {
        match event {
            Event::QuotaChecked { endpoint, remaining } => {
                log::debug!("{} endpoint remaining: {}", endpoint, remaining)
            }
            Event::Waiting {
                endpoint,
                duration,
                reason,
            } => log::warn!(
                "Sleeping for {} seconds on the {} endpoint ({:?})",
                duration.as_secs(),
                endpoint,
                reason
            ),
            Event::SeedResolved { id, screen_name } => {
                log::info!("Seed user {} ({})", screen_name, id)
            }
            Event::NodeSelected { id, screen_name } => {
                log::info!("Selected: {} ({})", screen_name, id)
            }
            Event::Fetched {
                endpoint,
                id,
                count,
                discovered,
            } => log::info!(
                "Found {} {} for {} ({} new)",
                count,
                endpoint,
                id,
                discovered
            ),
            Event::FetchRetried { endpoint, id, error } => {
                log::warn!("Retrying {} for {}: {}", endpoint, id, error)
            }
            Event::Progress {
                metric,
                limit,
                visited,
                frontier,
            } => log::info!(
                "Progress {}/{} (visited: {}, frontier: {})",
                metric,
                limit,
                visited,
                frontier
            ),
            Event::SnapshotSaved { slot } => log::debug!("Latest save slot: {}", slot),
            Event::RankIteration {
                algorithm,
                iteration,
                max_delta,
            } => log::debug!(
                "{} iteration {}: max delta {:.6}",
                algorithm,
                iteration,
                max_delta
            ),
            Event::RankFinished {
                algorithm,
                iterations,
                converged,
            } => {
                if converged {
                    log::info!("{} converged after {} iterations", algorithm, iterations)
                } else {
                    log::warn!("{} stopped after {} iterations without converging", algorithm, iterations)
                }
            }
        }
    }
}

/// Keeps every event in order; used by tests and by callers that want to
/// post-process a run
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Total time spent in [`Event::Waiting`]
    pub fn total_wait(&self) -> Duration {
        self.events()
            .iter()
            .filter_map(|e| match e {
                Event::Waiting { duration, .. } => Some(*duration),
                _ => None,
            })
            .sum()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
