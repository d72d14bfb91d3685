//! Per-endpoint quota tracking and blocking back-off

use crate::crawl::clock::Clock;
use crate::directory::{DirectoryClient, Endpoint, Quota};
use crate::error::{CrawlError, DirectoryError};
use crate::events::{Event, EventSink, WaitReason};
use std::collections::HashMap;
use std::time::Duration;

/// How long to sleep when the quota cannot be read at all
pub const FALLBACK_WAIT: Duration = Duration::from_secs(15 * 60);

/// Limits on how long a single call may keep waiting for the directory.
///
/// The default is unbounded: the caller blocks until the endpoint recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of sleeps for one call
    pub max_attempts: Option<u32>,

    /// Maximum accumulated sleep for one call
    pub max_total_wait: Option<Duration>,

    /// Sleep used when the quota query itself fails
    pub fallback_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl RetryPolicy {
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            max_total_wait: None,
            fallback_wait: FALLBACK_WAIT,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_max_total_wait(mut self, max_total_wait: Duration) -> Self {
        self.max_total_wait = Some(max_total_wait);
        self
    }

    pub fn with_fallback_wait(mut self, fallback_wait: Duration) -> Self {
        self.fallback_wait = fallback_wait;
        self
    }

    fn allows(&self, attempts: &Attempts, next_wait: Duration) -> bool {
        if let Some(max) = self.max_attempts {
            if attempts.count >= max {
                return false;
            }
        }
        if let Some(max) = self.max_total_wait {
            if attempts.waited + next_wait > max {
                return false;
            }
        }
        true
    }
}

/// Sleeps spent on behalf of one logical call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attempts {
    pub count: u32,
    pub waited: Duration,
}

/// Tracks remaining-call budgets for the directory's endpoints and blocks
/// until a call is allowed
pub struct RateLimiter<C, S> {
    clock: C,
    sink: S,
    policy: RetryPolicy,
    last_quota: HashMap<Endpoint, Quota>,
}

impl<C: Clock, S: EventSink> RateLimiter<C, S> {
    pub fn new(clock: C, sink: S) -> Self {
        Self {
            clock,
            sink,
            policy: RetryPolicy::default(),
            last_quota: HashMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Last quota observed for an endpoint, if any
    pub fn last_quota(&self, endpoint: Endpoint) -> Option<Quota> {
        self.last_quota.get(&endpoint).copied()
    }

    /// Remaining calls on `endpoint`, queried from the directory
    pub fn remaining<D: DirectoryClient>(
        &mut self,
        client: &mut D,
        endpoint: Endpoint,
    ) -> Result<u32, DirectoryError> {
        self.query(client, endpoint).map(|q| q.remaining)
    }

    /// Unix time at which `endpoint`'s budget resets
    pub fn reset_time<D: DirectoryClient>(
        &mut self,
        client: &mut D,
        endpoint: Endpoint,
    ) -> Result<i64, DirectoryError> {
        self.query(client, endpoint).map(|q| q.reset_time)
    }

    /// Block until `endpoint` has at least one call left.
    ///
    /// Sleeps until the reported reset time (at least one second) and checks
    /// again, since the reset estimate may be off. If the quota cannot be
    /// read, sleeps the policy's fallback interval before asking again.
    pub fn await_capacity<D: DirectoryClient>(
        &mut self,
        client: &mut D,
        endpoint: Endpoint,
    ) -> Result<(), CrawlError> {
        let mut attempts = Attempts::default();
        loop {
            match self.query(client, endpoint) {
                Ok(quota) if quota.remaining > 0 => return Ok(()),
                Ok(quota) => {
                    let wait = self.until(quota.reset_time, 0);
                    self.wait(endpoint, wait, WaitReason::QuotaExhausted, &mut attempts)?;
                }
                Err(_) => {
                    let wait = self.policy.fallback_wait;
                    self.wait(endpoint, wait, WaitReason::QuotaUnavailable, &mut attempts)?;
                }
            }
        }
    }

    /// Sleep after a fetch on `endpoint` failed with `error`.
    ///
    /// Quota errors wait one second past the reported reset time; other
    /// failures, and quota errors whose reset time cannot be read, wait the
    /// fallback interval.
    pub fn back_off<D: DirectoryClient>(
        &mut self,
        client: &mut D,
        endpoint: Endpoint,
        error: &DirectoryError,
        attempts: &mut Attempts,
    ) -> Result<(), CrawlError> {
        let (wait, reason) = match error {
            DirectoryError::QuotaExceeded(_) => match self.query(client, endpoint) {
                Ok(quota) => (self.until(quota.reset_time, 1), WaitReason::FetchFailed),
                Err(_) => (self.policy.fallback_wait, WaitReason::QuotaUnavailable),
            },
            _ => (self.policy.fallback_wait, WaitReason::QuotaUnavailable),
        };
        self.wait(endpoint, wait, reason, attempts)
    }

    fn query<D: DirectoryClient>(
        &mut self,
        client: &mut D,
        endpoint: Endpoint,
    ) -> Result<Quota, DirectoryError> {
        let quota = client.quota(endpoint)?;
        self.last_quota.insert(endpoint, quota);
        self.sink.emit(Event::QuotaChecked {
            endpoint,
            remaining: quota.remaining,
        });
        Ok(quota)
    }

    /// Seconds from now until `reset_time + slack`, never less than one
    fn until(&self, reset_time: i64, slack: i64) -> Duration {
        let secs = (reset_time - self.clock.now() + slack).max(1);
        Duration::from_secs(secs as u64)
    }

    fn wait(
        &self,
        endpoint: Endpoint,
        duration: Duration,
        reason: WaitReason,
        attempts: &mut Attempts,
    ) -> Result<(), CrawlError> {
        if !self.policy.allows(attempts, duration) {
            return Err(CrawlError::RetriesExhausted {
                endpoint,
                attempts: attempts.count,
                waited: attempts.waited,
            });
        }

        self.sink.emit(Event::Waiting {
            endpoint,
            duration,
            reason,
        });
        self.clock.sleep(duration);

        attempts.count += 1;
        attempts.waited += duration;
        Ok(())
    }
}
