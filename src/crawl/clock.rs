//! Time source used by the rate limiter

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Reads the current unix time and blocks the calling thread
pub trait Clock {
    /// Seconds since the unix epoch
    fn now(&self) -> i64;

    fn sleep(&self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> i64 {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Wall clock backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Default)]
struct ManualState {
    now: i64,
    sleeps: Vec<Duration>,
}

/// Clock that only advances when slept on.
///
/// Clones share the same timeline, so a test can hand one clone to the
/// limiter and inspect the recorded sleeps through another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn starting_at(now: i64) -> Self {
        let clock = Self::default();
        clock.set(now);
        clock
    }

    pub fn set(&self, now: i64) {
        if let Ok(mut state) = self.state.lock() {
            state.now = now;
        }
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state
            .lock()
            .map(|s| s.sleeps.clone())
            .unwrap_or_default()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.state.lock().map(|s| s.now).unwrap_or(0)
    }

    fn sleep(&self, duration: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.sleeps.push(duration);
            state.now += duration.as_secs() as i64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_on_sleep() {
        let clock = ManualClock::starting_at(1_000);
        let observer = clock.clone();

        clock.sleep(Duration::from_secs(30));
        clock.sleep(Duration::from_secs(5));

        assert_eq!(observer.now(), 1_035);
        assert_eq!(observer.sleeps().len(), 2);
        assert_eq!(observer.total_slept(), Duration::from_secs(35));
    }
}
