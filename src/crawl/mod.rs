//! Rate-limited breadth-first crawling of the follow graph

pub mod clock;
pub mod crawler;
pub mod limiter;

pub use clock::{Clock, ManualClock, SystemClock};
pub use crawler::{CrawlOutcome, CrawlReport, GraphCrawler, LimitMode};
pub use limiter::{Attempts, RateLimiter, RetryPolicy, FALLBACK_WAIT};
