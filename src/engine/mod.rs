//! Crawl engine: owns the three shared tables, the counters,
//! the worker pool, the rate limiter, the signal handler, the per-URL
//! callback dispatch, and the termination decision.

pub mod admission;
pub mod engine;
pub mod rate_limiter;
pub mod tables;
mod worker;

pub use engine::{CrawlConfig, CrawlEngine, DoneCallback, VisitedCallback, VisitedUrl};
