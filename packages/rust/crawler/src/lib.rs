//! Bounded, scope-aware web crawler.
//!
//! The [`engine`] module performs BFS traversal from a start URL within a
//! single host, honoring depth, page-count, concurrency, and rate limits.

pub mod engine;

pub use engine::{CrawlOutcome, CrawledPage, Crawler};
