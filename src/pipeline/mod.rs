// src/pipeline/mod.rs

//! The change-detection and notification engine.

pub mod aggregate;
pub mod crawl;
pub mod delta;
pub mod format;

pub use aggregate::{AggregatedSummary, aggregate};
pub use crawl::{CrawlOrchestrator, RunStats};
pub use delta::{Delta, compute};
