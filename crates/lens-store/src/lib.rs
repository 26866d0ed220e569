//! # lens-store
//!
//! Concurrent in-memory summary store for gpulens.
//!
//! This crate provides:
//! - `SummaryStore`: per-GPU summaries keyed by (job, node, gpu_index),
//!   with idempotent last-writer-wins upserts and discard accounting
//! - Per-job advisory analysis locks so analysis runs at most once
//!   concurrently per job
//! - Capacity limits and age-based cleanup
//!
//! Updates to different keys proceed fully in parallel; updates to the
//! same key serialize through the map shard. Store pressure surfaces as a
//! typed error the caller converts into a counted drop, never a failure
//! that blocks ingest.

use thiserror::Error;

pub mod config;
pub mod lock;
pub mod store;

// Re-export commonly used types
pub use config::StoreConfig;
pub use lock::{AnalysisGuard, AnalysisLocks};
pub use store::{ApplyReport, StoreStats, SummaryStore};

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store capacity exceeded: {0}")]
    Capacity(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] lens_core::Error),
}
