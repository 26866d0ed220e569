//! # lens-ingest
//!
//! Ingest pipeline front end for gpulens.
//!
//! This crate provides:
//! - The wire format sampling sidecars deliver per node (`NodeSummaryPayload`)
//! - Schema validation and plausibility normalization into the core model
//! - A bounded, never-blocking ingest queue with a drop counter
//! - A mock payload generator for tests and demos
//!
//! Validation is two-tiered by design: a structurally broken payload fails
//! whole with a schema error and touches no state, while a structurally
//! sound payload with implausible or missing optional metrics is accepted
//! with the offending fields dropped, never zero-filled.

pub mod config;
pub mod payload;
pub mod queue;
pub mod validate;

// Mock payload generation for testing
#[cfg(any(feature = "mock", test))]
pub mod mock;

// Re-export main types
pub use config::IngestConfig;
pub use payload::{CpuReading, GpuReading, NodeSummaryPayload};
pub use queue::{IngestQueue, IngestReceiver, QueueStats};
pub use validate::{ValidatedPayload, Validator};

// The crate surfaces the core error type directly; ingest introduces no
// failure modes of its own beyond schema rejection.
pub use lens_core::{Error, Result};
