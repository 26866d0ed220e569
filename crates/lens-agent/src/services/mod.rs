//! Agent services
//!
//! Two long-running workers: the ingest service drains the payload queue
//! into the store, and the analysis service turns scheduler triggers into
//! emitted results.

pub mod analysis;
pub mod ingest;

pub use analysis::{AnalysisRequest, AnalysisService};
pub use ingest::IngestService;
