//! # lens-analysis
//!
//! Analysis pipeline for gpulens: derived efficiency metrics, the four-way
//! efficiency classification, the root-cause rule engine, right-sizing
//! recommendations, and final result assembly.
//!
//! Everything here is pure computation over the core model. Missing data
//! flows through as first-class `InsufficientData`, never as substituted
//! zeros, and assembly cannot fail: the worst case is a minimal result
//! explicitly marked partial.
//!
//! ## Example
//!
//! ```rust
//! use lens_analysis::{AnalysisConfig, ResultAssembler};
//! use lens_core::{JobId, JobMetadata};
//!
//! let assembler = ResultAssembler::new(AnalysisConfig::default());
//! # let meta = JobMetadata {
//! #     job_id: JobId::new("1"), partition: "gpu".into(),
//! #     walltime_requested_seconds: 3600, walltime_used_seconds: 3600,
//! #     gpus_requested: 2, cpus_requested: 8, exit_code: 0,
//! #     submit_options: Default::default(),
//! # };
//! // A job with no stored summary still yields a (partial) result.
//! let result = assembler.assemble(&meta, None);
//! assert!(result.partial);
//! assert!(result.class.is_none());
//! ```

pub mod assemble;
pub mod classify;
pub mod config;
pub mod metrics;
pub mod recommend;
pub mod result;
pub mod rules;

// Re-export main types
pub use assemble::ResultAssembler;
pub use classify::{classify, EfficiencyClass};
pub use config::{AnalysisConfig, ClassThresholds, RecommendationConfig, RuleThresholds};
pub use metrics::{EfficiencyCalculator, EfficiencyMetrics, EfficiencyOutcome};
pub use recommend::{OptionDiff, Recommendation, RecommendationGenerator};
pub use result::{JobEfficiencyResult, RESULT_SCHEMA_VERSION};
pub use rules::{Evidence, RootCause, RootCauseTag, RuleEngine};
