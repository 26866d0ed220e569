//! The final job efficiency result
//!
//! The engine's sole external artifact: a versioned, immutable record
//! combining the derived metrics, the classification, the diagnosed
//! causes, and the optional recommendation. Absent optional fields are
//! omitted from the serialized form, never zero-filled. Re-analysis
//! produces a new record that supersedes the old one; nothing mutates a
//! result after assembly.

use crate::classify::EfficiencyClass;
use crate::metrics::EfficiencyMetrics;
use crate::recommend::Recommendation;
use crate::rules::RootCause;
use chrono::{DateTime, Utc};
use lens_core::JobId;
use serde::{Deserialize, Serialize};

/// Schema version of the serialized result record
pub const RESULT_SCHEMA_VERSION: u32 = 1;

/// Immutable per-job efficiency result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEfficiencyResult {
    /// Serialized record schema version
    pub schema_version: u32,

    /// Job the result describes
    pub job_id: JobId,

    /// When this result was assembled
    pub generated_at: DateTime<Utc>,

    /// Derived metrics; absent when the data was insufficient
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<EfficiencyMetrics>,

    /// Efficiency class; absent when the job could not be classified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<EfficiencyClass>,

    /// Diagnosed causes, highest confidence first (rule order on ties)
    pub causes: Vec<RootCause>,

    /// Advisory recommendation; absent when confidence was insufficient
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,

    /// True when the result was computed from incomplete ingest data
    pub partial: bool,
}

impl JobEfficiencyResult {
    /// The minimal result: efficiency could not be determined
    pub fn minimal(job_id: JobId) -> Self {
        Self {
            schema_version: RESULT_SCHEMA_VERSION,
            job_id,
            generated_at: Utc::now(),
            metrics: None,
            class: None,
            causes: Vec::new(),
            recommendation: None,
            partial: true,
        }
    }
}
