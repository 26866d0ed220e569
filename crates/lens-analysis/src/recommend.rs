//! Right-sizing recommendation generation
//!
//! Advisory only: a recommendation is a suggested resource change plus a
//! diff of submit-script options, never applied anywhere. Absence of a
//! recommendation is meaningful (confidence too low, or nothing to shrink)
//! and is distinct from recommending no change, so the generator returns
//! `Option` rather than a zero-value placeholder.

use crate::config::RecommendationConfig;
use crate::metrics::EfficiencyOutcome;
use crate::rules::{RootCause, RootCauseTag};
use lens_core::JobMetadata;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One submit-option change, original alongside the suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDiff {
    /// The option exactly as the job set it
    pub original: String,

    /// The suggested replacement
    pub suggested: String,
}

/// Advisory right-sizing recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Suggested GPU count for a re-run
    pub recommended_gpu_count: u32,

    /// Suggested task count, when the task mapping looked wrong
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_task_count: Option<u32>,

    /// Human-readable rationale
    pub rationale: String,

    /// Submit-option diffs, only for options the job actually set
    pub changes: Vec<OptionDiff>,
}

/// Generates recommendations from metrics and diagnosed causes
#[derive(Debug, Clone)]
pub struct RecommendationGenerator {
    config: RecommendationConfig,
}

impl RecommendationGenerator {
    /// Create a generator with the given configuration
    pub fn new(config: RecommendationConfig) -> Self {
        Self { config }
    }

    /// Derive a recommendation, or None when confidence is insufficient
    pub fn generate(
        &self,
        outcome: &EfficiencyOutcome,
        causes: &[RootCause],
        meta: &JobMetadata,
    ) -> Option<Recommendation> {
        let metrics = outcome.metrics()?;

        if metrics.effective_gpu_fraction >= 1.0 {
            return None;
        }

        let floor = self.config.confidence_floor;
        let confident = causes
            .iter()
            .any(|c| c.tag != RootCauseTag::Unknown && c.confidence >= floor);
        if !confident {
            debug!(job = %meta.job_id, "no cause at or above the confidence floor, withholding recommendation");
            return None;
        }

        let recommended_gpu_count = ((metrics.effective_gpu_fraction
            * meta.gpus_requested as f64)
            .ceil() as u32)
            .max(1);

        let recommended_task_count = causes
            .iter()
            .any(|c| c.tag == RootCauseTag::ParallelismMismatch && c.confidence >= floor)
            .then_some(recommended_gpu_count);

        let mut changes = Vec::new();
        for (option, value) in &meta.submit_options {
            if let Some(suggested) =
                rewrite_gpu_option(option, value, recommended_gpu_count, recommended_task_count)
            {
                if suggested != *value {
                    changes.push(OptionDiff {
                        original: format!("{}={}", option, value),
                        suggested: format!("{}={}", option, suggested),
                    });
                }
            }
        }

        let rationale = format!(
            "{} of {} requested GPUs were active; {:.1} GPU-hours were held idle. \
             Requesting {} GPU{} should fit this workload.",
            metrics.active_gpus,
            meta.gpus_requested,
            metrics.estimated_wasted_gpu_hours,
            recommended_gpu_count,
            if recommended_gpu_count == 1 { "" } else { "s" },
        );

        Some(Recommendation {
            recommended_gpu_count,
            recommended_task_count,
            rationale,
            changes,
        })
    }
}

/// Rewrite the GPU/task count inside a known submit option value
///
/// Returns None for options the generator does not understand; it never
/// invents options the job did not set.
fn rewrite_gpu_option(
    option: &str,
    value: &str,
    gpu_count: u32,
    task_count: Option<u32>,
) -> Option<String> {
    match option {
        // --gres=gpu:8 or --gres=gpu:a100:8 -> replace the trailing count
        "--gres" => {
            let (prefix, tail) = value.rsplit_once(':')?;
            tail.parse::<u32>().ok()?;
            Some(format!("{}:{}", prefix, gpu_count))
        }
        // Plain numeric counts
        "--gpus" | "--gpus-per-node" => {
            value.parse::<u32>().ok()?;
            Some(gpu_count.to_string())
        }
        // Task count only when the task mapping was diagnosed
        "--ntasks" => {
            value.parse::<u32>().ok()?;
            task_count.map(|t| t.to_string())
        }
        _ => None,
    }
}
