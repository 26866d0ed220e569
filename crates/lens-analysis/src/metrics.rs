//! Derived efficiency metrics
//!
//! A pure function over one job's metric summary and metadata. With zero
//! utilization-bearing GPU samples the outcome is `InsufficientData` - an
//! explicit computed state the rest of the pipeline propagates, never a
//! substituted zero that would misclassify the job as wasted.

use crate::config::AnalysisConfig;
use lens_core::{JobMetadata, JobMetricSummary};
use serde::{Deserialize, Serialize};

/// Scalar efficiency metrics derived for one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    /// Mean of per-GPU average utilization, equally weighted (percent)
    pub avg_gpu_util_pct: f64,

    /// Fraction of requested GPUs that were active
    pub effective_gpu_fraction: f64,

    /// GPU-hours held but not effectively used
    pub estimated_wasted_gpu_hours: f64,

    /// GPUs whose average utilization exceeded the active threshold
    pub active_gpus: u32,

    /// Distinct GPUs observed at least once
    pub observed_gpus: u32,
}

/// Outcome of the efficiency calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EfficiencyOutcome {
    /// Metrics were computable
    Metrics(EfficiencyMetrics),

    /// No GPU sample carried utilization; the job cannot be classified
    InsufficientData,
}

impl EfficiencyOutcome {
    /// The computed metrics, if any
    pub fn metrics(&self) -> Option<&EfficiencyMetrics> {
        match self {
            EfficiencyOutcome::Metrics(m) => Some(m),
            EfficiencyOutcome::InsufficientData => None,
        }
    }

    /// Whether the calculation had enough data
    pub fn is_insufficient(&self) -> bool {
        matches!(self, EfficiencyOutcome::InsufficientData)
    }
}

/// Computes derived efficiency metrics
#[derive(Debug, Clone)]
pub struct EfficiencyCalculator {
    config: AnalysisConfig,
}

impl EfficiencyCalculator {
    /// Create a calculator with the given configuration
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Compute derived metrics for one job
    ///
    /// GPUs that were observed without a utilization series count toward
    /// `observed_gpus` but are excluded from the mean and never active.
    pub fn compute(&self, summary: &JobMetricSummary, meta: &JobMetadata) -> EfficiencyOutcome {
        let utils: Vec<f64> = summary
            .gpus_with_util()
            .filter_map(|g| g.avg_util())
            .collect();

        if utils.is_empty() {
            return EfficiencyOutcome::InsufficientData;
        }

        let avg_gpu_util_pct = utils.iter().sum::<f64>() / utils.len() as f64;

        let active_gpus = summary.active_gpu_count(self.config.active_threshold_pct);
        let observed_gpus = summary.observed_gpus();

        // Requested count is the denominator; observed stands in when the
        // accounting record is inconsistent (zero requested but samples
        // exist). The fraction is clamped so over-reporting cannot push
        // the wasted estimate negative.
        let denominator = if summary.gpus_requested > 0 {
            summary.gpus_requested
        } else {
            observed_gpus
        };
        let effective_gpu_fraction =
            (active_gpus as f64 / denominator.max(1) as f64).clamp(0.0, 1.0);

        let estimated_wasted_gpu_hours =
            (1.0 - effective_gpu_fraction) * meta.walltime_used_hours() * denominator as f64;

        EfficiencyOutcome::Metrics(EfficiencyMetrics {
            avg_gpu_util_pct,
            effective_gpu_fraction,
            estimated_wasted_gpu_hours,
            active_gpus,
            observed_gpus,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_core::{GpuSampleSummary, JobId, MetricSummary, NodeId};
    use std::collections::BTreeMap;

    fn meta(gpus: u32, walltime_seconds: u64) -> JobMetadata {
        JobMetadata {
            job_id: JobId::new("1"),
            partition: "gpu".to_string(),
            walltime_requested_seconds: walltime_seconds * 2,
            walltime_used_seconds: walltime_seconds,
            gpus_requested: gpus,
            cpus_requested: 16,
            exit_code: 0,
            submit_options: BTreeMap::new(),
        }
    }

    fn summary_with_utils(gpus_requested: u32, utils: &[Option<f64>]) -> JobMetricSummary {
        let gpus = utils
            .iter()
            .enumerate()
            .map(|(i, util)| {
                let mut g = GpuSampleSummary::new(NodeId::new("n1"), i as u32);
                g.util_pct = util.map(MetricSummary::constant);
                g
            })
            .collect();

        JobMetricSummary {
            job_id: JobId::new("1"),
            gpus,
            cpu_util_avg_pct: None,
            gpus_requested,
            nodes_reporting: 1,
            discarded_payloads: 0,
        }
    }

    #[test]
    fn test_end_to_end_example_numbers() {
        // 8 requested: 2 busy at 85%, 6 idle at 5%
        let utils: Vec<Option<f64>> = vec![
            Some(85.0),
            Some(85.0),
            Some(5.0),
            Some(5.0),
            Some(5.0),
            Some(5.0),
            Some(5.0),
            Some(5.0),
        ];
        let summary = summary_with_utils(8, &utils);
        let calculator = EfficiencyCalculator::new(AnalysisConfig::default());

        let outcome = calculator.compute(&summary, &meta(8, 3600));
        let m = outcome.metrics().unwrap();

        assert!((m.avg_gpu_util_pct - 25.0).abs() < 1e-9);
        assert_eq!(m.active_gpus, 2);
        assert!((m.effective_gpu_fraction - 0.25).abs() < 1e-9);
        // One hour, 8 GPUs, 75% ineffective
        assert!((m.estimated_wasted_gpu_hours - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_samples_is_insufficient() {
        let summary = summary_with_utils(4, &[]);
        let calculator = EfficiencyCalculator::new(AnalysisConfig::default());

        let outcome = calculator.compute(&summary, &meta(4, 3600));
        assert!(outcome.is_insufficient());
        assert!(outcome.metrics().is_none());
    }

    #[test]
    fn test_samples_without_util_are_insufficient() {
        // GPUs were observed, but none reported a utilization series
        let summary = summary_with_utils(2, &[None, None]);
        let calculator = EfficiencyCalculator::new(AnalysisConfig::default());

        assert!(calculator.compute(&summary, &meta(2, 3600)).is_insufficient());
    }

    #[test]
    fn test_util_free_gpu_excluded_from_mean() {
        let summary = summary_with_utils(2, &[Some(80.0), None]);
        let calculator = EfficiencyCalculator::new(AnalysisConfig::default());

        let outcome = calculator.compute(&summary, &meta(2, 3600));
        let m = outcome.metrics().unwrap();

        // Mean over the one reporting GPU, not dragged down by the silent one
        assert_eq!(m.avg_gpu_util_pct, 80.0);
        assert_eq!(m.observed_gpus, 2);
        assert_eq!(m.active_gpus, 1);
        assert_eq!(m.effective_gpu_fraction, 0.5);
    }

    #[test]
    fn test_fraction_clamped_when_overreported() {
        // 4 active GPUs observed against a request of 2
        let summary = summary_with_utils(2, &[Some(90.0), Some(90.0), Some(90.0), Some(90.0)]);
        let calculator = EfficiencyCalculator::new(AnalysisConfig::default());

        let m = calculator
            .compute(&summary, &meta(2, 3600))
            .metrics()
            .cloned()
            .unwrap();
        assert_eq!(m.effective_gpu_fraction, 1.0);
        assert!(m.estimated_wasted_gpu_hours.abs() < 1e-9);
    }

    #[test]
    fn test_zero_requested_falls_back_to_observed() {
        let summary = summary_with_utils(0, &[Some(90.0), Some(5.0)]);
        let calculator = EfficiencyCalculator::new(AnalysisConfig::default());

        let m = calculator
            .compute(&summary, &meta(0, 3600))
            .metrics()
            .cloned()
            .unwrap();
        assert_eq!(m.effective_gpu_fraction, 0.5);
    }
}
