//! Result assembly
//!
//! Combines the calculator, classifier, rule engine, and recommendation
//! generator into one infallible step. Assembly degrades instead of
//! erroring: with no stored summary, or with insufficient data, the output
//! is a minimal result explicitly marked partial.

use crate::classify::classify;
use crate::config::AnalysisConfig;
use crate::metrics::{EfficiencyCalculator, EfficiencyOutcome};
use crate::recommend::RecommendationGenerator;
use crate::result::{JobEfficiencyResult, RESULT_SCHEMA_VERSION};
use crate::rules::RuleEngine;
use chrono::Utc;
use lens_core::{JobMetadata, JobMetricSummary};
use tracing::info;

/// Assembles final job efficiency results
#[derive(Debug, Clone)]
pub struct ResultAssembler {
    config: AnalysisConfig,
    calculator: EfficiencyCalculator,
    rules: RuleEngine,
    recommender: RecommendationGenerator,
}

impl ResultAssembler {
    /// Create an assembler with the given configuration
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            calculator: EfficiencyCalculator::new(config.clone()),
            rules: RuleEngine::new(config.clone()),
            recommender: RecommendationGenerator::new(config.recommendation.clone()),
            config,
        }
    }

    /// Assemble the result for one job
    ///
    /// `summary` is None when the store holds nothing for the job. This
    /// function cannot fail; the worst case is a minimal partial result.
    pub fn assemble(
        &self,
        meta: &JobMetadata,
        summary: Option<&JobMetricSummary>,
    ) -> JobEfficiencyResult {
        let summary = match summary {
            Some(summary) => summary,
            None => {
                info!(job = %meta.job_id, "no stored summary, emitting minimal result");
                return JobEfficiencyResult::minimal(meta.job_id.clone());
            }
        };

        let outcome = self.calculator.compute(summary, meta);

        let (class, mut causes) = match outcome.metrics() {
            Some(metrics) => {
                let class = classify(metrics.avg_gpu_util_pct, &self.config.classes);
                let causes = self.rules.evaluate(metrics, summary, meta);
                (Some(class), causes)
            }
            None => (None, Vec::new()),
        };

        // Highest confidence first; the sort is stable so equal
        // confidences keep rule evaluation order.
        causes.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let recommendation = self.recommender.generate(&outcome, &causes, meta);

        // Partial whenever ingest lost payloads, the data was insufficient
        // to classify, or an observed GPU never reported utilization.
        let partial = summary.is_partial()
            || outcome.is_insufficient()
            || summary.gpus.iter().any(|g| g.util_pct.is_none());

        JobEfficiencyResult {
            schema_version: RESULT_SCHEMA_VERSION,
            job_id: meta.job_id.clone(),
            generated_at: Utc::now(),
            metrics: outcome.metrics().cloned(),
            class,
            causes,
            recommendation,
            partial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::EfficiencyClass;
    use crate::rules::RootCauseTag;
    use lens_core::{GpuSampleSummary, JobId, MetricSummary, NodeId};
    use std::collections::BTreeMap;

    fn meta(gpus: u32) -> JobMetadata {
        JobMetadata {
            job_id: JobId::new("1"),
            partition: "gpu".to_string(),
            walltime_requested_seconds: 7200,
            walltime_used_seconds: 3600,
            gpus_requested: gpus,
            cpus_requested: 16,
            exit_code: 0,
            submit_options: [("--gres".to_string(), format!("gpu:{}", gpus))]
                .into_iter()
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn gpu(index: u32, util: f64, peak_mem: Option<f64>) -> GpuSampleSummary {
        let mut g = GpuSampleSummary::new(NodeId::new("n1"), index);
        g.util_pct = Some(MetricSummary::constant(util));
        g.peak_mem_gb = peak_mem;
        g
    }

    fn summary(gpus_requested: u32, gpus: Vec<GpuSampleSummary>) -> JobMetricSummary {
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
    fn test_end_to_end_example() {
        // 8 requested: 2 at 85%, 6 idle at 5% with low peak memory
        let mut gpus = vec![gpu(0, 85.0, Some(40.0)), gpu(1, 85.0, Some(38.0))];
        for i in 2..8 {
            gpus.push(gpu(i, 5.0, Some(0.5)));
        }
        let s = summary(8, gpus);

        let assembler = ResultAssembler::new(AnalysisConfig::default());
        let result = assembler.assemble(&meta(8), Some(&s));

        let m = result.metrics.as_ref().unwrap();
        assert!((m.avg_gpu_util_pct - 25.0).abs() < 1e-9);
        assert!((m.effective_gpu_fraction - 0.25).abs() < 1e-9);
        assert_eq!(result.class, Some(EfficiencyClass::Inefficient));

        let overscaling = result
            .causes
            .iter()
            .find(|c| c.tag == RootCauseTag::Overscaling)
            .expect("overscaling should fire");
        assert!(overscaling.confidence > 0.0);

        let rec = result.recommendation.as_ref().expect("recommendation expected");
        assert_eq!(rec.recommended_gpu_count, 2);
        assert_eq!(rec.changes[0].suggested, "--gres=gpu:2");

        assert!(!result.partial);
    }

    #[test]
    fn test_insufficient_data_never_classifies_wasted() {
        let s = summary(4, vec![]);
        let assembler = ResultAssembler::new(AnalysisConfig::default());

        let result = assembler.assemble(&meta(4), Some(&s));
        assert_eq!(result.class, None);
        assert!(result.metrics.is_none());
        assert!(result.causes.is_empty());
        assert!(result.recommendation.is_none());
        assert!(result.partial);
    }

    #[test]
    fn test_missing_summary_yields_minimal_result() {
        let assembler = ResultAssembler::new(AnalysisConfig::default());
        let result = assembler.assemble(&meta(4), None);

        assert!(result.partial);
        assert!(result.class.is_none());
        assert_eq!(result.schema_version, RESULT_SCHEMA_VERSION);
    }

    #[test]
    fn test_partial_from_discards() {
        let mut s = summary(2, vec![gpu(0, 80.0, Some(20.0)), gpu(1, 75.0, Some(20.0))]);
        s.discarded_payloads = 1;

        let assembler = ResultAssembler::new(AnalysisConfig::default());
        let result = assembler.assemble(&meta(2), Some(&s));

        // Fully classifiable, but still marked partial
        assert_eq!(result.class, Some(EfficiencyClass::Efficient));
        assert!(result.partial);
    }

    #[test]
    fn test_partial_from_silent_gpu() {
        let mut silent = GpuSampleSummary::new(NodeId::new("n1"), 1);
        silent.peak_mem_gb = Some(0.2);
        let s = summary(2, vec![gpu(0, 80.0, Some(20.0)), silent]);

        let assembler = ResultAssembler::new(AnalysisConfig::default());
        let result = assembler.assemble(&meta(2), Some(&s));

        assert!(result.partial);
        assert!(result.class.is_some());
    }

    #[test]
    fn test_causes_sorted_by_confidence() {
        // CPU-bound and overscaled at once; whatever their confidences,
        // the list is non-increasing
        let mut gpus = vec![gpu(0, 35.0, Some(20.0))];
        for i in 1..8 {
            gpus.push(gpu(i, 3.0, Some(0.3)));
        }
        let mut s = summary(8, gpus);
        s.cpu_util_avg_pct = Some(96.0);

        let assembler = ResultAssembler::new(AnalysisConfig::default());
        let result = assembler.assemble(&meta(8), Some(&s));

        assert!(result.causes.len() >= 2);
        for pair in result.causes.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_healthy_job_clean_result() {
        let s = summary(2, vec![gpu(0, 88.0, Some(30.0)), gpu(1, 92.0, Some(31.0))]);
        let assembler = ResultAssembler::new(AnalysisConfig::default());

        let result = assembler.assemble(&meta(2), Some(&s));
        assert_eq!(result.class, Some(EfficiencyClass::Efficient));
        assert!(result.causes.is_empty());
        assert!(result.recommendation.is_none());
        assert!(!result.partial);
    }
}
