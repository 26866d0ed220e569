//! Configuration for the analysis pipeline
//!
//! Thresholds are policy, not contract: every cutoff below is configurable,
//! with defaults matching the cluster's published efficiency guidance.

use serde::{Deserialize, Serialize};

/// Configuration for the analysis pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// A GPU counts as active when its average utilization exceeds this (percent)
    pub active_threshold_pct: f64,

    /// Classification band boundaries
    pub classes: ClassThresholds,

    /// Root-cause rule cutoffs
    pub rules: RuleThresholds,

    /// Recommendation gating
    pub recommendation: RecommendationConfig,
}

/// Lower bounds (inclusive) of the efficiency classification bands
///
/// Anything below `inefficient_min_pct` classifies as wasted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassThresholds {
    /// Lower bound of the EFFICIENT band (percent)
    pub efficient_min_pct: f64,

    /// Lower bound of the ACCEPTABLE band (percent)
    pub acceptable_min_pct: f64,

    /// Lower bound of the INEFFICIENT band (percent)
    pub inefficient_min_pct: f64,
}

/// Cutoffs for the root-cause rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// overscaling: effective GPU fraction must fall below this
    pub overscaling_max_fraction: f64,

    /// overscaling: idle GPUs must peak below this memory footprint (GB)
    pub overscaling_idle_mem_gb: f64,

    /// cpu_bottleneck: average GPU utilization must fall below this (percent)
    pub cpu_bound_max_gpu_util_pct: f64,

    /// cpu_bottleneck: CPU utilization must exceed this (percent)
    pub cpu_bound_min_cpu_util_pct: f64,

    /// io_or_sync_stall: mean first-bucket utilization must exceed this (percent)
    pub stall_early_min_util_pct: f64,

    /// io_or_sync_stall: mean tail utilization must fall below this (percent)
    pub stall_late_max_util_pct: f64,

    /// io_or_sync_stall: minimum trace length (buckets) to evaluate
    pub stall_min_buckets: usize,

    /// parallelism_mismatch: only considered at or above this request size
    pub mismatch_min_gpus_requested: u32,

    /// parallelism_mismatch: active fraction must fall below this
    pub mismatch_max_active_fraction: f64,
}

/// Recommendation gating configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Minimum confidence (inclusive) of a non-unknown cause required
    /// before any recommendation is emitted
    pub confidence_floor: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            active_threshold_pct: 30.0,
            classes: ClassThresholds::default(),
            rules: RuleThresholds::default(),
            recommendation: RecommendationConfig::default(),
        }
    }
}

impl Default for ClassThresholds {
    fn default() -> Self {
        Self {
            efficient_min_pct: 70.0,
            acceptable_min_pct: 40.0,
            inefficient_min_pct: 15.0,
        }
    }
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            overscaling_max_fraction: 0.5,
            overscaling_idle_mem_gb: 2.0,
            cpu_bound_max_gpu_util_pct: 40.0,
            cpu_bound_min_cpu_util_pct: 80.0,
            stall_early_min_util_pct: 60.0,
            stall_late_max_util_pct: 25.0,
            stall_min_buckets: 3,
            mismatch_min_gpus_requested: 4,
            mismatch_max_active_fraction: 0.25,
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.5,
        }
    }
}

impl AnalysisConfig {
    /// Create a new analysis configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the active-GPU threshold
    pub fn with_active_threshold_pct(mut self, pct: f64) -> Self {
        self.active_threshold_pct = pct;
        self
    }

    /// Set the recommendation confidence floor
    pub fn with_confidence_floor(mut self, floor: f64) -> Self {
        self.recommendation.confidence_floor = floor;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.active_threshold_pct) {
            return Err("active_threshold_pct must be within 0-100".to_string());
        }

        let c = &self.classes;
        if !(c.inefficient_min_pct > 0.0
            && c.inefficient_min_pct < c.acceptable_min_pct
            && c.acceptable_min_pct < c.efficient_min_pct
            && c.efficient_min_pct <= 100.0)
        {
            return Err(
                "class thresholds must satisfy 0 < inefficient < acceptable < efficient <= 100"
                    .to_string(),
            );
        }

        let r = &self.rules;
        if !(0.0..=1.0).contains(&r.overscaling_max_fraction)
            || !(0.0..=1.0).contains(&r.mismatch_max_active_fraction)
        {
            return Err("rule fractions must be within 0-1".to_string());
        }

        if r.overscaling_idle_mem_gb < 0.0 {
            return Err("overscaling_idle_mem_gb must be non-negative".to_string());
        }

        if r.stall_min_buckets < 2 {
            return Err("stall_min_buckets must be at least 2".to_string());
        }

        if r.stall_early_min_util_pct <= r.stall_late_max_util_pct {
            return Err("stall early threshold must exceed the late threshold".to_string());
        }

        if !(0.0..=1.0).contains(&self.recommendation.confidence_floor) {
            return Err("confidence_floor must be within 0-1".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.active_threshold_pct, 30.0);
        assert_eq!(config.recommendation.confidence_floor, 0.5);
    }

    #[test]
    fn test_config_builder() {
        let config = AnalysisConfig::new()
            .with_active_threshold_pct(50.0)
            .with_confidence_floor(0.8);

        assert_eq!(config.active_threshold_pct, 50.0);
        assert_eq!(config.recommendation.confidence_floor, 0.8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AnalysisConfig::default();
        config.classes.acceptable_min_pct = 80.0; // above efficient
        assert!(config.validate().is_err());

        config = AnalysisConfig::default();
        config.recommendation.confidence_floor = 1.5;
        assert!(config.validate().is_err());

        config = AnalysisConfig::default();
        config.rules.stall_min_buckets = 1;
        assert!(config.validate().is_err());
    }
}
