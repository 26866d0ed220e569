//! Metric summary model for finished jobs
//!
//! These structures represent the aggregated per-GPU statistics produced by
//! the sampling sidecars, and the per-job view the engine assembles from
//! them. Optional metrics are modeled as honest `Option`s: a field the
//! sidecar never observed is absent, not zero, and stays excluded from
//! every aggregation downstream.

use crate::types::{JobId, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Job identity and requested resources, supplied by the scheduler
/// accounting integration when the job finishes
///
/// Read-only input: the engine never mutates job metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    /// Scheduler-assigned job identifier
    pub job_id: JobId,

    /// Partition/queue the job ran in
    pub partition: String,

    /// Walltime the job requested, in seconds
    pub walltime_requested_seconds: u64,

    /// Walltime the job actually consumed, in seconds
    pub walltime_used_seconds: u64,

    /// Number of GPUs the job requested
    pub gpus_requested: u32,

    /// Number of CPU cores the job requested
    pub cpus_requested: u32,

    /// Job exit code as reported by the scheduler
    pub exit_code: i32,

    /// Resource options the submit script actually set, keyed by option
    /// name (e.g. `--gres` -> `gpu:8`). Recommendations may only diff
    /// options present here.
    #[serde(default)]
    pub submit_options: BTreeMap<String, String>,
}

impl JobMetadata {
    /// Walltime used, in hours
    pub fn walltime_used_hours(&self) -> f64 {
        self.walltime_used_seconds as f64 / 3600.0
    }

    /// Total GPU-hours the allocation held
    pub fn allocated_gpu_hours(&self) -> f64 {
        self.walltime_used_hours() * self.gpus_requested as f64
    }
}

/// Summary statistics for one sampled metric series
///
/// Matches the shape the sidecar summarizer emits for every series it
/// parses: average, 95th percentile, and maximum over the job's samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    /// Mean over all samples
    pub avg: f64,

    /// 95th percentile over all samples
    pub p95: f64,

    /// Maximum observed sample
    pub max: f64,
}

impl MetricSummary {
    /// Create a summary from its three statistics
    pub fn new(avg: f64, p95: f64, max: f64) -> Self {
        Self { avg, p95, max }
    }

    /// Summary for a constant series (all three statistics equal)
    pub fn constant(value: f64) -> Self {
        Self {
            avg: value,
            p95: value,
            max: value,
        }
    }

    /// Check all three statistics are finite
    pub fn is_finite(&self) -> bool {
        self.avg.is_finite() && self.p95.is_finite() && self.max.is_finite()
    }
}

/// One fixed-width bucket of a time-resolved utilization trace
///
/// Buckets are averages over consecutive windows measured from job start,
/// letting rules see utilization shape over time, not just scalars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilBucket {
    /// Offset of the bucket start from job start, in seconds
    pub offset_seconds: u64,

    /// Mean GPU utilization within the bucket (0-100)
    pub avg_util_pct: f64,
}

/// The optional metric families a GPU sample may carry
///
/// Used by the rule engine to check presence before evaluating, instead of
/// substituting sentinel values for absent metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    /// GPU core utilization percentage
    Utilization,
    /// VRAM utilization percentage
    VramUtilization,
    /// Peak memory footprint in GB
    PeakMemory,
    /// Board power draw in watts
    Power,
    /// Core temperature in Celsius
    Temperature,
    /// Core clock in MHz
    ClockCore,
    /// Memory clock in MHz
    ClockMemory,
    /// Time-bucketed utilization trace
    UtilTrace,
}

/// Aggregated statistics for one GPU observed during one job
///
/// One summary exists per (node, gpu_index) pair the sidecars reported at
/// least once. Every metric beyond the pair identity is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuSampleSummary {
    /// Node the GPU lives on
    pub node: NodeId,

    /// GPU index on that node
    pub gpu_index: u32,

    /// GPU core utilization summary (percent)
    pub util_pct: Option<MetricSummary>,

    /// VRAM utilization summary (percent)
    pub vram_pct: Option<MetricSummary>,

    /// Peak memory footprint in GB
    pub peak_mem_gb: Option<f64>,

    /// Board power draw summary (watts)
    pub power_w: Option<MetricSummary>,

    /// Core temperature summary (Celsius)
    pub temp_c: Option<MetricSummary>,

    /// Core clock summary (MHz)
    pub clock_core_mhz: Option<MetricSummary>,

    /// Memory clock summary (MHz)
    pub clock_mem_mhz: Option<MetricSummary>,

    /// Time-bucketed utilization trace from job start
    pub util_trace: Option<Vec<UtilBucket>>,

    /// Number of raw samples behind this summary
    pub sample_count: u64,

    /// Producer timestamp of the payload this summary arrived in
    pub produced_at: Option<DateTime<Utc>>,
}

impl GpuSampleSummary {
    /// Create an empty summary carrying only the pair identity
    pub fn new(node: NodeId, gpu_index: u32) -> Self {
        Self {
            node,
            gpu_index,
            util_pct: None,
            vram_pct: None,
            peak_mem_gb: None,
            power_w: None,
            temp_c: None,
            clock_core_mhz: None,
            clock_mem_mhz: None,
            util_trace: None,
            sample_count: 0,
            produced_at: None,
        }
    }

    /// Average utilization over the job, if the series was observed
    pub fn avg_util(&self) -> Option<f64> {
        self.util_pct.map(|u| u.avg)
    }

    /// Whether this GPU counted as active at the given threshold
    ///
    /// A GPU with no observed utilization is never active; it is also
    /// never treated as provably idle by callers that need evidence.
    pub fn is_active(&self, active_threshold_pct: f64) -> bool {
        self.avg_util()
            .map(|u| u > active_threshold_pct)
            .unwrap_or(false)
    }

    /// The set of optional metric families actually observed for this GPU
    pub fn observed_fields(&self) -> BTreeSet<MetricField> {
        let mut fields = BTreeSet::new();
        if self.util_pct.is_some() {
            fields.insert(MetricField::Utilization);
        }
        if self.vram_pct.is_some() {
            fields.insert(MetricField::VramUtilization);
        }
        if self.peak_mem_gb.is_some() {
            fields.insert(MetricField::PeakMemory);
        }
        if self.power_w.is_some() {
            fields.insert(MetricField::Power);
        }
        if self.temp_c.is_some() {
            fields.insert(MetricField::Temperature);
        }
        if self.clock_core_mhz.is_some() {
            fields.insert(MetricField::ClockCore);
        }
        if self.clock_mem_mhz.is_some() {
            fields.insert(MetricField::ClockMemory);
        }
        if self.util_trace.is_some() {
            fields.insert(MetricField::UtilTrace);
        }
        fields
    }
}

/// Per-job view over every GPU summary observed for the job
///
/// Assembled by the store on demand. The (node, gpu_index) pairs are
/// unique and ordered; the store's keying enforces the invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetricSummary {
    /// Job this summary describes
    pub job_id: JobId,

    /// Per-GPU summaries, ordered by (node, gpu_index)
    pub gpus: Vec<GpuSampleSummary>,

    /// Average CPU utilization across the job's nodes (percent)
    pub cpu_util_avg_pct: Option<f64>,

    /// GPUs the job requested (from metadata, denormalized for rules)
    pub gpus_requested: u32,

    /// Distinct nodes that delivered at least one payload
    pub nodes_reporting: u32,

    /// Payloads the validator discarded for this job
    ///
    /// Any non-zero count marks the final result partial.
    pub discarded_payloads: u64,
}

impl JobMetricSummary {
    /// Number of distinct (node, gpu) pairs observed
    pub fn observed_gpus(&self) -> u32 {
        self.gpus.len() as u32
    }

    /// GPUs that reported a utilization series
    pub fn gpus_with_util(&self) -> impl Iterator<Item = &GpuSampleSummary> {
        self.gpus.iter().filter(|g| g.util_pct.is_some())
    }

    /// Count of GPUs active at the given threshold
    pub fn active_gpu_count(&self, active_threshold_pct: f64) -> u32 {
        self.gpus
            .iter()
            .filter(|g| g.is_active(active_threshold_pct))
            .count() as u32
    }

    /// Whether ingest lost data for this job
    pub fn is_partial(&self) -> bool {
        self.discarded_payloads > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(node: &str, gpu: u32, util: Option<f64>) -> GpuSampleSummary {
        let mut s = GpuSampleSummary::new(NodeId::new(node), gpu);
        s.util_pct = util.map(MetricSummary::constant);
        s.sample_count = 10;
        s
    }

    #[test]
    fn test_metadata_gpu_hours() {
        let meta = JobMetadata {
            job_id: JobId::new("1"),
            partition: "gpu".to_string(),
            walltime_requested_seconds: 7200,
            walltime_used_seconds: 3600,
            gpus_requested: 4,
            cpus_requested: 16,
            exit_code: 0,
            submit_options: BTreeMap::new(),
        };

        assert_eq!(meta.walltime_used_hours(), 1.0);
        assert_eq!(meta.allocated_gpu_hours(), 4.0);
    }

    #[test]
    fn test_observed_fields_tracks_presence() {
        let mut s = GpuSampleSummary::new(NodeId::new("n1"), 0);
        assert!(s.observed_fields().is_empty());

        s.util_pct = Some(MetricSummary::new(50.0, 80.0, 95.0));
        s.power_w = Some(MetricSummary::constant(250.0));

        let fields = s.observed_fields();
        assert!(fields.contains(&MetricField::Utilization));
        assert!(fields.contains(&MetricField::Power));
        assert!(!fields.contains(&MetricField::Temperature));
    }

    #[test]
    fn test_missing_util_never_active() {
        let s = sample("n1", 0, None);
        assert!(!s.is_active(30.0));
        assert_eq!(s.avg_util(), None);
    }

    #[test]
    fn test_active_threshold_is_exclusive() {
        // Exactly at the threshold is not active; "exceeds" means strictly above.
        assert!(!sample("n1", 0, Some(30.0)).is_active(30.0));
        assert!(sample("n1", 0, Some(30.1)).is_active(30.0));
    }

    #[test]
    fn test_job_summary_counts() {
        let summary = JobMetricSummary {
            job_id: JobId::new("1"),
            gpus: vec![
                sample("n1", 0, Some(85.0)),
                sample("n1", 1, Some(5.0)),
                sample("n2", 0, None),
            ],
            cpu_util_avg_pct: Some(40.0),
            gpus_requested: 4,
            nodes_reporting: 2,
            discarded_payloads: 0,
        };

        assert_eq!(summary.observed_gpus(), 3);
        assert_eq!(summary.gpus_with_util().count(), 2);
        assert_eq!(summary.active_gpu_count(30.0), 1);
        assert!(!summary.is_partial());
    }

    #[test]
    fn test_partial_flag_from_discards() {
        let summary = JobMetricSummary {
            job_id: JobId::new("1"),
            gpus: vec![],
            cpu_util_avg_pct: None,
            gpus_requested: 2,
            nodes_reporting: 0,
            discarded_payloads: 1,
        };

        assert!(summary.is_partial());
    }

    #[test]
    fn test_metric_summary_finite() {
        assert!(MetricSummary::new(1.0, 2.0, 3.0).is_finite());
        assert!(!MetricSummary::new(f64::NAN, 2.0, 3.0).is_finite());
        assert!(!MetricSummary::new(1.0, f64::INFINITY, 3.0).is_finite());
    }
}
