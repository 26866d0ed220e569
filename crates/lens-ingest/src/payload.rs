//! Wire format for per-node summary payloads
//!
//! One payload arrives per node per job, produced by the sampling sidecar's
//! summarizer. Field names follow the summarizer's JSON output
//! (`gpu_util_pct`, `vram_util_pct`, `power_w`, `temp_c`, `sclk_mhz`,
//! `mclk_mhz`), with per-series avg/p95/max statistics.

use chrono::{DateTime, Utc};
use lens_core::{MetricSummary, UtilBucket};
use serde::{Deserialize, Serialize};

/// Per-node summary payload delivered by a sampling sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummaryPayload {
    /// Scheduler job identifier; required
    #[serde(default)]
    pub job_id: Option<String>,

    /// Node the payload describes; required
    #[serde(default)]
    pub node: Option<String>,

    /// Producer wall-clock timestamp, used only as a last-writer tie-break
    #[serde(default)]
    pub produced_at: Option<DateTime<Utc>>,

    /// Per-GPU metric readings; may be empty
    #[serde(default)]
    pub gpus: Vec<GpuReading>,

    /// Node-level CPU reading, if the sidecar collects one
    #[serde(default)]
    pub cpu: Option<CpuReading>,
}

/// Metric readings for one GPU on the node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuReading {
    /// GPU index on the node
    pub gpu_index: u32,

    /// GPU core utilization summary (percent)
    #[serde(default)]
    pub gpu_util_pct: Option<MetricSummary>,

    /// VRAM utilization summary (percent)
    #[serde(default)]
    pub vram_util_pct: Option<MetricSummary>,

    /// Peak memory footprint in GB
    #[serde(default)]
    pub peak_mem_gb: Option<f64>,

    /// Board power draw summary (watts)
    #[serde(default)]
    pub power_w: Option<MetricSummary>,

    /// Core temperature summary (Celsius)
    #[serde(default)]
    pub temp_c: Option<MetricSummary>,

    /// Core clock summary (MHz)
    #[serde(default)]
    pub sclk_mhz: Option<MetricSummary>,

    /// Memory clock summary (MHz)
    #[serde(default)]
    pub mclk_mhz: Option<MetricSummary>,

    /// Time-bucketed utilization trace from job start
    #[serde(default)]
    pub util_trace: Option<Vec<UtilBucket>>,

    /// Number of raw samples behind the summaries
    #[serde(default)]
    pub samples: u64,
}

impl GpuReading {
    /// An empty reading for the given index
    pub fn new(gpu_index: u32) -> Self {
        Self {
            gpu_index,
            gpu_util_pct: None,
            vram_util_pct: None,
            peak_mem_gb: None,
            power_w: None,
            temp_c: None,
            sclk_mhz: None,
            mclk_mhz: None,
            util_trace: None,
            samples: 0,
        }
    }
}

/// Node-level CPU utilization reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuReading {
    /// Average CPU utilization across the job's cores on this node (percent)
    pub util_avg_pct: f64,
}
