//! Schema validation and plausibility normalization
//!
//! A structurally invalid payload (missing identifiers, malformed JSON,
//! duplicate GPU indices) fails whole with `Error::Schema` and must not
//! touch stored state. A structurally valid payload with implausible or
//! missing optional metrics is accepted: offending fields are dropped from
//! the resulting summary and counted, never clamped or zero-filled.

use crate::config::IngestConfig;
use crate::payload::{GpuReading, NodeSummaryPayload};
use chrono::{DateTime, Utc};
use lens_core::{Error, GpuSampleSummary, JobId, MetricSummary, NodeId, Result, UtilBucket};
use std::collections::HashSet;
use tracing::debug;

/// A payload that passed schema validation, normalized into the core model
#[derive(Debug, Clone)]
pub struct ValidatedPayload {
    /// Job the payload belongs to
    pub job_id: JobId,

    /// Node that produced the payload
    pub node: NodeId,

    /// Producer timestamp, if the sidecar stamped one
    pub produced_at: Option<DateTime<Utc>>,

    /// Node-level CPU utilization, if present and plausible
    pub cpu_util_avg_pct: Option<f64>,

    /// Normalized per-GPU summaries
    pub gpus: Vec<GpuSampleSummary>,

    /// Count of implausible fields dropped during normalization
    pub normalized_fields: u64,
}

/// Validates and normalizes incoming node summary payloads
#[derive(Debug, Clone)]
pub struct Validator {
    config: IngestConfig,
}

impl Validator {
    /// Create a validator with default configuration
    pub fn new() -> Self {
        Self::with_config(IngestConfig::default())
    }

    /// Create a validator with the given configuration
    pub fn with_config(config: IngestConfig) -> Self {
        Self { config }
    }

    /// Parse and validate a raw JSON payload
    pub fn validate_json(&self, raw: &[u8]) -> Result<ValidatedPayload> {
        let payload: NodeSummaryPayload = serde_json::from_slice(raw)
            .map_err(|e| Error::schema(format!("malformed payload: {}", e)))?;
        self.validate(payload)
    }

    /// Validate a parsed payload and normalize it into the core model
    pub fn validate(&self, payload: NodeSummaryPayload) -> Result<ValidatedPayload> {
        let job_id = match payload.job_id {
            Some(ref id) if !id.is_empty() && id.len() <= self.config.max_id_length => {
                JobId::new(id.clone())
            }
            Some(_) => return Err(Error::schema("job_id empty or too long")),
            None => return Err(Error::schema("missing job_id")),
        };

        let node = match payload.node {
            Some(ref id) if !id.is_empty() && id.len() <= self.config.max_id_length => {
                NodeId::new(id.clone())
            }
            Some(_) => return Err(Error::schema("node identifier empty or too long")),
            None => return Err(Error::schema("missing node identifier")),
        };

        if payload.gpus.len() > self.config.max_gpus_per_payload {
            return Err(Error::schema(format!(
                "payload carries {} GPU readings, limit is {}",
                payload.gpus.len(),
                self.config.max_gpus_per_payload
            )));
        }

        let mut seen = HashSet::new();
        for reading in &payload.gpus {
            if !seen.insert(reading.gpu_index) {
                return Err(Error::schema(format!(
                    "duplicate gpu_index {} within payload from {}",
                    reading.gpu_index, node
                )));
            }
        }

        let mut normalized_fields = 0u64;
        let mut gpus = Vec::with_capacity(payload.gpus.len());
        for reading in payload.gpus {
            gpus.push(self.normalize_reading(
                &job_id,
                &node,
                reading,
                payload.produced_at,
                &mut normalized_fields,
            ));
        }
        gpus.sort_by_key(|g| g.gpu_index);

        let cpu_util_avg_pct = match payload.cpu {
            Some(cpu) if is_plausible_pct(cpu.util_avg_pct) => Some(cpu.util_avg_pct),
            Some(cpu) => {
                debug!(
                    job = %job_id, node = %node, value = cpu.util_avg_pct,
                    "dropping implausible cpu utilization"
                );
                normalized_fields += 1;
                None
            }
            None => None,
        };

        Ok(ValidatedPayload {
            job_id,
            node,
            produced_at: payload.produced_at,
            cpu_util_avg_pct,
            gpus,
            normalized_fields,
        })
    }

    /// Normalize one GPU reading, dropping implausible fields
    fn normalize_reading(
        &self,
        job_id: &JobId,
        node: &NodeId,
        reading: GpuReading,
        produced_at: Option<DateTime<Utc>>,
        normalized: &mut u64,
    ) -> GpuSampleSummary {
        let bounds = &self.config.bounds;
        let mut keep = |field: &'static str, ok: bool| -> bool {
            if !ok {
                debug!(job = %job_id, node = %node, field, "dropping implausible metric field");
                *normalized += 1;
            }
            ok
        };

        let mut summary = GpuSampleSummary::new(node.clone(), reading.gpu_index);
        summary.sample_count = reading.samples;
        summary.produced_at = produced_at;

        summary.util_pct = reading
            .gpu_util_pct
            .filter(|s| keep("gpu_util_pct", is_plausible_pct_summary(s)));
        summary.vram_pct = reading
            .vram_util_pct
            .filter(|s| keep("vram_util_pct", is_plausible_pct_summary(s)));
        summary.peak_mem_gb = reading
            .peak_mem_gb
            .filter(|v| keep("peak_mem_gb", in_range(*v, 0.0, bounds.max_peak_mem_gb)));
        summary.power_w = reading
            .power_w
            .filter(|s| keep("power_w", summary_in_range(s, 0.0, bounds.max_power_w)));
        summary.temp_c = reading
            .temp_c
            .filter(|s| keep("temp_c", summary_in_range(s, 0.0, bounds.max_temp_c)));
        summary.clock_core_mhz = reading
            .sclk_mhz
            .filter(|s| keep("sclk_mhz", summary_in_range(s, 0.0, bounds.max_clock_mhz)));
        summary.clock_mem_mhz = reading
            .mclk_mhz
            .filter(|s| keep("mclk_mhz", summary_in_range(s, 0.0, bounds.max_clock_mhz)));
        summary.util_trace = reading
            .util_trace
            .filter(|t| keep("util_trace", is_plausible_trace(t)));

        summary
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

fn in_range(value: f64, lo: f64, hi: f64) -> bool {
    value.is_finite() && value >= lo && value <= hi
}

fn is_plausible_pct(value: f64) -> bool {
    in_range(value, 0.0, 100.0)
}

fn is_plausible_pct_summary(summary: &MetricSummary) -> bool {
    summary_in_range(summary, 0.0, 100.0)
}

fn summary_in_range(summary: &MetricSummary, lo: f64, hi: f64) -> bool {
    summary.is_finite()
        && in_range(summary.avg, lo, hi)
        && in_range(summary.p95, lo, hi)
        && in_range(summary.max, lo, hi)
}

fn is_plausible_trace(trace: &[UtilBucket]) -> bool {
    !trace.is_empty() && trace.iter().all(|b| is_plausible_pct(b.avg_util_pct))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::CpuReading;

    fn payload_with(gpus: Vec<GpuReading>) -> NodeSummaryPayload {
        NodeSummaryPayload {
            job_id: Some("12345".to_string()),
            node: Some("gpu-node-01".to_string()),
            produced_at: None,
            gpus,
            cpu: None,
        }
    }

    #[test]
    fn test_missing_job_id_is_schema_error() {
        let validator = Validator::new();
        let mut payload = payload_with(vec![GpuReading::new(0)]);
        payload.job_id = None;

        let err = validator.validate(payload).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_empty_node_is_schema_error() {
        let validator = Validator::new();
        let mut payload = payload_with(vec![]);
        payload.node = Some(String::new());

        let err = validator.validate(payload).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_malformed_json_is_schema_error() {
        let validator = Validator::new();
        let err = validator.validate_json(b"{not json").unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_duplicate_gpu_index_is_schema_error() {
        let validator = Validator::new();
        let payload = payload_with(vec![GpuReading::new(0), GpuReading::new(0)]);

        let err = validator.validate(payload).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_implausible_fields_dropped_not_zero_filled() {
        let validator = Validator::new();
        let mut reading = GpuReading::new(0);
        reading.gpu_util_pct = Some(MetricSummary::constant(50.0));
        reading.power_w = Some(MetricSummary::constant(-10.0)); // implausible
        reading.temp_c = Some(MetricSummary::new(60.0, 75.0, f64::NAN)); // non-finite

        let validated = validator.validate(payload_with(vec![reading])).unwrap();
        let gpu = &validated.gpus[0];

        assert!(gpu.util_pct.is_some());
        assert!(gpu.power_w.is_none());
        assert!(gpu.temp_c.is_none());
        assert_eq!(validated.normalized_fields, 2);
    }

    #[test]
    fn test_util_above_hundred_dropped() {
        let validator = Validator::new();
        let mut reading = GpuReading::new(0);
        reading.gpu_util_pct = Some(MetricSummary::new(50.0, 90.0, 130.0));

        let validated = validator.validate(payload_with(vec![reading])).unwrap();
        assert!(validated.gpus[0].util_pct.is_none());
        assert_eq!(validated.normalized_fields, 1);
    }

    #[test]
    fn test_implausible_cpu_dropped() {
        let validator = Validator::new();
        let mut payload = payload_with(vec![]);
        payload.cpu = Some(CpuReading { util_avg_pct: 250.0 });

        let validated = validator.validate(payload).unwrap();
        assert!(validated.cpu_util_avg_pct.is_none());
        assert_eq!(validated.normalized_fields, 1);
    }

    #[test]
    fn test_reading_with_no_metrics_still_accepted() {
        // Presence of the (node, gpu) pair matters even when every metric
        // is absent; the GPU still counts as observed downstream.
        let validator = Validator::new();
        let validated = validator.validate(payload_with(vec![GpuReading::new(3)])).unwrap();

        assert_eq!(validated.gpus.len(), 1);
        assert_eq!(validated.gpus[0].gpu_index, 3);
        assert!(validated.gpus[0].observed_fields().is_empty());
    }

    #[test]
    fn test_gpus_sorted_by_index() {
        let validator = Validator::new();
        let validated = validator
            .validate(payload_with(vec![
                GpuReading::new(2),
                GpuReading::new(0),
                GpuReading::new(1),
            ]))
            .unwrap();

        let indices: Vec<u32> = validated.gpus.iter().map(|g| g.gpu_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_trace_dropped() {
        let validator = Validator::new();
        let mut reading = GpuReading::new(0);
        reading.util_trace = Some(vec![]);

        let validated = validator.validate(payload_with(vec![reading])).unwrap();
        assert!(validated.gpus[0].util_trace.is_none());
    }
}
