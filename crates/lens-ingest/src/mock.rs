//! Mock payload generation for testing
//!
//! Produces synthetic node summary payloads shaped like real sidecar
//! output, with a configurable split between busy and idle GPUs.

use crate::payload::{CpuReading, GpuReading, NodeSummaryPayload};
use chrono::Utc;
use lens_core::{MetricSummary, UtilBucket};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Mock payload generator
pub struct MockPayloadGenerator {
    rng: StdRng,
    gpus_per_node: u32,
}

impl MockPayloadGenerator {
    /// Create a generator with a fixed seed for reproducible tests
    pub fn with_seed(seed: u64, gpus_per_node: u32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            gpus_per_node,
        }
    }

    /// Generate one node payload with `busy` of the node's GPUs loaded
    /// and the rest near-idle
    pub fn node_payload(&mut self, job_id: &str, node: &str, busy: u32) -> NodeSummaryPayload {
        let gpus = (0..self.gpus_per_node)
            .map(|index| {
                if index < busy {
                    self.busy_reading(index)
                } else {
                    self.idle_reading(index)
                }
            })
            .collect();

        NodeSummaryPayload {
            job_id: Some(job_id.to_string()),
            node: Some(node.to_string()),
            produced_at: Some(Utc::now()),
            gpus,
            cpu: Some(CpuReading {
                util_avg_pct: self.rng.gen_range(20.0..60.0),
            }),
        }
    }

    fn busy_reading(&mut self, index: u32) -> GpuReading {
        let avg = self.rng.gen_range(75.0..95.0);
        let mut reading = GpuReading::new(index);
        reading.gpu_util_pct = Some(MetricSummary::new(avg, avg + 4.0, 100.0_f64.min(avg + 6.0)));
        reading.vram_util_pct = Some(MetricSummary::constant(self.rng.gen_range(60.0..90.0)));
        reading.peak_mem_gb = Some(self.rng.gen_range(20.0..60.0));
        reading.power_w = Some(MetricSummary::constant(self.rng.gen_range(200.0..350.0)));
        reading.temp_c = Some(MetricSummary::constant(self.rng.gen_range(60.0..80.0)));
        reading.samples = 120;
        reading
    }

    fn idle_reading(&mut self, index: u32) -> GpuReading {
        let avg = self.rng.gen_range(0.0..8.0);
        let mut reading = GpuReading::new(index);
        reading.gpu_util_pct = Some(MetricSummary::new(avg, avg + 2.0, avg + 3.0));
        reading.peak_mem_gb = Some(self.rng.gen_range(0.1..1.5));
        reading.samples = 120;
        reading
    }

    /// Attach a stall-shaped utilization trace to a reading: a high first
    /// bucket followed by a sustained low tail
    pub fn stall_trace(&mut self, reading: &mut GpuReading, buckets: u32, bucket_seconds: u64) {
        let trace = (0..buckets)
            .map(|i| UtilBucket {
                offset_seconds: i as u64 * bucket_seconds,
                avg_util_pct: if i == 0 {
                    self.rng.gen_range(80.0..95.0)
                } else {
                    self.rng.gen_range(2.0..12.0)
                },
            })
            .collect();
        reading.util_trace = Some(trace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Validator;

    #[test]
    fn test_mock_payload_validates_cleanly() {
        let mut gen = MockPayloadGenerator::with_seed(7, 4);
        let payload = gen.node_payload("9001", "mock-node-0", 2);

        let validated = Validator::new().validate(payload).unwrap();
        assert_eq!(validated.gpus.len(), 4);
        assert_eq!(validated.normalized_fields, 0);
        assert!(validated.cpu_util_avg_pct.is_some());
    }

    #[test]
    fn test_mock_is_deterministic_per_seed() {
        let mut a = MockPayloadGenerator::with_seed(42, 2);
        let mut b = MockPayloadGenerator::with_seed(42, 2);

        let pa = a.node_payload("1", "n", 1);
        let pb = b.node_payload("1", "n", 1);
        assert_eq!(pa.gpus, pb.gpus);
    }

    #[test]
    fn test_stall_trace_shape() {
        let mut gen = MockPayloadGenerator::with_seed(3, 1);
        let mut reading = GpuReading::new(0);
        gen.stall_trace(&mut reading, 6, 300);

        let trace = reading.util_trace.unwrap();
        assert_eq!(trace.len(), 6);
        assert!(trace[0].avg_util_pct > 50.0);
        assert!(trace[1..].iter().all(|b| b.avg_util_pct < 20.0));
    }
}
