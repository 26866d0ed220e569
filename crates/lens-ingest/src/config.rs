//! Configuration for ingest validation and queueing

use serde::{Deserialize, Serialize};

/// Configuration for the ingest pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Capacity of the bounded ingest queue; at capacity the newest
    /// payload is dropped rather than blocking the producer
    pub queue_capacity: usize,

    /// Maximum accepted length of job and node identifiers
    pub max_id_length: usize,

    /// Maximum number of GPU readings accepted per payload
    pub max_gpus_per_payload: usize,

    /// Plausibility bounds for incoming metric values
    pub bounds: PlausibilityBounds,
}

/// Plausible value ranges for sidecar metrics
///
/// Values outside these ranges are dropped from the reading, not clamped;
/// the rest of the payload is still accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlausibilityBounds {
    /// Maximum plausible peak memory per GPU (GB)
    pub max_peak_mem_gb: f64,

    /// Maximum plausible board power (watts)
    pub max_power_w: f64,

    /// Maximum plausible core temperature (Celsius)
    pub max_temp_c: f64,

    /// Maximum plausible clock frequency (MHz)
    pub max_clock_mhz: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_id_length: 256,
            max_gpus_per_payload: 64,
            bounds: PlausibilityBounds::default(),
        }
    }
}

impl Default for PlausibilityBounds {
    fn default() -> Self {
        Self {
            max_peak_mem_gb: 2048.0,
            max_power_w: 2000.0,
            max_temp_c: 150.0,
            max_clock_mhz: 10_000.0,
        }
    }
}

impl IngestConfig {
    /// Create a new ingest configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the maximum GPU readings per payload
    pub fn with_max_gpus_per_payload(mut self, max: usize) -> Self {
        self.max_gpus_per_payload = max;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than zero".to_string());
        }

        if self.max_id_length == 0 {
            return Err("max_id_length must be greater than zero".to_string());
        }

        if self.max_gpus_per_payload == 0 {
            return Err("max_gpus_per_payload must be greater than zero".to_string());
        }

        if self.bounds.max_peak_mem_gb <= 0.0
            || self.bounds.max_power_w <= 0.0
            || self.bounds.max_temp_c <= 0.0
            || self.bounds.max_clock_mhz <= 0.0
        {
            return Err("plausibility bounds must be positive".to_string());
        }

        Ok(())
    }
}
