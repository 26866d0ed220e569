//! Configuration for the summary store

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the summary store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of jobs tracked at once
    pub max_jobs: usize,

    /// Maximum number of GPU samples tracked per job
    pub max_samples_per_job: usize,

    /// Interval between cleanup passes
    #[serde(with = "duration_seconds")]
    pub cleanup_interval: Duration,

    /// Maximum age of stored state before cleanup removes it
    ///
    /// Covers jobs whose analysis trigger never arrived.
    #[serde(with = "duration_seconds")]
    pub max_state_age: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_jobs: 10_000,
            max_samples_per_job: 1024,
            cleanup_interval: Duration::from_secs(300),
            max_state_age: Duration::from_secs(6 * 3600),
        }
    }
}

impl StoreConfig {
    /// Create a new store configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of tracked jobs
    pub fn with_max_jobs(mut self, max: usize) -> Self {
        self.max_jobs = max;
        self
    }

    /// Set the maximum samples per job
    pub fn with_max_samples_per_job(mut self, max: usize) -> Self {
        self.max_samples_per_job = max;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_jobs == 0 {
            return Err("max_jobs must be greater than zero".to_string());
        }

        if self.max_samples_per_job == 0 {
            return Err("max_samples_per_job must be greater than zero".to_string());
        }

        if self.cleanup_interval.is_zero() {
            return Err("cleanup_interval must be greater than zero".to_string());
        }

        if self.max_state_age.is_zero() {
            return Err("max_state_age must be greater than zero".to_string());
        }

        Ok(())
    }
}

/// Serialize Durations as whole seconds in config files
mod duration_seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
