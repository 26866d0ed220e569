//! Core identifier types for gpulens

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a batch job
///
/// Assigned by the scheduler; opaque to the engine apart from being
/// non-empty and immutable for the lifetime of the job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Create a new JobId from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random JobId (useful for tests)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the string representation of the JobId
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether this identifier is well-formed
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.len() <= 256
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Unique identifier for a compute node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Create a new NodeId from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string representation of the NodeId
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether this identifier is well-formed
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.len() <= 256
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Key addressing one GPU's summary within one job
///
/// The store guarantees at most one stored sample per key; re-ingest for
/// the same key replaces the prior entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleKey {
    /// Job the sample belongs to
    pub job: JobId,

    /// Node the GPU lives on
    pub node: NodeId,

    /// GPU index on that node (non-negative, unique per node)
    pub gpu_index: u32,
}

impl SampleKey {
    /// Create a new sample key
    pub fn new(job: JobId, node: NodeId, gpu_index: u32) -> Self {
        Self {
            job,
            node,
            gpu_index,
        }
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/gpu{}", self.job, self.node, self.gpu_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_creation() {
        let id1 = JobId::new("12345");
        assert_eq!(id1.as_str(), "12345");
        assert!(id1.is_valid());

        let id2 = JobId::generate();
        assert!(!id2.as_str().is_empty());
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_empty_ids_invalid() {
        assert!(!JobId::new("").is_valid());
        assert!(!NodeId::new("").is_valid());
        assert!(NodeId::new("gpu-node-07").is_valid());
    }

    #[test]
    fn test_sample_key_ordering() {
        let a = SampleKey::new(JobId::new("1"), NodeId::new("n1"), 0);
        let b = SampleKey::new(JobId::new("1"), NodeId::new("n1"), 1);
        let c = SampleKey::new(JobId::new("1"), NodeId::new("n2"), 0);

        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_sample_key_display() {
        let key = SampleKey::new(JobId::new("42"), NodeId::new("n1"), 3);
        assert_eq!(key.to_string(), "42/n1/gpu3");
    }
}
