//! Result sinks
//!
//! The agent emits each finished `JobEfficiencyResult` through a sink.
//! Sinks must be fail-soft: an emit failure is reported to the caller,
//! which logs and drops the result rather than blocking or retrying
//! indefinitely.

use crate::Result;
use async_trait::async_trait;
use lens_analysis::JobEfficiencyResult;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::debug;

/// Destination for finished results
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Emit one result
    async fn emit(&self, result: &JobEfficiencyResult) -> Result<()>;
}

/// Appends results as JSON lines to a file
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a sink appending to the given path
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path the sink appends to
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl ResultSink for JsonlSink {
    async fn emit(&self, result: &JobEfficiencyResult) -> Result<()> {
        let mut line = serde_json::to_string(result)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(job = %result.job_id, path = %self.path.display(), "result appended");
        Ok(())
    }
}

/// Delivers results over a channel; used by tests and embedders
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<JobEfficiencyResult>,
}

impl ChannelSink {
    /// Create a channel sink with the given capacity, returning the
    /// receiving half alongside it
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<JobEfficiencyResult>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ResultSink for ChannelSink {
    async fn emit(&self, result: &JobEfficiencyResult) -> Result<()> {
        self.tx
            .send(result.clone())
            .await
            .map_err(|_| crate::AgentError::Service("result channel closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_core::JobId;

    #[tokio::test]
    async fn test_jsonl_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");
        let sink = JsonlSink::new(path.clone());

        sink.emit(&JobEfficiencyResult::minimal(JobId::new("1")))
            .await
            .unwrap();
        sink.emit(&JobEfficiencyResult::minimal(JobId::new("2")))
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: JobEfficiencyResult = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.job_id, JobId::new("1"));
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new(4);

        sink.emit(&JobEfficiencyResult::minimal(JobId::new("42")))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.job_id, JobId::new("42"));
    }

    #[tokio::test]
    async fn test_channel_sink_fails_soft_when_closed() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);

        let err = sink
            .emit(&JobEfficiencyResult::minimal(JobId::new("1")))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::AgentError::Service(_)));
    }
}
