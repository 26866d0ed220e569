//! Bounded, never-blocking ingest queue
//!
//! Sidecars and their transport must never be blocked by the engine. The
//! queue accepts payloads with `try_send`; at capacity the newest payload
//! is dropped and counted. The drop counter is surfaced to the agent's
//! health metrics.

use crate::payload::NodeSummaryPayload;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Queue statistics
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Payloads accepted into the queue
    pub accepted: AtomicU64,

    /// Payloads dropped because the queue was full
    pub dropped: AtomicU64,
}

impl QueueStats {
    /// Total payloads offered
    pub fn offered(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed) + self.dropped.load(Ordering::Relaxed)
    }
}

/// Producer side of the bounded ingest queue
#[derive(Debug, Clone)]
pub struct IngestQueue {
    tx: mpsc::Sender<NodeSummaryPayload>,
    stats: Arc<QueueStats>,
}

/// Consumer side of the bounded ingest queue
#[derive(Debug)]
pub struct IngestReceiver {
    rx: mpsc::Receiver<NodeSummaryPayload>,
    stats: Arc<QueueStats>,
}

impl IngestQueue {
    /// Create a queue with the given capacity, returning both halves
    pub fn new(capacity: usize) -> (IngestQueue, IngestReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        let stats = Arc::new(QueueStats::default());

        (
            IngestQueue {
                tx,
                stats: stats.clone(),
            },
            IngestReceiver { rx, stats },
        )
    }

    /// Offer a payload without blocking
    ///
    /// Returns true if the payload was enqueued. At capacity (or after the
    /// consumer is gone) the payload is dropped and counted.
    pub fn offer(&self, payload: NodeSummaryPayload) -> bool {
        match self.tx.try_send(payload) {
            Ok(()) => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("ingest queue full, dropping payload");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("ingest queue closed, dropping payload");
                false
            }
        }
    }

    /// Queue statistics
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

impl IngestReceiver {
    /// Receive the next payload, or None when all producers are gone
    pub async fn recv(&mut self) -> Option<NodeSummaryPayload> {
        self.rx.recv().await
    }

    /// Queue statistics (shared with the producer side)
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}
