//! Ingest service: queue -> validator -> store
//!
//! Every failure on this path degrades to a counted drop. A schema error
//! discards the payload and, when the job id is recoverable, records the
//! discard so the job's eventual result is marked partial. Store pressure
//! drops the payload and counts it; nothing here can block a producer.

use crate::metrics::EngineMetrics;
use lens_core::{Error, JobId};
use lens_ingest::{IngestReceiver, Validator};
use lens_store::{StoreError, SummaryStore};
use tracing::{debug, warn};

/// Drains the ingest queue into the summary store
pub struct IngestService {
    validator: Validator,
    store: SummaryStore,
    metrics: EngineMetrics,
}

impl IngestService {
    /// Create an ingest service
    pub fn new(validator: Validator, store: SummaryStore, metrics: EngineMetrics) -> Self {
        Self {
            validator,
            store,
            metrics,
        }
    }

    /// Run until every producer handle is dropped
    pub async fn run(mut self, mut rx: IngestReceiver) {
        while let Some(payload) = rx.recv().await {
            self.metrics.payloads_received.inc();
            let depth = rx
                .stats()
                .accepted
                .load(std::sync::atomic::Ordering::Relaxed)
                .saturating_sub(self.metrics.payloads_received.get());
            self.metrics.queue_depth.set(depth as i64);

            // Keep the raw job id around: a schema-rejected payload that
            // still names its job charges a discard against it.
            let claimed_job = payload
                .job_id
                .as_deref()
                .filter(|id| !id.is_empty())
                .map(JobId::new);

            match self.validator.validate(payload) {
                Ok(validated) => {
                    if validated.normalized_fields > 0 {
                        self.metrics
                            .fields_normalized
                            .inc_by(validated.normalized_fields);
                    }

                    let job = validated.job_id.clone();
                    match self.store.apply(validated).await {
                        Ok(report) => {
                            debug!(
                                job = %job,
                                inserted = report.inserted,
                                replaced = report.replaced,
                                "payload stored"
                            );
                        }
                        Err(StoreError::Capacity(msg)) => {
                            warn!(job = %job, "store at capacity, dropping payload: {}", msg);
                            self.metrics
                                .payloads_dropped
                                .with_label_values(&["store_capacity"])
                                .inc();
                        }
                        Err(e) => {
                            warn!(job = %job, "store rejected payload, dropping: {}", e);
                            self.metrics
                                .payloads_dropped
                                .with_label_values(&["store"])
                                .inc();
                        }
                    }
                }
                Err(Error::Schema(msg)) => {
                    warn!("discarding malformed payload: {}", msg);
                    self.metrics.schema_errors.inc();
                    self.metrics
                        .payloads_dropped
                        .with_label_values(&["schema"])
                        .inc();
                    if let Some(job) = claimed_job {
                        self.store.record_discard(&job);
                    }
                }
                Err(e) => {
                    warn!("discarding payload: {}", e);
                    self.metrics
                        .payloads_dropped
                        .with_label_values(&["invalid"])
                        .inc();
                }
            }
        }

        debug!("ingest queue closed, service exiting");
    }
}
