//! Analysis service: trigger -> grace wait -> pipeline -> sink
//!
//! One trigger arrives per finished job from the scheduler epilogue. The
//! service waits (bounded) for the expected node summaries, takes the
//! per-job advisory lock, runs the pipeline, and emits the result. Every
//! wait is bounded and every failure degrades: a missing summary becomes
//! a minimal partial result, an emit failure is logged and dropped.

use crate::config::TriggerConfig;
use crate::metrics::EngineMetrics;
use crate::sink::ResultSink;
use lens_analysis::ResultAssembler;
use lens_core::JobMetadata;
use lens_store::{AnalysisLocks, SummaryStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Trigger to analyze one finished job
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Job metadata from the scheduler/accounting integration
    pub metadata: JobMetadata,
}

/// Turns analysis triggers into emitted results
#[derive(Clone)]
pub struct AnalysisService {
    store: SummaryStore,
    locks: AnalysisLocks,
    assembler: Arc<ResultAssembler>,
    sink: Arc<dyn ResultSink>,
    config: TriggerConfig,
    metrics: EngineMetrics,
}

impl AnalysisService {
    /// Create an analysis service
    pub fn new(
        store: SummaryStore,
        assembler: ResultAssembler,
        sink: Arc<dyn ResultSink>,
        config: TriggerConfig,
        metrics: EngineMetrics,
    ) -> Self {
        Self {
            store,
            locks: AnalysisLocks::new(),
            assembler: Arc::new(assembler),
            sink,
            config,
            metrics,
        }
    }

    /// Run until the trigger channel closes
    ///
    /// Each trigger is handled on its own task so one job's grace wait
    /// never delays another job's analysis.
    pub async fn run(self, mut rx: mpsc::Receiver<AnalysisRequest>) {
        while let Some(request) = rx.recv().await {
            let service = self.clone();
            tokio::spawn(async move {
                service.handle(request).await;
            });
        }
        debug!("trigger channel closed, analysis service exiting");
    }

    /// Handle one trigger end to end
    pub async fn handle(&self, request: AnalysisRequest) {
        let meta = request.metadata;
        let job_id = meta.job_id.clone();

        self.wait_for_summaries(&meta).await;

        let _guard = match self.locks.try_begin(&job_id) {
            Some(guard) => guard,
            None => {
                info!(job = %job_id, "analysis already running, skipping duplicate trigger");
                return;
            }
        };

        let summary = self.store.job_summary(&job_id, meta.gpus_requested);
        let result = self.assembler.assemble(&meta, summary.as_ref());

        let outcome = if result.partial { "partial" } else { "complete" };
        self.metrics.analyses.with_label_values(&[outcome]).inc();
        info!(
            job = %job_id,
            class = result.class.map(|c| c.as_str()).unwrap_or("none"),
            causes = result.causes.len(),
            partial = result.partial,
            "analysis finished"
        );

        let emit_timeout = Duration::from_secs(self.config.emit_timeout_seconds);
        match timeout(emit_timeout, self.sink.emit(&result)).await {
            Ok(Ok(())) => {
                self.store.remove_job(&job_id);
            }
            Ok(Err(e)) => {
                warn!(job = %job_id, "result emit failed, dropping result: {}", e);
            }
            Err(_) => {
                warn!(job = %job_id, "result emit timed out, dropping result");
            }
        }

        drop(_guard);
        self.locks.forget(&job_id);
    }

    /// Wait until the store holds the expected number of distinct GPU
    /// samples, or the grace timeout elapses
    ///
    /// Expiry is not an error: analysis proceeds with whatever arrived.
    async fn wait_for_summaries(&self, meta: &JobMetadata) {
        let expected = meta.gpus_requested as usize;
        if expected == 0 {
            return;
        }

        let deadline = Instant::now() + Duration::from_secs(self.config.grace_timeout_seconds);
        let poll = Duration::from_millis(self.config.poll_interval_millis);

        loop {
            if self.store.job_sample_count(&meta.job_id) >= expected {
                return;
            }
            if Instant::now() >= deadline {
                debug!(
                    job = %meta.job_id,
                    observed = self.store.job_sample_count(&meta.job_id),
                    expected,
                    "grace timeout elapsed, analyzing with partial data"
                );
                return;
            }
            sleep(poll).await;
        }
    }
}
