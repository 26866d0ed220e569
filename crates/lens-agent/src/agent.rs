//! Core agent implementation

use crate::config::AgentConfig;
use crate::metrics::EngineMetrics;
use crate::services::{AnalysisRequest, AnalysisService, IngestService};
use crate::sink::{JsonlSink, ResultSink};
use crate::{AgentError, Result};
use lens_analysis::ResultAssembler;
use lens_core::JobMetadata;
use lens_ingest::{IngestQueue, IngestReceiver, Validator};
use lens_store::SummaryStore;
use prometheus::Registry;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// The gpulens analysis agent
///
/// Owns the ingest queue, the summary store, and the two service workers.
/// Producers get cheap handles: `ingest()` for sidecar payloads and
/// `trigger()` for scheduler epilogue triggers; neither can block.
pub struct Agent {
    config: AgentConfig,
    registry: Registry,
    metrics: EngineMetrics,
    store: SummaryStore,
    ingest_queue: IngestQueue,
    ingest_rx: Option<IngestReceiver>,
    trigger_tx: mpsc::Sender<AnalysisRequest>,
    trigger_rx: Option<mpsc::Receiver<AnalysisRequest>>,
    sink: Arc<dyn ResultSink>,
    services: Vec<ServiceHandle>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

/// Handle to a running service
struct ServiceHandle {
    name: String,
    handle: tokio::task::JoinHandle<()>,
}

impl Agent {
    /// Start the agent services
    pub async fn start(&mut self) -> Result<()> {
        info!(agent = %self.config.agent.name, "starting gpulens agent");

        self.config.validate()?;
        self.config.ensure_data_dir()?;
        self.metrics.register(&self.registry)?;

        let ingest_rx = self
            .ingest_rx
            .take()
            .ok_or_else(|| AgentError::Service("agent already started".to_string()))?;
        let trigger_rx = self
            .trigger_rx
            .take()
            .ok_or_else(|| AgentError::Service("agent already started".to_string()))?;

        let ingest = IngestService::new(
            Validator::with_config(self.config.ingest.clone()),
            self.store.clone(),
            self.metrics.clone(),
        );
        self.services.push(ServiceHandle {
            name: "ingest".to_string(),
            handle: tokio::spawn(ingest.run(ingest_rx)),
        });

        let analysis = AnalysisService::new(
            self.store.clone(),
            ResultAssembler::new(self.config.analysis.clone()),
            self.sink.clone(),
            self.config.trigger.clone(),
            self.metrics.clone(),
        );
        self.services.push(ServiceHandle {
            name: "analysis".to_string(),
            handle: tokio::spawn(analysis.run(trigger_rx)),
        });

        info!("gpulens agent started with {} services", self.services.len());
        Ok(())
    }

    /// Stop the agent and all its services
    pub async fn stop(&mut self) -> Result<()> {
        info!("stopping gpulens agent");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        for service in self.services.drain(..) {
            info!(service = %service.name, "stopping service");
            service.handle.abort();

            match service.handle.await {
                Ok(()) => info!(service = %service.name, "service stopped"),
                Err(e) if e.is_cancelled() => {
                    info!(service = %service.name, "service cancelled")
                }
                Err(e) => error!(service = %service.name, "service join failed: {}", e),
            }
        }

        info!("gpulens agent stopped");
        Ok(())
    }

    /// Run the agent until a shutdown signal arrives
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        tokio::select! {
            _ = shutdown_rx => {
                info!("received shutdown signal");
            }
            _ = signal::ctrl_c() => {
                info!("received Ctrl+C");
            }
            _ = wait_for_termination() => {
                info!("received termination signal");
            }
        }

        self.stop().await
    }

    /// Producer handle for sidecar payloads
    pub fn ingest(&self) -> IngestQueue {
        self.ingest_queue.clone()
    }

    /// Submit an analysis trigger for a finished job
    ///
    /// Never blocks: when the trigger channel is full the trigger is
    /// dropped and counted, and the job can be re-triggered later.
    pub fn trigger(&self, metadata: JobMetadata) -> bool {
        let job = metadata.job_id.clone();
        match self.trigger_tx.try_send(AnalysisRequest { metadata }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(job = %job, "trigger channel full, dropping trigger");
                self.metrics
                    .payloads_dropped
                    .with_label_values(&["trigger_queue_full"])
                    .inc();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(job = %job, "trigger channel closed, dropping trigger");
                false
            }
        }
    }

    /// Get the agent configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The summary store (diagnostics and tests)
    pub fn store(&self) -> &SummaryStore {
        &self.store
    }

    /// The Prometheus registry carrying the agent's health metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        // Best effort cleanup
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Wait for termination signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(_) => {
            std::future::pending::<()>().await;
            return;
        }
    };
    sigterm.recv().await;
}

/// Wait for termination signals (non-Unix: Ctrl+C only)
#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = signal::ctrl_c().await;
}

/// Builder for creating agents
pub struct AgentBuilder {
    config: Option<AgentConfig>,
    sink: Option<Arc<dyn ResultSink>>,
}

impl AgentBuilder {
    /// Create a new agent builder
    pub fn new() -> Self {
        Self {
            config: None,
            sink: None,
        }
    }

    /// Set the agent configuration
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the default JSONL sink
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the agent
    pub fn build(self) -> Result<Agent> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(JsonlSink::new(config.results_file_path())));

        let (ingest_queue, ingest_rx) = IngestQueue::new(config.ingest.queue_capacity);
        let (trigger_tx, trigger_rx) = mpsc::channel(config.trigger.queue_capacity);

        Ok(Agent {
            store: SummaryStore::with_config(config.store.clone()),
            registry: Registry::new(),
            metrics: EngineMetrics::new()?,
            ingest_queue,
            ingest_rx: Some(ingest_rx),
            trigger_tx,
            trigger_rx: Some(trigger_rx),
            sink,
            services: Vec::new(),
            shutdown_tx: None,
            config,
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
