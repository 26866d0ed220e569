//! Health metrics for the agent
//!
//! Counters for ingest and analysis health, registered on a shared
//! Prometheus registry. Exposure is the surrounding observability
//! system's concern; the agent only maintains the registry.

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// Engine health metrics
#[derive(Debug, Clone)]
pub struct EngineMetrics {
    /// Payloads received from the ingest queue
    pub payloads_received: IntCounter,

    /// Payloads dropped, by reason (queue_full, schema, store_capacity)
    pub payloads_dropped: IntCounterVec,

    /// Payloads rejected by schema validation
    pub schema_errors: IntCounter,

    /// Implausible metric fields dropped during normalization
    pub fields_normalized: IntCounter,

    /// Analyses completed, by outcome (complete, partial)
    pub analyses: IntCounterVec,

    /// Current depth of the ingest queue
    pub queue_depth: IntGauge,
}

impl EngineMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            payloads_received: IntCounter::with_opts(Opts::new(
                "gpulens_payloads_received_total",
                "Payloads received from the ingest queue",
            ))?,
            payloads_dropped: IntCounterVec::new(
                Opts::new(
                    "gpulens_payloads_dropped_total",
                    "Payloads dropped before reaching the store",
                ),
                &["reason"],
            )?,
            schema_errors: IntCounter::with_opts(Opts::new(
                "gpulens_schema_errors_total",
                "Payloads rejected by schema validation",
            ))?,
            fields_normalized: IntCounter::with_opts(Opts::new(
                "gpulens_fields_normalized_total",
                "Implausible metric fields dropped during normalization",
            ))?,
            analyses: IntCounterVec::new(
                Opts::new("gpulens_analyses_total", "Analyses completed"),
                &["outcome"],
            )?,
            queue_depth: IntGauge::with_opts(Opts::new(
                "gpulens_ingest_queue_depth",
                "Current depth of the ingest queue",
            ))?,
        })
    }

    /// Register all metrics with the given registry
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.payloads_received.clone()))?;
        registry.register(Box::new(self.payloads_dropped.clone()))?;
        registry.register(Box::new(self.schema_errors.clone()))?;
        registry.register(Box::new(self.fields_normalized.clone()))?;
        registry.register(Box::new(self.analyses.clone()))?;
        registry.register(Box::new(self.queue_depth.clone()))?;
        Ok(())
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create EngineMetrics")
    }
}
