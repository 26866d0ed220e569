//! In-memory summary store keyed by (job, node, gpu_index)

use crate::{config::StoreConfig, Result, StoreError};
use dashmap::DashMap;
use lens_core::{GpuSampleSummary, JobId, JobMetricSummary, NodeId, SampleKey};
use lens_ingest::ValidatedPayload;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A stored per-GPU summary with bookkeeping
#[derive(Debug, Clone)]
pub struct StoredSample {
    pub sample: GpuSampleSummary,
    pub updated_at: Instant,
    pub version: u64,
}

/// Per-job ingest bookkeeping kept alongside the samples
#[derive(Debug, Clone, Default)]
struct JobState {
    /// Latest CPU utilization reading per node
    cpu_by_node: BTreeMap<NodeId, f64>,

    /// Payloads the validator discarded for this job
    discarded: u64,

    /// Last ingest touch, for cleanup
    updated_at: Option<Instant>,
}

/// Store statistics
#[derive(Debug, Default)]
pub struct StoreStats {
    pub upserts: AtomicU64,
    pub replaced: AtomicU64,
    pub stale_rejected: AtomicU64,
    pub discards: AtomicU64,
    pub capacity_drops: AtomicU64,
    pub queries: AtomicU64,
    pub cleanup_runs: AtomicU64,
    pub entries_cleaned: AtomicU64,
}

/// Outcome of applying one validated payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Samples inserted for the first time
    pub inserted: u32,

    /// Samples that replaced a prior entry for the same key
    pub replaced: u32,

    /// Samples rejected because a newer producer timestamp was stored
    pub stale_rejected: u32,
}

/// Concurrent in-memory store for per-GPU job summaries
///
/// Upserts are last-writer-wins by arrival order. When both the stored and
/// the incoming sample carry a producer timestamp, a strictly older
/// incoming timestamp loses the tie-break and the stored sample is kept.
#[derive(Debug, Clone)]
pub struct SummaryStore {
    samples: Arc<DashMap<SampleKey, StoredSample>>,
    jobs: Arc<DashMap<JobId, JobState>>,
    config: StoreConfig,
    stats: Arc<StoreStats>,
    last_cleanup: Arc<RwLock<Instant>>,
}

impl SummaryStore {
    /// Create a store with default configuration
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a store with the given configuration
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            samples: Arc::new(DashMap::new()),
            jobs: Arc::new(DashMap::new()),
            config,
            stats: Arc::new(StoreStats::default()),
            last_cleanup: Arc::new(RwLock::new(Instant::now())),
        }
    }

    /// Apply a validated payload, upserting one sample per GPU reading
    ///
    /// Idempotent: re-applying the same payload leaves the assembled
    /// summary unchanged (versions advance, content does not).
    pub async fn apply(&self, payload: ValidatedPayload) -> Result<ApplyReport> {
        let job_id = payload.job_id.clone();
        let now = Instant::now();

        // Capacity: new jobs beyond the limit are rejected whole so a
        // runaway producer cannot evict other jobs' state.
        if !self.jobs.contains_key(&job_id) && self.jobs.len() >= self.config.max_jobs {
            self.stats.capacity_drops.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::Capacity(format!(
                "job limit {} reached, dropping payload for {}",
                self.config.max_jobs, job_id
            )));
        }

        let job_sample_count = self.job_sample_count(&job_id);
        let mut report = ApplyReport::default();

        for sample in payload.gpus {
            let key = SampleKey::new(job_id.clone(), sample.node.clone(), sample.gpu_index);

            match self.samples.entry(key) {
                dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                    let stored = entry.get();
                    if let (Some(stored_ts), Some(incoming_ts)) =
                        (stored.sample.produced_at, sample.produced_at)
                    {
                        if incoming_ts < stored_ts {
                            self.stats.stale_rejected.fetch_add(1, Ordering::Relaxed);
                            report.stale_rejected += 1;
                            debug!(key = %entry.key(), "rejecting stale sample");
                            continue;
                        }
                    }

                    let version = stored.version + 1;
                    entry.insert(StoredSample {
                        sample,
                        updated_at: now,
                        version,
                    });
                    self.stats.replaced.fetch_add(1, Ordering::Relaxed);
                    report.replaced += 1;
                }
                dashmap::mapref::entry::Entry::Vacant(entry) => {
                    if job_sample_count + report.inserted as usize
                        >= self.config.max_samples_per_job
                    {
                        self.stats.capacity_drops.fetch_add(1, Ordering::Relaxed);
                        warn!(job = %job_id, "per-job sample limit reached, dropping sample");
                        continue;
                    }

                    entry.insert(StoredSample {
                        sample,
                        updated_at: now,
                        version: 1,
                    });
                    report.inserted += 1;
                }
            }
            self.stats.upserts.fetch_add(1, Ordering::Relaxed);
        }

        {
            let mut state = self.jobs.entry(job_id.clone()).or_default();
            if let Some(cpu) = payload.cpu_util_avg_pct {
                state.cpu_by_node.insert(payload.node.clone(), cpu);
            }
            state.updated_at = Some(now);
        }

        debug!(
            job = %job_id, node = %payload.node,
            inserted = report.inserted, replaced = report.replaced,
            "applied payload"
        );

        self.maybe_cleanup().await;

        Ok(report)
    }

    /// Record a discarded payload against a job so its result can be
    /// marked partial
    pub fn record_discard(&self, job_id: &JobId) {
        self.stats.discards.fetch_add(1, Ordering::Relaxed);
        let mut state = self.jobs.entry(job_id.clone()).or_default();
        state.discarded += 1;
        state.updated_at = Some(Instant::now());
    }

    /// Assemble the per-job view over everything stored for the job
    ///
    /// Returns None when the job is entirely unknown to the store. A job
    /// known only through discards yields a summary with zero GPUs.
    pub fn job_summary(&self, job_id: &JobId, gpus_requested: u32) -> Option<JobMetricSummary> {
        self.stats.queries.fetch_add(1, Ordering::Relaxed);

        let mut gpus: Vec<GpuSampleSummary> = self
            .samples
            .iter()
            .filter(|entry| &entry.key().job == job_id)
            .map(|entry| entry.value().sample.clone())
            .collect();

        let state = self.jobs.get(job_id).map(|s| s.clone());

        if gpus.is_empty() && state.is_none() {
            return None;
        }

        gpus.sort_by(|a, b| (&a.node, a.gpu_index).cmp(&(&b.node, b.gpu_index)));

        let mut nodes: Vec<&NodeId> = gpus.iter().map(|g| &g.node).collect();
        nodes.dedup();
        let nodes_reporting = nodes.len() as u32;

        let (cpu_util_avg_pct, discarded_payloads) = match state {
            Some(state) => {
                let cpu = if state.cpu_by_node.is_empty() {
                    None
                } else {
                    Some(
                        state.cpu_by_node.values().sum::<f64>()
                            / state.cpu_by_node.len() as f64,
                    )
                };
                (cpu, state.discarded)
            }
            None => (None, 0),
        };

        Some(JobMetricSummary {
            job_id: job_id.clone(),
            gpus,
            cpu_util_avg_pct,
            gpus_requested,
            nodes_reporting,
            discarded_payloads,
        })
    }

    /// Get one stored sample (mainly for tests and debugging)
    pub fn get_sample(&self, key: &SampleKey) -> Option<StoredSample> {
        self.samples.get(key).map(|entry| entry.clone())
    }

    /// Number of distinct samples stored for a job
    pub fn job_sample_count(&self, job_id: &JobId) -> usize {
        self.samples
            .iter()
            .filter(|entry| &entry.key().job == job_id)
            .count()
    }

    /// Remove all state for a job, returning the number of entries removed
    pub fn remove_job(&self, job_id: &JobId) -> usize {
        let mut removed = 0;
        self.samples.retain(|key, _| {
            if &key.job == job_id {
                removed += 1;
                false
            } else {
                true
            }
        });

        if self.jobs.remove(job_id).is_some() {
            removed += 1;
        }

        if removed > 0 {
            info!(job = %job_id, removed, "removed job state");
        }
        removed
    }

    /// Total samples stored across all jobs
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Number of jobs with any stored state
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Store statistics
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Check if cleanup should be triggered
    async fn maybe_cleanup(&self) {
        let last_cleanup = *self.last_cleanup.read().await;
        if last_cleanup.elapsed() >= self.config.cleanup_interval {
            self.cleanup().await;
        }
    }

    /// Clean up state older than the configured maximum age
    ///
    /// Covers jobs whose analysis trigger never arrived; normally
    /// `remove_job` clears state right after the result is emitted.
    pub async fn cleanup(&self) -> usize {
        let mut last_cleanup = self.last_cleanup.write().await;
        *last_cleanup = Instant::now();
        drop(last_cleanup);

        let now = Instant::now();
        let max_age = self.config.max_state_age;
        let mut cleaned = 0;

        self.samples.retain(|_, stored| {
            if now.duration_since(stored.updated_at) > max_age {
                cleaned += 1;
                false
            } else {
                true
            }
        });

        self.jobs.retain(|_, state| {
            let stale = state
                .updated_at
                .map(|t| now.duration_since(t) > max_age)
                .unwrap_or(true);
            if stale {
                cleaned += 1;
            }
            !stale
        });

        self.stats.cleanup_runs.fetch_add(1, Ordering::Relaxed);
        self.stats
            .entries_cleaned
            .fetch_add(cleaned as u64, Ordering::Relaxed);

        if cleaned > 0 {
            info!(cleaned, "cleaned up aged store entries");
        }
        cleaned
    }

    /// Clear all stored state
    pub fn clear(&self) {
        self.samples.clear();
        self.jobs.clear();
        info!("cleared summary store");
    }
}

impl Default for SummaryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use lens_core::MetricSummary;
    use lens_ingest::ValidatedPayload;

    fn payload(job: &str, node: &str, indices: &[u32]) -> ValidatedPayload {
        let node_id = NodeId::new(node);
        let gpus = indices
            .iter()
            .map(|&i| {
                let mut s = GpuSampleSummary::new(node_id.clone(), i);
                s.util_pct = Some(MetricSummary::constant(50.0));
                s.sample_count = 10;
                s
            })
            .collect();

        ValidatedPayload {
            job_id: JobId::new(job),
            node: node_id,
            produced_at: None,
            cpu_util_avg_pct: None,
            gpus,
            normalized_fields: 0,
        }
    }

    #[tokio::test]
    async fn test_apply_and_assemble() {
        let store = SummaryStore::new();

        store.apply(payload("1", "n1", &[0, 1])).await.unwrap();
        store.apply(payload("1", "n2", &[0])).await.unwrap();

        let summary = store.job_summary(&JobId::new("1"), 4).unwrap();
        assert_eq!(summary.observed_gpus(), 3);
        assert_eq!(summary.nodes_reporting, 2);
        assert_eq!(summary.gpus_requested, 4);

        // Ordered by (node, gpu_index)
        let keys: Vec<(String, u32)> = summary
            .gpus
            .iter()
            .map(|g| (g.node.to_string(), g.gpu_index))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("n1".to_string(), 0),
                ("n1".to_string(), 1),
                ("n2".to_string(), 0)
            ]
        );
    }

    #[tokio::test]
    async fn test_idempotent_reingest() {
        let store = SummaryStore::new();

        store.apply(payload("1", "n1", &[0])).await.unwrap();
        let once = store.job_summary(&JobId::new("1"), 1).unwrap();

        store.apply(payload("1", "n1", &[0])).await.unwrap();
        let twice = store.job_summary(&JobId::new("1"), 1).unwrap();

        assert_eq!(once, twice);
        assert_eq!(store.sample_count(), 1);

        // The version advanced even though the content did not
        let key = SampleKey::new(JobId::new("1"), NodeId::new("n1"), 0);
        assert_eq!(store.get_sample(&key).unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_replacement_is_last_writer_wins() {
        let store = SummaryStore::new();

        let mut first = payload("1", "n1", &[0]);
        first.gpus[0].util_pct = Some(MetricSummary::constant(10.0));
        store.apply(first).await.unwrap();

        let mut second = payload("1", "n1", &[0]);
        second.gpus[0].util_pct = Some(MetricSummary::constant(90.0));
        store.apply(second).await.unwrap();

        let summary = store.job_summary(&JobId::new("1"), 1).unwrap();
        assert_eq!(summary.gpus[0].avg_util(), Some(90.0));
    }

    #[tokio::test]
    async fn test_producer_timestamp_breaks_ties() {
        let store = SummaryStore::new();
        let newer = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2026, 8, 1, 11, 0, 0).unwrap();

        let mut first = payload("1", "n1", &[0]);
        first.produced_at = Some(newer);
        first.gpus[0].produced_at = Some(newer);
        first.gpus[0].util_pct = Some(MetricSummary::constant(90.0));
        store.apply(first).await.unwrap();

        let mut late_arrival = payload("1", "n1", &[0]);
        late_arrival.produced_at = Some(older);
        late_arrival.gpus[0].produced_at = Some(older);
        late_arrival.gpus[0].util_pct = Some(MetricSummary::constant(10.0));
        let report = store.apply(late_arrival).await.unwrap();

        assert_eq!(report.stale_rejected, 1);
        let summary = store.job_summary(&JobId::new("1"), 1).unwrap();
        assert_eq!(summary.gpus[0].avg_util(), Some(90.0));
    }

    #[tokio::test]
    async fn test_job_capacity_rejects_whole_payload() {
        let store = SummaryStore::with_config(StoreConfig::default().with_max_jobs(1));

        store.apply(payload("1", "n1", &[0])).await.unwrap();
        let result = store.apply(payload("2", "n1", &[0])).await;

        assert!(matches!(result, Err(StoreError::Capacity(_))));
        assert!(store.job_summary(&JobId::new("2"), 1).is_none());
    }

    #[tokio::test]
    async fn test_per_job_sample_capacity() {
        let store =
            SummaryStore::with_config(StoreConfig::default().with_max_samples_per_job(2));

        store.apply(payload("1", "n1", &[0, 1, 2, 3])).await.unwrap();
        assert_eq!(store.job_sample_count(&JobId::new("1")), 2);
    }

    #[tokio::test]
    async fn test_discard_accounting() {
        let store = SummaryStore::new();
        let job = JobId::new("1");

        store.record_discard(&job);
        store.record_discard(&job);

        let summary = store.job_summary(&job, 2).unwrap();
        assert_eq!(summary.discarded_payloads, 2);
        assert!(summary.is_partial());
        assert_eq!(summary.observed_gpus(), 0);
    }

    #[tokio::test]
    async fn test_unknown_job_is_none() {
        let store = SummaryStore::new();
        assert!(store.job_summary(&JobId::new("ghost"), 1).is_none());
    }

    #[tokio::test]
    async fn test_cpu_averaged_across_nodes() {
        let store = SummaryStore::new();

        let mut a = payload("1", "n1", &[0]);
        a.cpu_util_avg_pct = Some(20.0);
        store.apply(a).await.unwrap();

        let mut b = payload("1", "n2", &[0]);
        b.cpu_util_avg_pct = Some(60.0);
        store.apply(b).await.unwrap();

        let summary = store.job_summary(&JobId::new("1"), 2).unwrap();
        assert_eq!(summary.cpu_util_avg_pct, Some(40.0));
    }

    #[tokio::test]
    async fn test_remove_job() {
        let store = SummaryStore::new();

        store.apply(payload("1", "n1", &[0, 1])).await.unwrap();
        store.apply(payload("2", "n1", &[0])).await.unwrap();

        let removed = store.remove_job(&JobId::new("1"));
        assert!(removed >= 2);
        assert!(store.job_summary(&JobId::new("1"), 2).is_none());
        assert!(store.job_summary(&JobId::new("2"), 1).is_some());
    }

    #[tokio::test]
    async fn test_cleanup_removes_aged_state() {
        let mut config = StoreConfig::default();
        config.max_state_age = std::time::Duration::from_millis(10);
        let store = SummaryStore::with_config(config);

        store.apply(payload("1", "n1", &[0])).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let cleaned = store.cleanup().await;
        assert!(cleaned >= 1);
        assert_eq!(store.sample_count(), 0);
    }
}
