//! Per-job advisory analysis locks
//!
//! Analysis for a given job should run at most once concurrently; a
//! duplicate trigger that finds the lock held is skipped, not queued. The
//! locks are advisory: nothing else in the store consults them.

use dashmap::DashMap;
use lens_core::JobId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-job analysis locks
#[derive(Debug, Clone, Default)]
pub struct AnalysisLocks {
    locks: Arc<DashMap<JobId, Arc<Mutex<()>>>>,
}

/// Guard held while analysis for one job is running
#[derive(Debug)]
pub struct AnalysisGuard {
    _guard: OwnedMutexGuard<()>,
    job_id: JobId,
}

impl AnalysisGuard {
    /// Job this guard covers
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }
}

impl AnalysisLocks {
    /// Create an empty lock registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to begin analysis for a job
    ///
    /// Returns None when an analysis for the same job is already running.
    pub fn try_begin(&self, job_id: &JobId) -> Option<AnalysisGuard> {
        let lock = self
            .locks
            .entry(job_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        lock.try_lock_owned().ok().map(|guard| AnalysisGuard {
            _guard: guard,
            job_id: job_id.clone(),
        })
    }

    /// Drop the lock entry for a finished job
    ///
    /// Safe to call while no guard is held; a held guard keeps the
    /// underlying mutex alive through its Arc.
    pub fn forget(&self, job_id: &JobId) {
        self.locks.remove(job_id);
    }

    /// Number of jobs with a registered lock
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether any locks are registered
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exclusive_per_job() {
        let locks = AnalysisLocks::new();
        let job = JobId::new("1");

        let guard = locks.try_begin(&job);
        assert!(guard.is_some());

        // Second attempt for the same job is refused
        assert!(locks.try_begin(&job).is_none());

        // A different job is independent
        assert!(locks.try_begin(&JobId::new("2")).is_some());
    }

    #[tokio::test]
    async fn test_release_on_drop() {
        let locks = AnalysisLocks::new();
        let job = JobId::new("1");

        {
            let _guard = locks.try_begin(&job).unwrap();
            assert!(locks.try_begin(&job).is_none());
        }

        assert!(locks.try_begin(&job).is_some());
    }

    #[tokio::test]
    async fn test_forget() {
        let locks = AnalysisLocks::new();
        let job = JobId::new("1");

        drop(locks.try_begin(&job));
        assert_eq!(locks.len(), 1);

        locks.forget(&job);
        assert!(locks.is_empty());
    }
}
