//! Tracked migration workflows.
//!
//! Holds the tracker handle of every migration started through the gateway.
//! Removing a workflow drops its handle, which ends its status polling.
//! Settled workflows are kept for a while so their final state stays
//! readable, then evicted on later inserts.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use migration_client::{TrackerHandle, TrackerSnapshot};
use tokio::sync::RwLock;

/// Settled workflows kept after polling ends.
pub const DEFAULT_MAX_SETTLED: usize = 100;

/// How long a settled workflow stays listed.
pub const DEFAULT_SETTLED_RETENTION: Duration = Duration::from_secs(60 * 60);

pub struct WorkflowRegistry {
    workflows: RwLock<HashMap<String, TrackerHandle>>,
    max_settled: usize,
    settled_retention: Duration,
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::with_limits(DEFAULT_MAX_SETTLED, DEFAULT_SETTLED_RETENTION)
    }
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_settled: usize, settled_retention: Duration) -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
            max_settled,
            settled_retention,
        }
    }

    /// Registers a started workflow and returns its current snapshot.
    ///
    /// A workflow already registered under the same job id is replaced.
    /// Settled workflows past the retention limits are evicted first;
    /// running ones are never evicted.
    pub async fn insert(&self, handle: TrackerHandle) -> TrackerSnapshot {
        let snapshot = handle.snapshot();
        let job_id = handle.job_id().to_string();
        let mut workflows = self.workflows.write().await;
        self.evict_settled(&mut workflows);
        if workflows.insert(job_id.clone(), handle).is_some() {
            tracing::warn!(job_id = %job_id, "replaced an already tracked workflow");
        }
        snapshot
    }

    fn evict_settled(&self, workflows: &mut HashMap<String, TrackerHandle>) {
        let retention = TimeDelta::from_std(self.settled_retention).unwrap_or(TimeDelta::MAX);
        let cutoff = Utc::now().checked_sub_signed(retention);

        let mut settled: Vec<(DateTime<Utc>, String)> = workflows
            .iter()
            .filter(|(_, handle)| !handle.is_running())
            .map(|(job_id, handle)| (handle.snapshot().updated_at, job_id.clone()))
            .collect();
        settled.sort_by(|a, b| b.0.cmp(&a.0));

        let expired: Vec<String> = settled
            .into_iter()
            .enumerate()
            .filter(|(rank, (updated_at, _))| {
                *rank >= self.max_settled || cutoff.is_some_and(|cutoff| *updated_at < cutoff)
            })
            .map(|(_, (_, job_id))| job_id)
            .collect();

        for job_id in &expired {
            workflows.remove(job_id);
        }
        if !expired.is_empty() {
            tracing::debug!(evicted = expired.len(), "evicted settled workflows");
        }
    }

    pub async fn snapshot(&self, job_id: &str) -> Option<TrackerSnapshot> {
        self.workflows.read().await.get(job_id).map(TrackerHandle::snapshot)
    }

    /// Current snapshots, most recently updated first.
    pub async fn list(&self) -> Vec<TrackerSnapshot> {
        let mut snapshots: Vec<TrackerSnapshot> = self
            .workflows
            .read()
            .await
            .values()
            .map(TrackerHandle::snapshot)
            .collect();
        snapshots.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        snapshots
    }

    /// Stops polling and forgets the workflow, returning its last snapshot.
    pub async fn remove(&self, job_id: &str) -> Option<TrackerSnapshot> {
        let mut handle = self.workflows.write().await.remove(job_id)?;
        handle.stop();
        let mut snapshot = handle.snapshot();
        snapshot.running = false;
        Some(snapshot)
    }

    pub async fn len(&self) -> usize {
        self.workflows.read().await.len()
    }
}
