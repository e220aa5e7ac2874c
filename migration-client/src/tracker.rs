//! Migration tracker.
//!
//! Follows one parent migration job: polls its status on a fixed interval,
//! folds child jobs into a per-object pipeline map and publishes snapshots
//! over a watch channel until the job reaches a terminal status.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use utoipa::ToSchema;

use common::errors::{AppError, AppResult};
use common::models::migration::MigrationObject;
use common::models::pipeline::{aggregate, initial_pipeline, PipelineMap, StagePlan};
use common::models::{DbEngine, JobStatus, MigrationRequest, MigrationStatusResponse};

use crate::client::MigrationApi;

/// Non-sensitive description of a submitted migration.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MigrationSummary {
    pub source_db_type: DbEngine,
    pub target_db_type: DbEngine,
    pub source_schema: String,
    pub target_schema: String,
    pub data_migration_enabled: bool,
    pub objects: Vec<MigrationObject>,
    pub plan: StagePlan,
}

impl From<&MigrationRequest> for MigrationSummary {
    fn from(request: &MigrationRequest) -> Self {
        Self {
            source_db_type: request.source_db_type,
            target_db_type: request.target_db_type,
            source_schema: request.source_schema.clone(),
            target_schema: request.target_schema.clone(),
            data_migration_enabled: request.data_migration_enabled,
            objects: request.selected_objects.clone(),
            plan: StagePlan::for_request(request),
        }
    }
}

/// Observable state of a tracked migration.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrackerSnapshot {
    pub job_id: Option<String>,
    #[schema(value_type = String)]
    pub overall_status: JobStatus,
    pub error_message: Option<String>,
    /// True while status polling is active.
    pub running: bool,
    /// Pipeline entries keyed by `"{object_type}_{object_name}"`.
    #[schema(value_type = Object)]
    pub pipeline: PipelineMap,
    pub summary: Option<MigrationSummary>,
    /// Status responses applied so far.
    pub polls: u32,
    pub updated_at: DateTime<Utc>,
}

impl Default for TrackerSnapshot {
    fn default() -> Self {
        Self {
            job_id: None,
            overall_status: JobStatus::Pending,
            error_message: None,
            running: false,
            pipeline: PipelineMap::new(),
            summary: None,
            polls: 0,
            updated_at: Utc::now(),
        }
    }
}

impl TrackerSnapshot {
    /// Resets the view for a migration about to be submitted.
    pub fn begin(&mut self, request: &MigrationRequest) {
        self.job_id = None;
        self.running = true;
        self.overall_status = JobStatus::Processing;
        self.error_message = None;
        self.pipeline = initial_pipeline(&request.selected_objects);
        self.summary = Some(MigrationSummary::from(request));
        self.polls = 0;
        self.touch();
    }

    pub fn initiated(&mut self, job_id: &str) {
        self.job_id = Some(job_id.to_string());
        self.touch();
    }

    pub fn initiation_failed(&mut self, err: &AppError) {
        self.error_message = Some(format!(
            "Failed to initiate migration: {}",
            err.user_message()
        ));
        self.running = false;
        self.overall_status = JobStatus::Failed;
        self.touch();
    }

    /// Folds a status response into the view.
    ///
    /// Objects selected for the migration that the backend has not reported
    /// yet stay listed as pending.
    pub fn apply_status(&mut self, response: MigrationStatusResponse) {
        self.overall_status = response.status;
        self.error_message = response.error_message.filter(|m| !m.is_empty());

        let mut pipeline = aggregate(&response.child_jobs);
        if let Some(summary) = &self.summary {
            for (key, entry) in initial_pipeline(&summary.objects) {
                pipeline.entry(key).or_insert(entry);
            }
        }
        self.pipeline = pipeline;
        self.polls += 1;

        if self.overall_status.is_terminal() {
            self.running = false;
        }
        self.touch();
    }

    pub fn apply_fetch_error(&mut self, err: &AppError) {
        self.error_message = Some(format!(
            "Failed to fetch migration status: {}",
            err.user_message()
        ));
        self.running = false;
        self.touch();
    }

    fn stopped(&mut self) {
        self.running = false;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Starts and follows migrations against a [`MigrationApi`].
#[derive(Clone)]
pub struct MigrationTracker {
    api: Arc<dyn MigrationApi>,
    interval: Duration,
}

impl MigrationTracker {
    pub fn new(api: Arc<dyn MigrationApi>, interval: Duration) -> Self {
        Self { api, interval }
    }

    /// Submits `request` and starts polling its parent job.
    ///
    /// The first status request goes out one interval after submission.
    /// Validation and submission failures are returned; nothing is polled.
    pub async fn start(&self, request: MigrationRequest) -> AppResult<TrackerHandle> {
        let request = request.prepare()?;

        let mut snapshot = TrackerSnapshot::default();
        snapshot.begin(&request);

        match self.api.start_migration(&request).await {
            Ok(response) => {
                snapshot.initiated(&response.job_id);
                let first_poll = Instant::now() + self.interval;
                Ok(self.spawn(response.job_id, snapshot, first_poll))
            }
            Err(err) => {
                tracing::warn!(error = %err, "migration initiation failed");
                Err(err)
            }
        }
    }

    /// Follows a job that was started elsewhere, polling immediately.
    pub fn attach(&self, job_id: &str) -> AppResult<TrackerHandle> {
        if job_id.trim().is_empty() {
            return Err(AppError::Validation("job id is required".to_string()));
        }
        let mut snapshot = TrackerSnapshot::default();
        snapshot.initiated(job_id);
        snapshot.running = true;
        Ok(self.spawn(job_id.to_string(), snapshot, Instant::now()))
    }

    fn spawn(&self, job_id: String, snapshot: TrackerSnapshot, first_poll: Instant) -> TrackerHandle {
        let (state_tx, state_rx) = watch::channel(snapshot);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(poll_until_settled(
            Arc::clone(&self.api),
            job_id.clone(),
            self.interval,
            first_poll,
            state_tx,
            shutdown_rx,
        ));
        TrackerHandle {
            job_id,
            state: state_rx,
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Owner of a running poll task. Dropping it cancels polling.
pub struct TrackerHandle {
    job_id: String,
    state: watch::Receiver<TrackerSnapshot>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TrackerHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified on every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    /// Asks the poll task to stop after any in-flight request is abandoned.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Resolves once polling has ended, returning the final snapshot.
    pub async fn wait_until_settled(&self) -> TrackerSnapshot {
        let mut rx = self.state.clone();
        let settled = rx.wait_for(|s| !s.running).await.map(|s| s.clone());
        match settled {
            Ok(snapshot) => snapshot,
            Err(_) => rx.borrow().clone(),
        }
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Poll loop. Requests are issued one at a time: the next tick is only
/// awaited after the previous response has been applied.
async fn poll_until_settled(
    api: Arc<dyn MigrationApi>,
    job_id: String,
    period: Duration,
    first_poll: Instant,
    state: watch::Sender<TrackerSnapshot>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(first_poll, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::debug!(job_id = %job_id, "status polling stopped");
                state.send_modify(TrackerSnapshot::stopped);
                return;
            }
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            _ = &mut shutdown => {
                tracing::debug!(job_id = %job_id, "status polling stopped mid-request");
                state.send_modify(TrackerSnapshot::stopped);
                return;
            }
            result = api.migration_status(&job_id) => result,
        };

        let settled = match result {
            Ok(response) => {
                let status = response.status.clone();
                let mut terminal = false;
                state.send_modify(|s| {
                    s.apply_status(response);
                    terminal = !s.running;
                });
                tracing::debug!(job_id = %job_id, status = %status, "migration status updated");
                if terminal {
                    tracing::info!(job_id = %job_id, status = %status, "migration reached terminal status");
                }
                terminal
            }
            Err(err) => {
                tracing::warn!(job_id = %job_id, error = %err, "failed to fetch migration status");
                state.send_modify(|s| s.apply_fetch_error(&err));
                true
            }
        };

        if settled {
            return;
        }
    }
}
