//! Application state for the gateway.

use std::sync::Arc;

use common::config::{AppConfig, PollSettings, ServiceUrls};
use common::errors::{AppError, AppResult};
use migration_client::{HttpMigrationApi, MigrationTracker};

use crate::registry::WorkflowRegistry;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub service_urls: ServiceUrls,
    /// Shared pool for proxied requests and the backend client.
    pub http_client: reqwest::Client,
    pub api: Arc<HttpMigrationApi>,
    pub tracker: MigrationTracker,
    pub workflows: Arc<WorkflowRegistry>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        service_urls: ServiceUrls,
        poll: PollSettings,
    ) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(poll.request_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to create HTTP client: {e}")))?;
        let api = Arc::new(HttpMigrationApi::with_client(
            &service_urls.migration_api,
            http_client.clone(),
        )?);
        let tracker = MigrationTracker::new(api.clone(), poll.interval);

        Ok(Self {
            config,
            service_urls,
            http_client,
            api,
            tracker,
            workflows: Arc::new(WorkflowRegistry::new()),
        })
    }
}
