//! Gateway health routes.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use migration_client::MigrationApi;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/health/all", get(aggregated_health))
}

/// Gateway liveness
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "Gateway is up", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Gateway plus migration backend health
#[utoipa::path(
    get,
    path = "/api/health/all",
    tag = "health",
    responses(
        (status = 200, description = "Aggregated health", body = AggregatedHealth)
    )
)]
pub async fn aggregated_health(State(state): State<AppState>) -> Json<AggregatedHealth> {
    let backend = match state.api.health().await {
        Ok(()) => ServiceHealth {
            name: "migration-backend".to_string(),
            url: state.service_urls.migration_api.clone(),
            healthy: true,
            error: None,
        },
        Err(e) => ServiceHealth {
            name: "migration-backend".to_string(),
            url: state.service_urls.migration_api.clone(),
            healthy: false,
            error: Some(e.user_message()),
        },
    };

    Json(AggregatedHealth {
        status: if backend.healthy { "healthy" } else { "degraded" }.to_string(),
        timestamp: Utc::now(),
        tracked_workflows: state.workflows.len().await,
        services: vec![backend],
    })
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct AggregatedHealth {
    /// `healthy` when every upstream answers, `degraded` otherwise
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Migrations currently registered with the gateway
    pub tracked_workflows: usize,
    pub services: Vec<ServiceHealth>,
}

#[derive(Serialize, ToSchema)]
pub struct ServiceHealth {
    pub name: String,
    pub url: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
