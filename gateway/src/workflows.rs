//! Migration workflows tracked by the gateway.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use common::errors::{AppError, AppResult};
use common::middleware::request_id::RequestId;
use common::models::{JobStatus, MigrationRequest};
use common::response::ApiResponse;
use migration_client::TrackerSnapshot;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/workflows", get(list_workflows).post(start_workflow))
        .route(
            "/api/workflows/{job_id}",
            get(get_workflow).delete(delete_workflow),
        )
}

/// Start a migration and track it
#[utoipa::path(
    post,
    path = "/api/workflows",
    tag = "workflows",
    request_body = MigrationRequest,
    responses(
        (status = 201, description = "Migration initiated", body = ApiResponse<TrackerSnapshot>),
        (status = 400, description = "Invalid migration request"),
        (status = 502, description = "Backend refused or could not be reached")
    )
)]
pub async fn start_workflow(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<MigrationRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<TrackerSnapshot>>)> {
    let Json(request) = payload?;
    let handle = state.tracker.start(request).await?;
    let snapshot = state.workflows.insert(handle).await;
    tracing::info!(job_id = snapshot.job_id.as_deref().unwrap_or_default(), "workflow registered");
    Ok((
        StatusCode::CREATED,
        Json(envelope(&state, request_id, snapshot)),
    ))
}

/// List tracked migrations
#[utoipa::path(
    get,
    path = "/api/workflows",
    tag = "workflows",
    responses(
        (status = 200, description = "Tracked migrations", body = ApiResponse<Vec<WorkflowSummary>>)
    )
)]
pub async fn list_workflows(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
) -> Json<ApiResponse<Vec<WorkflowSummary>>> {
    let summaries = state
        .workflows
        .list()
        .await
        .iter()
        .map(WorkflowSummary::from)
        .collect();
    Json(envelope(&state, request_id, summaries))
}

/// Current snapshot of a tracked migration
#[utoipa::path(
    get,
    path = "/api/workflows/{job_id}",
    tag = "workflows",
    params(
        ("job_id" = String, Path, description = "Parent migration job id")
    ),
    responses(
        (status = 200, description = "Migration snapshot", body = ApiResponse<TrackerSnapshot>),
        (status = 404, description = "Migration not tracked")
    )
)]
pub async fn get_workflow(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    Path(job_id): Path<String>,
) -> AppResult<Json<ApiResponse<TrackerSnapshot>>> {
    let snapshot = state
        .workflows
        .snapshot(&job_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("migration {job_id} is not tracked")))?;
    Ok(Json(envelope(&state, request_id, snapshot)))
}

/// Stop tracking a migration
///
/// Polling ends; the migration itself keeps running on the backend.
#[utoipa::path(
    delete,
    path = "/api/workflows/{job_id}",
    tag = "workflows",
    params(
        ("job_id" = String, Path, description = "Parent migration job id")
    ),
    responses(
        (status = 200, description = "Last snapshot before tracking stopped", body = ApiResponse<TrackerSnapshot>),
        (status = 404, description = "Migration not tracked")
    )
)]
pub async fn delete_workflow(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    Path(job_id): Path<String>,
) -> AppResult<Json<ApiResponse<TrackerSnapshot>>> {
    let snapshot = state
        .workflows
        .remove(&job_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("migration {job_id} is not tracked")))?;
    tracing::info!(job_id = %job_id, "workflow removed");
    Ok(Json(envelope(&state, request_id, snapshot)))
}

fn envelope<T: Serialize>(
    state: &AppState,
    request_id: Option<Extension<RequestId>>,
    data: T,
) -> ApiResponse<T> {
    let response = ApiResponse::ok_with_service(data, state.config.service_name.as_str());
    match request_id {
        Some(Extension(id)) => response.with_request_id(id.0),
        None => response,
    }
}

/// Short view of a tracked migration.
#[derive(Debug, Serialize, ToSchema)]
pub struct WorkflowSummary {
    pub job_id: Option<String>,
    #[schema(value_type = String)]
    pub overall_status: JobStatus,
    pub running: bool,
    pub objects: usize,
    /// Objects whose child job completed
    pub completed_objects: usize,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&TrackerSnapshot> for WorkflowSummary {
    fn from(snapshot: &TrackerSnapshot) -> Self {
        Self {
            job_id: snapshot.job_id.clone(),
            overall_status: snapshot.overall_status.clone(),
            running: snapshot.running,
            objects: snapshot.pipeline.len(),
            completed_objects: snapshot
                .pipeline
                .values()
                .filter(|entry| entry.overall == JobStatus::Completed)
                .count(),
            error_message: snapshot.error_message.clone(),
            updated_at: snapshot.updated_at,
        }
    }
}
