//! Pass-through of backend API calls.
//!
//! Any `/api/*` request the gateway does not serve itself is forwarded to the
//! migration backend with its method, query, body and content type; the
//! backend's status, content type and body come back unchanged.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header::CONTENT_TYPE, HeaderValue},
    response::{IntoResponse, Response},
};

use common::errors::{AppError, AppResult};

use crate::state::AppState;

/// Largest request body forwarded to the backend.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub async fn forward(State(state): State<AppState>, req: Request) -> AppResult<Response> {
    let path = req.uri().path();
    if !path.starts_with("/api/") {
        return Err(AppError::NotFound(format!("no route for {path}")));
    }
    let target = format!(
        "{}{}",
        state.service_urls.migration_api,
        req.uri().path_and_query().map_or(path, |pq| pq.as_str())
    );
    let method = req.method().clone();
    let content_type = req.headers().get(CONTENT_TYPE).cloned();

    let body = to_bytes(req.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| AppError::Validation(format!("unreadable request body: {e}")))?;

    tracing::debug!(method = %method, target = %target, "proxying to migration backend");

    let mut upstream = state.http_client.request(method.clone(), &target);
    if let Some(content_type) = content_type {
        upstream = upstream.header(CONTENT_TYPE, content_type);
    }
    if !body.is_empty() {
        upstream = upstream.body(body);
    }

    let reply = upstream
        .send()
        .await
        .map_err(|e| AppError::ExternalService(format!("{method} {target}: {e}")))?;

    let status = reply.status();
    let reply_type = reply.headers().get(CONTENT_TYPE).cloned();
    let bytes = reply
        .bytes()
        .await
        .map_err(|e| AppError::ExternalService(format!("{method} {target}: {e}")))?;

    if !status.is_success() {
        tracing::debug!(method = %method, target = %target, status = status.as_u16(), "backend returned an error");
    }

    let mut response = (status, Body::from(bytes)).into_response();
    response.headers_mut().insert(
        CONTENT_TYPE,
        reply_type.unwrap_or_else(|| HeaderValue::from_static("application/json")),
    );
    Ok(response)
}
