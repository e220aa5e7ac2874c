//! Application error type.
//!
//! Library code returns [`AppResult`]; HTTP handlers get the error rendered
//! through the [`ApiResponse`] envelope.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Fallback message when a failed backend response carries no `detail`.
pub const FALLBACK_DETAIL: &str = "Something went wrong";

/// Errors raised while talking to the migration backend or serving requests.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request rejected before reaching the backend.
    #[error("{0}")]
    Validation(String),

    /// Resource not known locally (e.g. an untracked migration).
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend answered with a failure; `detail` is its message verbatim.
    #[error("{detail}")]
    Backend { status: u16, detail: String },

    /// The backend could not be reached.
    #[error("backend unreachable: {0}")]
    ExternalService(String),

    /// The backend answered with a body we could not decode.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Stable code for clients of the gateway.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Backend { .. } => "BACKEND_ERROR",
            AppError::ExternalService(_) => "BACKEND_UNAVAILABLE",
            AppError::InvalidResponse(_) => "INVALID_BACKEND_RESPONSE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Backend { status, .. } if *status == 404 => StatusCode::NOT_FOUND,
            AppError::Backend { .. }
            | AppError::ExternalService(_)
            | AppError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the user. For backend failures this is exactly the
    /// `detail` string the backend sent.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Backend { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{field} is invalid"),
                })
            })
            .collect();
        messages.sort();
        AppError::Validation(messages.join("; "))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::InvalidResponse(e.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::warn!(code = self.code(), error = %self, "request rejected");
        }
        let body = ApiResponse::err(self.code(), self.user_message());
        (status, Json(body)).into_response()
    }
}
