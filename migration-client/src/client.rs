//! REST client for the migration backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use common::errors::{AppError, AppResult, FALLBACK_DETAIL};
use common::models::{
    ConnectResponse, ConnectionDetails, DbEngine, DefaultConnectionDetails, ListObjectsRequest,
    ListObjectsResponse, MessageResponse, MigrationRequest, MigrationStatusResponse, ObjectType,
    OracleConnectionDetails, PostgresConnectionDetails, StartMigrationResponse,
};

/// Operations exposed by the migration backend.
#[async_trait]
pub trait MigrationApi: Send + Sync {
    /// Verifies source credentials; Oracle also returns the visible schemas.
    async fn connect(&self, details: &ConnectionDetails) -> AppResult<ConnectResponse>;

    /// Lists object names of one type in an Oracle schema.
    async fn list_objects(
        &self,
        details: &OracleConnectionDetails,
        schema_name: &str,
        object_type: ObjectType,
    ) -> AppResult<Vec<String>>;

    /// Verifies the PostgreSQL target.
    async fn test_target_connection(
        &self,
        details: &PostgresConnectionDetails,
    ) -> AppResult<MessageResponse>;

    /// Submits a migration and returns the parent job id.
    async fn start_migration(&self, request: &MigrationRequest)
        -> AppResult<StartMigrationResponse>;

    /// Fetches the parent job and its child jobs.
    async fn migration_status(&self, job_id: &str) -> AppResult<MigrationStatusResponse>;

    /// Fetches pre-filled connection values for an engine.
    async fn default_connection_details(
        &self,
        engine: DbEngine,
    ) -> AppResult<DefaultConnectionDetails>;

    /// Backend liveness.
    async fn health(&self) -> AppResult<()>;
}

/// [`MigrationApi`] over HTTP/JSON.
#[derive(Clone)]
pub struct HttpMigrationApi {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpMigrationApi {
    /// Creates a client with its own connection pool.
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;
        Self::with_client(base_url, http)
    }

    /// Creates a client sharing an existing connection pool.
    pub fn with_client(base_url: &str, http: reqwest::Client) -> AppResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Validation(format!("invalid backend URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "invalid backend URL {base_url}: not a base URL"
            )));
        }
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Joins path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("backend URL cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> AppResult<T> {
        let value = self.call(Method::GET, segments, None::<&()>).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> AppResult<T> {
        let value = self.call(Method::POST, segments, Some(body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Issues one request. Non-2xx replies become [`AppError::Backend`]
    /// carrying the body's `detail`.
    async fn call<B: Serialize + Sync>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> AppResult<Value> {
        let url = self.endpoint(segments)?;
        tracing::debug!(method = %method, url = %url, "calling migration backend");

        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("{method} {url}: {e}")))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::ExternalService(format!("{method} {url}: {e}")))?;

        if !status.is_success() {
            let detail = extract_detail(&bytes);
            tracing::warn!(
                method = %method,
                url = %url,
                status = status.as_u16(),
                detail = %detail,
                "migration backend returned an error"
            );
            return Err(AppError::Backend {
                status: status.as_u16(),
                detail,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::InvalidResponse(format!("{method} {url}: {e}"))
        })
    }
}

/// Reads the `detail` field of an error body.
///
/// Strings are returned verbatim, structured details as compact JSON, and
/// anything else falls back to a generic message.
pub fn extract_detail(body: &[u8]) -> String {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return FALLBACK_DETAIL.to_string();
    };
    detail_of(&value).unwrap_or_else(|| FALLBACK_DETAIL.to_string())
}

fn detail_of(value: &Value) -> Option<String> {
    match value.get("detail")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Interprets the defaults endpoint, which reports unknown engines as a
/// 200 reply of the form `[{"detail": ...}, 400]`.
fn parse_defaults(value: Value) -> AppResult<DefaultConnectionDetails> {
    match &value {
        Value::Array(items) => {
            let detail = items
                .first()
                .and_then(detail_of)
                .unwrap_or_else(|| FALLBACK_DETAIL.to_string());
            let status = items
                .get(1)
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok())
                .unwrap_or(400);
            Err(AppError::Backend { status, detail })
        }
        Value::Object(map) if map.contains_key("detail") && !map.contains_key("host") => {
            Err(AppError::Backend {
                status: 400,
                detail: detail_of(&value).unwrap_or_else(|| FALLBACK_DETAIL.to_string()),
            })
        }
        _ => Ok(serde_json::from_value(value)?),
    }
}

#[async_trait]
impl MigrationApi for HttpMigrationApi {
    async fn connect(&self, details: &ConnectionDetails) -> AppResult<ConnectResponse> {
        details.validate()?;
        let engine = details.engine();
        tracing::info!(engine = %engine, endpoint = %details.endpoint_label(), "connecting to source");
        let path = engine.connect_path();
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        self.post_json(&segments, details).await
    }

    async fn list_objects(
        &self,
        details: &OracleConnectionDetails,
        schema_name: &str,
        object_type: ObjectType,
    ) -> AppResult<Vec<String>> {
        details.check_identifier()?;
        let body = ListObjectsRequest {
            connection_details: details.clone(),
            schema_name: schema_name.to_string(),
            object_type,
        };
        let response: ListObjectsResponse = self
            .post_json(&["api", "oracle", "list-objects"], &body)
            .await?;
        tracing::debug!(
            schema = schema_name,
            object_type = %object_type,
            count = response.objects.len(),
            "listed objects"
        );
        Ok(response.objects)
    }

    async fn test_target_connection(
        &self,
        details: &PostgresConnectionDetails,
    ) -> AppResult<MessageResponse> {
        self.post_json(&["api", "test-postgres-connection"], details)
            .await
    }

    async fn start_migration(
        &self,
        request: &MigrationRequest,
    ) -> AppResult<StartMigrationResponse> {
        let response: StartMigrationResponse =
            self.post_json(&["api", "migrate"], request).await?;
        tracing::info!(
            job_id = %response.job_id,
            objects = request.selected_objects.len(),
            "migration initiated"
        );
        Ok(response)
    }

    async fn migration_status(&self, job_id: &str) -> AppResult<MigrationStatusResponse> {
        if job_id.trim().is_empty() {
            return Err(AppError::Validation("job id is required".to_string()));
        }
        self.get_json(&["api", "migration", "status", job_id]).await
    }

    async fn default_connection_details(
        &self,
        engine: DbEngine,
    ) -> AppResult<DefaultConnectionDetails> {
        let value = self
            .call(
                Method::GET,
                &["api", "default-connection-details", engine.as_str()],
                None::<&()>,
            )
            .await?;
        parse_defaults(value)
    }

    async fn health(&self) -> AppResult<()> {
        self.call(Method::GET, &["health"], None::<&()>).await.map(|_| ())
    }
}
