//! Migration status models returned by `GET /api/migration/status/{job_id}`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

/// Overall status of a parent or child job.
///
/// Unknown values are kept verbatim so new backend states still display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Other(s) => s,
        }
    }

    /// `completed` and `failed` end a migration; polling stops on them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => JobStatus::Pending,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            other => JobStatus::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(JobStatus::from).unwrap_or_default())
    }
}

/// Visual class of a pipeline stage status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageClass {
    Pending,
    Processing,
    Success,
    Failed,
    Skipped,
}

/// Status of a single pipeline stage, kept as the backend's string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageStatus(String);

impl StageStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn pending() -> Self {
        Self::new("pending")
    }

    pub fn skipped() -> Self {
        Self::new("skipped")
    }

    /// Uses the reported status, or `pending` when the stage has none yet.
    pub fn or_pending(status: Option<&str>) -> Self {
        match status {
            Some(s) if !s.is_empty() => Self::new(s),
            _ => Self::pending(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn class(&self) -> StageClass {
        match self.0.as_str() {
            "processing" => StageClass::Processing,
            "success" | "verified" | "extracted" => StageClass::Success,
            "failed" => StageClass::Failed,
            "skipped" => StageClass::Skipped,
            _ => StageClass::Pending,
        }
    }
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::pending()
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-object child job as reported by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ChildJobStatus {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default = "unknown", deserialize_with = "null_as_unknown")]
    pub object_type: String,
    #[serde(default = "unknown", deserialize_with = "null_as_unknown")]
    pub object_name: String,
    #[serde(default)]
    #[schema(value_type = String)]
    pub status: JobStatus,
    #[serde(default)]
    pub extraction_status: Option<String>,
    #[serde(default)]
    pub conversion_status: Option<String>,
    #[serde(default)]
    pub execution_status: Option<String>,
    #[serde(default)]
    pub data_migration_status: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub converted_ddl: Option<String>,
    #[serde(default)]
    pub original_sql: Option<String>,
}

fn unknown() -> String {
    "unknown".to_string()
}

/// Missing and `null` identity fields both read as `"unknown"`.
fn null_as_unknown<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(unknown))
}

/// Status of a parent migration job and its children.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MigrationStatusResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    #[schema(value_type = String)]
    pub status: JobStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub child_jobs: Vec<ChildJobStatus>,
}
