//! Migration request models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::connection::{ConnectionDetails, DbEngine, OracleConnectionDetails, PostgresConnectionDetails};
use crate::errors::{AppError, AppResult};

/// Kind of schema object that can be migrated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObjectType {
    Table,
    Procedure,
    Function,
    View,
    Package,
    Index,
    Trigger,
}

impl ObjectType {
    pub const ALL: [ObjectType; 7] = [
        ObjectType::Table,
        ObjectType::Procedure,
        ObjectType::Function,
        ObjectType::View,
        ObjectType::Package,
        ObjectType::Index,
        ObjectType::Trigger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Table => "TABLE",
            ObjectType::Procedure => "PROCEDURE",
            ObjectType::Function => "FUNCTION",
            ObjectType::View => "VIEW",
            ObjectType::Package => "PACKAGE",
            ObjectType::Index => "INDEX",
            ObjectType::Trigger => "TRIGGER",
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObjectType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        ObjectType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| AppError::Validation(format!("unsupported object type: {s}")))
    }
}

/// Builds the key under which an object's pipeline is tracked.
pub fn object_key(object_type: &str, object_name: &str) -> String {
    format!("{object_type}_{object_name}")
}

/// One schema object selected for migration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MigrationObject {
    pub object_type: ObjectType,
    pub object_name: String,
}

impl MigrationObject {
    pub fn new(object_type: ObjectType, object_name: impl Into<String>) -> Self {
        Self {
            object_type,
            object_name: object_name.into(),
        }
    }

    pub fn key(&self) -> String {
        object_key(self.object_type.as_str(), &self.object_name)
    }
}

/// Body of `POST /api/migrate`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct MigrationRequest {
    pub source_db_type: DbEngine,
    pub target_db_type: DbEngine,
    pub source_connection: ConnectionDetails,
    /// Without a target the backend converts but does not execute.
    pub target_connection: Option<PostgresConnectionDetails>,
    #[validate(length(min = 1, message = "source schema is required"))]
    pub source_schema: String,
    #[validate(length(min = 1, message = "target schema is required"))]
    pub target_schema: String,
    #[validate(length(min = 1, message = "at least one object must be selected"))]
    pub selected_objects: Vec<MigrationObject>,
    #[serde(default)]
    pub data_migration_enabled: bool,
}

impl MigrationRequest {
    /// Validates field constraints and normalises the source credentials to
    /// the declared source engine.
    pub fn prepare(mut self) -> AppResult<Self> {
        self.validate()?;
        self.source_connection = self.source_connection.reinterpret(self.source_db_type)?;
        self.source_connection.validate()?;
        if self.target_db_type != DbEngine::Postgresql {
            return Err(AppError::Validation(format!(
                "unsupported target database type: {}",
                self.target_db_type
            )));
        }
        Ok(self)
    }
}

/// Reply of `POST /api/migrate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct StartMigrationResponse {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of `POST /api/oracle/list-objects`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ListObjectsRequest {
    pub connection_details: OracleConnectionDetails,
    pub schema_name: String,
    pub object_type: ObjectType,
}

/// Reply of `POST /api/oracle/list-objects`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ListObjectsResponse {
    #[serde(default)]
    pub objects: Vec<String>,
}
