//! Connection models.
//!
//! Each engine has its own credential shape on the wire; the structs below
//! serialize to exactly the fields the backend's connect endpoint accepts.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};

/// Database engine supported by the migration backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DbEngine {
    Oracle,
    MySql,
    SqlServer,
    Teradata,
    Db2,
    Postgresql,
}

impl DbEngine {
    pub const ALL: [DbEngine; 6] = [
        DbEngine::Oracle,
        DbEngine::MySql,
        DbEngine::SqlServer,
        DbEngine::Teradata,
        DbEngine::Db2,
        DbEngine::Postgresql,
    ];

    /// Path segment used in backend URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DbEngine::Oracle => "oracle",
            DbEngine::MySql => "mysql",
            DbEngine::SqlServer => "sqlserver",
            DbEngine::Teradata => "teradata",
            DbEngine::Db2 => "db2",
            DbEngine::Postgresql => "postgresql",
        }
    }

    /// Conventional listener port, if the engine takes one.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            DbEngine::Oracle => Some(1521),
            DbEngine::MySql => Some(3306),
            DbEngine::SqlServer => Some(1433),
            DbEngine::Teradata => None,
            DbEngine::Db2 => Some(50000),
            DbEngine::Postgresql => Some(5432),
        }
    }

    /// Endpoint used to verify credentials for this engine.
    ///
    /// PostgreSQL is only ever a target, so it is checked through the
    /// dedicated target-test endpoint.
    pub fn connect_path(&self) -> String {
        match self {
            DbEngine::Postgresql => "/api/test-postgres-connection".to_string(),
            other => format!("/api/{}/connect", other.as_str()),
        }
    }
}

impl std::fmt::Display for DbEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DbEngine {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "oracle" => Ok(DbEngine::Oracle),
            "mysql" => Ok(DbEngine::MySql),
            "sqlserver" | "mssql" => Ok(DbEngine::SqlServer),
            "teradata" => Ok(DbEngine::Teradata),
            "db2" => Ok(DbEngine::Db2),
            "postgresql" | "postgres" => Ok(DbEngine::Postgresql),
            other => {
                let supported: Vec<&str> = DbEngine::ALL.iter().map(DbEngine::as_str).collect();
                Err(AppError::Validation(format!(
                    "unsupported database type: {other} (expected one of {})",
                    supported.join(", ")
                )))
            }
        }
    }
}

/// Oracle credentials. Exactly one of `service_name` / `sid` is sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct OracleConnectionDetails {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

impl OracleConnectionDetails {
    /// Checks that exactly one connect identifier is present.
    pub fn check_identifier(&self) -> AppResult<()> {
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        match (has(&self.service_name), has(&self.sid)) {
            (true, false) | (false, true) => Ok(()),
            (true, true) => Err(AppError::Validation(
                "oracle connection takes either a service name or a SID, not both".to_string(),
            )),
            (false, false) => Err(AppError::Validation(
                "oracle connection requires a service name or a SID".to_string(),
            )),
        }
    }
}

/// PostgreSQL credentials (migration target).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PostgresConnectionDetails {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

/// MySQL credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MySqlConnectionDetails {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// SQL Server credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SqlServerConnectionDetails {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// Teradata credentials. The driver resolves the port itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TeradataConnectionDetails {
    pub host: String,
    pub user: String,
    pub password: String,
}

/// DB2 credentials, named after the CLI driver's connection keywords.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Db2ConnectionDetails {
    pub hostname: String,
    pub port: u16,
    pub uid: String,
    pub pwd: String,
    pub database: String,
    pub protocol: String,
}

/// Credentials for any supported engine.
///
/// Serialized untagged: the body of a connect request is the inner struct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(untagged)]
pub enum ConnectionDetails {
    Oracle(OracleConnectionDetails),
    Postgres(PostgresConnectionDetails),
    MySql(MySqlConnectionDetails),
    SqlServer(SqlServerConnectionDetails),
    Teradata(TeradataConnectionDetails),
    Db2(Db2ConnectionDetails),
}

impl ConnectionDetails {
    pub fn engine(&self) -> DbEngine {
        match self {
            ConnectionDetails::Oracle(_) => DbEngine::Oracle,
            ConnectionDetails::Postgres(_) => DbEngine::Postgresql,
            ConnectionDetails::MySql(_) => DbEngine::MySql,
            ConnectionDetails::SqlServer(_) => DbEngine::SqlServer,
            ConnectionDetails::Teradata(_) => DbEngine::Teradata,
            ConnectionDetails::Db2(_) => DbEngine::Db2,
        }
    }

    /// `host:port` label for display; never includes credentials.
    pub fn endpoint_label(&self) -> String {
        match self {
            ConnectionDetails::Oracle(d) => format!("{}:{}", d.host, d.port),
            ConnectionDetails::Postgres(d) => format!("{}:{}", d.host, d.port),
            ConnectionDetails::MySql(d) => format!("{}:{}", d.host, d.port),
            ConnectionDetails::SqlServer(d) => format!("{}:{}", d.host, d.port),
            ConnectionDetails::Teradata(d) => d.host.clone(),
            ConnectionDetails::Db2(d) => format!("{}:{}", d.hostname, d.port),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        match self {
            ConnectionDetails::Oracle(d) => d.check_identifier(),
            _ => Ok(()),
        }
    }

    /// Re-reads the credentials as `engine`'s shape.
    ///
    /// Untagged decoding cannot tell engines with identical fields apart
    /// (MySQL and SQL Server), so requests that also name their engine are
    /// normalised through this.
    pub fn reinterpret(self, engine: DbEngine) -> AppResult<Self> {
        if self.engine() == engine {
            return Ok(self);
        }
        let value = serde_json::to_value(&self)?;
        let mismatch = |e: serde_json::Error| {
            AppError::Validation(format!(
                "connection details do not match database type {engine}: {e}"
            ))
        };
        let details = match engine {
            DbEngine::Oracle => {
                ConnectionDetails::Oracle(serde_json::from_value(value).map_err(mismatch)?)
            }
            DbEngine::Postgresql => {
                ConnectionDetails::Postgres(serde_json::from_value(value).map_err(mismatch)?)
            }
            DbEngine::MySql => {
                ConnectionDetails::MySql(serde_json::from_value(value).map_err(mismatch)?)
            }
            DbEngine::SqlServer => {
                ConnectionDetails::SqlServer(serde_json::from_value(value).map_err(mismatch)?)
            }
            DbEngine::Teradata => {
                ConnectionDetails::Teradata(serde_json::from_value(value).map_err(mismatch)?)
            }
            DbEngine::Db2 => {
                ConnectionDetails::Db2(serde_json::from_value(value).map_err(mismatch)?)
            }
        };
        Ok(details)
    }
}

impl From<OracleConnectionDetails> for ConnectionDetails {
    fn from(d: OracleConnectionDetails) -> Self {
        ConnectionDetails::Oracle(d)
    }
}

impl From<PostgresConnectionDetails> for ConnectionDetails {
    fn from(d: PostgresConnectionDetails) -> Self {
        ConnectionDetails::Postgres(d)
    }
}

/// Loose field bag used to assemble engine credentials from user input.
///
/// Values missing here can be pre-filled from [`DefaultConnectionDetails`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionFields {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub service_name: Option<String>,
    pub sid: Option<String>,
    pub dbname: Option<String>,
    pub database: Option<String>,
    pub protocol: Option<String>,
}

impl ConnectionFields {
    /// Fills unset fields from backend defaults.
    ///
    /// For Oracle the defaults carry both identifiers; a non-empty service
    /// name wins and the SID is only used when no service name exists.
    pub fn fill_from(&mut self, defaults: &DefaultConnectionDetails) {
        fn fill(slot: &mut Option<String>, value: &Option<String>) {
            if slot.is_none() {
                *slot = value.clone().filter(|v| !v.is_empty());
            }
        }
        fill(&mut self.host, &defaults.host);
        if self.port.is_none() {
            self.port = defaults.port;
        }
        fill(&mut self.user, &defaults.user);
        fill(&mut self.password, &defaults.password);
        fill(&mut self.dbname, &defaults.dbname);
        fill(&mut self.database, &defaults.database);
        if self.service_name.is_none() && self.sid.is_none() {
            match defaults.service_name.as_deref().filter(|s| !s.is_empty()) {
                Some(service) => self.service_name = Some(service.to_string()),
                None => fill(&mut self.sid, &defaults.sid),
            }
        }
    }

    /// Builds credentials for `engine`, reporting the first missing field.
    pub fn into_details(self, engine: DbEngine) -> AppResult<ConnectionDetails> {
        fn required<T>(value: Option<T>, engine: DbEngine, field: &str) -> AppResult<T> {
            value.ok_or_else(|| {
                AppError::Validation(format!("{engine} connection requires `{field}`"))
            })
        }
        let port = self.port.or_else(|| engine.default_port());

        let details = match engine {
            DbEngine::Oracle => ConnectionDetails::Oracle(OracleConnectionDetails {
                host: required(self.host, engine, "host")?,
                port: required(port, engine, "port")?,
                user: required(self.user, engine, "user")?,
                password: required(self.password, engine, "password")?,
                service_name: self.service_name,
                sid: self.sid,
            }),
            DbEngine::Postgresql => ConnectionDetails::Postgres(PostgresConnectionDetails {
                host: required(self.host, engine, "host")?,
                port: required(port, engine, "port")?,
                user: required(self.user, engine, "user")?,
                password: required(self.password, engine, "password")?,
                dbname: required(self.dbname, engine, "dbname")?,
            }),
            DbEngine::MySql => ConnectionDetails::MySql(MySqlConnectionDetails {
                host: required(self.host, engine, "host")?,
                port: required(port, engine, "port")?,
                user: required(self.user, engine, "user")?,
                password: required(self.password, engine, "password")?,
                database: required(self.database, engine, "database")?,
            }),
            DbEngine::SqlServer => ConnectionDetails::SqlServer(SqlServerConnectionDetails {
                host: required(self.host, engine, "host")?,
                port: required(port, engine, "port")?,
                user: required(self.user, engine, "user")?,
                password: required(self.password, engine, "password")?,
                database: required(self.database, engine, "database")?,
            }),
            DbEngine::Teradata => ConnectionDetails::Teradata(TeradataConnectionDetails {
                host: required(self.host, engine, "host")?,
                user: required(self.user, engine, "user")?,
                password: required(self.password, engine, "password")?,
            }),
            DbEngine::Db2 => ConnectionDetails::Db2(Db2ConnectionDetails {
                hostname: required(self.host, engine, "host")?,
                port: required(port, engine, "port")?,
                uid: required(self.user, engine, "user")?,
                pwd: required(self.password, engine, "password")?,
                database: required(self.database, engine, "database")?,
                protocol: self.protocol.unwrap_or_else(|| "TCPIP".to_string()),
            }),
        };
        details.validate()?;
        Ok(details)
    }
}

/// Reply of the connect endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ConnectResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Schemas visible to the user (Oracle only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemas: Option<Vec<String>>,
}

/// Reply carrying only a status message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MessageResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Pre-filled connection form values served by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct DefaultConnectionDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn keys(details: &ConnectionDetails) -> BTreeSet<String> {
        serde_json::to_value(details)
            .unwrap()
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect()
    }

    fn full_fields() -> ConnectionFields {
        ConnectionFields {
            host: Some("db.local".into()),
            port: Some(1000),
            user: Some("u".into()),
            password: Some("p".into()),
            service_name: Some("FREE".into()),
            sid: None,
            dbname: Some("postgres".into()),
            database: Some("sales".into()),
            protocol: None,
        }
    }

    #[test]
    fn test_connect_body_has_exactly_engine_fields() {
        let expected: [(DbEngine, &[&str]); 6] = [
            (DbEngine::Oracle, &["host", "password", "port", "service_name", "user"]),
            (DbEngine::Postgresql, &["dbname", "host", "password", "port", "user"]),
            (DbEngine::MySql, &["database", "host", "password", "port", "user"]),
            (DbEngine::SqlServer, &["database", "host", "password", "port", "user"]),
            (DbEngine::Teradata, &["host", "password", "user"]),
            (DbEngine::Db2, &["database", "hostname", "port", "protocol", "pwd", "uid"]),
        ];
        for (engine, fields) in expected {
            let details = full_fields().into_details(engine).unwrap();
            assert_eq!(details.engine(), engine);
            let want: BTreeSet<String> = fields.iter().map(|f| f.to_string()).collect();
            assert_eq!(keys(&details), want, "engine {engine}");
        }
    }

    #[test]
    fn test_oracle_sid_replaces_service_name() {
        let mut fields = full_fields();
        fields.service_name = None;
        fields.sid = Some("ORCL".into());
        let details = fields.into_details(DbEngine::Oracle).unwrap();
        let body = serde_json::to_value(&details).unwrap();
        assert_eq!(body["sid"], "ORCL");
        assert!(body.get("service_name").is_none());
    }

    #[test]
    fn test_oracle_requires_single_identifier() {
        let mut fields = full_fields();
        fields.service_name = None;
        assert!(fields.clone().into_details(DbEngine::Oracle).is_err());

        fields.service_name = Some("FREE".into());
        fields.sid = Some("ORCL".into());
        assert!(fields.into_details(DbEngine::Oracle).is_err());
    }

    #[test]
    fn test_missing_field_is_reported() {
        let mut fields = full_fields();
        fields.dbname = None;
        let err = fields.into_details(DbEngine::Postgresql).unwrap_err();
        assert_eq!(err.to_string(), "postgresql connection requires `dbname`");
    }

    #[test]
    fn test_port_falls_back_to_engine_default() {
        let mut fields = full_fields();
        fields.port = None;
        match fields.into_details(DbEngine::MySql).unwrap() {
            ConnectionDetails::MySql(d) => assert_eq!(d.port, 3306),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_fill_from_defaults_prefers_service_name() {
        let defaults = DefaultConnectionDetails {
            host: Some("localhost".into()),
            port: Some(1521),
            user: Some("migrator".into()),
            password: Some("password".into()),
            service_name: Some("FREE".into()),
            sid: Some(String::new()),
            ..Default::default()
        };
        let mut fields = ConnectionFields {
            user: Some("scott".into()),
            ..Default::default()
        };
        fields.fill_from(&defaults);
        assert_eq!(fields.host.as_deref(), Some("localhost"));
        assert_eq!(fields.user.as_deref(), Some("scott"));
        assert_eq!(fields.service_name.as_deref(), Some("FREE"));
        assert_eq!(fields.sid, None);
    }

    #[test]
    fn test_fill_from_defaults_uses_sid_without_service_name() {
        let defaults = DefaultConnectionDetails {
            service_name: Some(String::new()),
            sid: Some("ORCL".into()),
            ..Default::default()
        };
        let mut fields = ConnectionFields::default();
        fields.fill_from(&defaults);
        assert_eq!(fields.service_name, None);
        assert_eq!(fields.sid.as_deref(), Some("ORCL"));
    }

    #[test]
    fn test_untagged_decode_then_reinterpret() {
        let body = serde_json::json!({
            "host": "mssql", "port": 1433, "user": "sa", "password": "pw", "database": "sales"
        });
        let decoded: ConnectionDetails = serde_json::from_value(body).unwrap();
        assert_eq!(decoded.engine(), DbEngine::MySql);
        let details = decoded.reinterpret(DbEngine::SqlServer).unwrap();
        assert_eq!(details.engine(), DbEngine::SqlServer);

        let pg = serde_json::json!({
            "host": "pg", "port": 5432, "user": "postgres", "password": "pw", "dbname": "postgres"
        });
        let decoded: ConnectionDetails = serde_json::from_value(pg).unwrap();
        assert_eq!(decoded.engine(), DbEngine::Postgresql);
        assert!(decoded.reinterpret(DbEngine::Oracle).is_err());
    }

    #[test]
    fn test_engine_paths() {
        assert_eq!(DbEngine::Oracle.connect_path(), "/api/oracle/connect");
        assert_eq!(DbEngine::Db2.connect_path(), "/api/db2/connect");
        assert_eq!(
            DbEngine::Postgresql.connect_path(),
            "/api/test-postgres-connection"
        );
        assert_eq!("Postgres".parse::<DbEngine>().unwrap(), DbEngine::Postgresql);
        let err = "sybase".parse::<DbEngine>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported database type: sybase (expected one of oracle, mysql, sqlserver, teradata, db2, postgresql)"
        );
    }
}
