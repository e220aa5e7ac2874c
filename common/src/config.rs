//! Environment-driven configuration.
//!
//! Every value has a default so a bare `cargo run` talks to a backend on
//! `localhost:8000`.

use std::time::Duration;

use crate::models::connection::PostgresConnectionDetails;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MIGRATION_API_URL: &str = "http://localhost:8000";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Listener configuration for an HTTP service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    /// Loads configuration for the named service from `SERVER_HOST` / `SERVER_PORT`.
    pub fn load_with_service(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            host: env_or("SERVER_HOST", DEFAULT_HOST),
            port: env_parse("SERVER_PORT").unwrap_or(DEFAULT_PORT),
        }
    }
}

/// Upstream service locations.
#[derive(Debug, Clone)]
pub struct ServiceUrls {
    /// Base URL of the migration backend (no trailing slash).
    pub migration_api: String,
}

impl ServiceUrls {
    pub fn load() -> Self {
        Self {
            migration_api: env_or("MIGRATION_API_URL", DEFAULT_MIGRATION_API_URL)
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

/// Status polling and HTTP client timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between two status requests for a running migration.
    pub interval: Duration,
    /// Per-request timeout for backend calls.
    pub request_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl PollSettings {
    /// Reads `STATUS_POLL_INTERVAL_SECS` and `HTTP_TIMEOUT_SECS`.
    ///
    /// A zero interval is rejected and falls back to the default, since the
    /// poller would otherwise spin.
    pub fn load() -> Self {
        let defaults = Self::default();
        Self {
            interval: env_parse::<u64>("STATUS_POLL_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            request_timeout: env_parse::<u64>("HTTP_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}

/// Default PostgreSQL target used when a migration does not name one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDefaults {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl Default for TargetDefaults {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            dbname: "postgres".to_string(),
        }
    }
}

impl TargetDefaults {
    /// Reads the `POSTGRES_DB_*` variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_or("POSTGRES_DB_HOST", &defaults.host),
            port: env_parse("POSTGRES_DB_PORT").unwrap_or(defaults.port),
            user: env_or("POSTGRES_DB_USER", &defaults.user),
            password: env_or("POSTGRES_DB_PASSWORD", &defaults.password),
            dbname: env_or("POSTGRES_DB_NAME", &defaults.dbname),
        }
    }

    pub fn to_connection(&self) -> PostgresConnectionDetails {
        PostgresConnectionDetails {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            dbname: self.dbname.clone(),
        }
    }
}

/// Loads `.env` from the working directory.
///
/// Missing files are ignored and variables already present in the
/// environment win over the file.
pub fn load_dotenv() {
    let env_path = std::path::Path::new(".env");
    let Ok(content) = std::fs::read_to_string(env_path) else {
        return;
    };
    for (key, value) in parse_dotenv(&content) {
        if std::env::var(key).is_err() {
            std::env::set_var(key, value);
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim().trim_matches('"')))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
