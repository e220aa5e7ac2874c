//! Command line definition for `dbmigrate`.

use clap::{ArgAction, Args, Parser, Subcommand};

use common::config::TargetDefaults;
use common::models::{ConnectionFields, DbEngine, ObjectType, PostgresConnectionDetails};

#[derive(Parser, Debug)]
#[command(name = "dbmigrate")]
#[command(about = "Drive the database migration backend from a terminal")]
#[command(version)]
#[command(long_about = "
dbmigrate - client for the database migration backend

Connects to a source database through the backend, lists schema objects,
starts a migration to PostgreSQL and follows its progress object by object.

EXAMPLES:
  dbmigrate defaults oracle
  dbmigrate connect oracle --use-defaults
  dbmigrate list-objects --use-defaults --schema HR --object-type TABLE
  dbmigrate migrate --use-defaults --schema HR --object-type TABLE --object EMPLOYEES --object DEPARTMENTS
  dbmigrate status 3f1c2d4e --watch
")]
pub struct Cli {
    /// Base URL of the migration backend
    #[arg(long, global = true, env = "MIGRATION_API_URL")]
    pub api_url: Option<String>,

    /// Seconds between two status requests
    #[arg(
        long,
        global = true,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(
        long,
        global = true,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: Option<u64>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the backend's default connection values for an engine
    Defaults {
        /// oracle, mysql, sqlserver, teradata, db2 or postgresql
        engine: DbEngine,
    },

    /// Test a source connection; Oracle also lists the visible schemas
    Connect {
        engine: DbEngine,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// List the objects of one type in an Oracle schema
    ListObjects {
        #[arg(long)]
        schema: String,

        #[arg(long)]
        object_type: ObjectType,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Test the PostgreSQL target connection
    TestTarget {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Start a migration and follow it until it completes or fails
    Migrate(MigrateArgs),

    /// Show the status of a migration
    Status {
        job_id: String,

        /// Keep polling until the migration completes or fails
        #[arg(long)]
        watch: bool,
    },
}

/// Source connection fields. Unset values can be taken from the backend
/// defaults with `--use-defaults`.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub user: Option<String>,

    #[arg(long, env = "SOURCE_DB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Oracle service name (takes precedence over --sid)
    #[arg(long)]
    pub service_name: Option<String>,

    /// Oracle SID
    #[arg(long)]
    pub sid: Option<String>,

    /// PostgreSQL database name
    #[arg(long)]
    pub dbname: Option<String>,

    /// MySQL, SQL Server or DB2 database name
    #[arg(long)]
    pub database: Option<String>,

    /// DB2 protocol
    #[arg(long)]
    pub protocol: Option<String>,

    /// Fill unset fields from the backend's default connection details
    #[arg(long)]
    pub use_defaults: bool,
}

impl ConnectionArgs {
    /// Field set for the connection. A non-empty `--service-name` drops `--sid`.
    pub fn to_fields(&self) -> ConnectionFields {
        let has_service_name = self.service_name.as_deref().is_some_and(|s| !s.is_empty());
        ConnectionFields {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            service_name: self.service_name.clone(),
            sid: self.sid.clone().filter(|_| !has_service_name),
            dbname: self.dbname.clone(),
            database: self.database.clone(),
            protocol: self.protocol.clone(),
        }
    }
}

/// PostgreSQL target fields, defaulting to the `POSTGRES_DB_*` environment.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    #[arg(long)]
    pub target_host: Option<String>,

    #[arg(long)]
    pub target_port: Option<u16>,

    #[arg(long)]
    pub target_user: Option<String>,

    #[arg(long)]
    pub target_password: Option<String>,

    #[arg(long)]
    pub target_dbname: Option<String>,
}

impl TargetArgs {
    pub fn resolve(&self, defaults: &TargetDefaults) -> PostgresConnectionDetails {
        PostgresConnectionDetails {
            host: self.target_host.clone().unwrap_or_else(|| defaults.host.clone()),
            port: self.target_port.unwrap_or(defaults.port),
            user: self.target_user.clone().unwrap_or_else(|| defaults.user.clone()),
            password: self
                .target_password
                .clone()
                .unwrap_or_else(|| defaults.password.clone()),
            dbname: self
                .target_dbname
                .clone()
                .unwrap_or_else(|| defaults.dbname.clone()),
        }
    }
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Source engine
    #[arg(long, default_value = "oracle")]
    pub source_type: DbEngine,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Source schema
    #[arg(long)]
    pub schema: String,

    #[arg(long)]
    pub object_type: ObjectType,

    /// Object name; repeat for several objects
    #[arg(long = "object", required = true)]
    pub objects: Vec<String>,

    /// Target schema (defaults to the target database name)
    #[arg(long)]
    pub target_schema: Option<String>,

    /// Also copy table rows
    #[arg(long)]
    pub data_migration: bool,

    /// Convert only; do not execute on a target database
    #[arg(long)]
    pub no_target: bool,

    /// Print the job id and exit without following progress
    #[arg(long)]
    pub detach: bool,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_migrate() {
        let cli = Cli::try_parse_from([
            "dbmigrate",
            "migrate",
            "--use-defaults",
            "--schema",
            "HR",
            "--object-type",
            "table",
            "--object",
            "EMP",
            "--object",
            "DEPT",
            "--data-migration",
            "--no-target",
        ])
        .unwrap();
        let Command::Migrate(args) = cli.command else {
            panic!("expected migrate");
        };
        assert_eq!(args.source_type, DbEngine::Oracle);
        assert_eq!(args.object_type, ObjectType::Table);
        assert_eq!(args.objects, vec!["EMP", "DEPT"]);
        assert!(args.connection.use_defaults);
        assert!(args.data_migration && args.no_target && !args.detach);
    }

    #[test]
    fn test_migrate_requires_objects() {
        let parsed = Cli::try_parse_from([
            "dbmigrate",
            "migrate",
            "--schema",
            "HR",
            "--object-type",
            "VIEW",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_engine_aliases_and_global_flags() {
        let cli = Cli::try_parse_from(["dbmigrate", "defaults", "mssql", "-vv", "--poll-interval", "5"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Defaults {
                engine: DbEngine::SqlServer
            }
        ));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.poll_interval, Some(5));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        assert!(Cli::try_parse_from(["dbmigrate", "status", "p-1", "--poll-interval", "0"]).is_err());
    }

    #[test]
    fn test_target_args_fall_back_to_defaults() {
        let args = TargetArgs {
            target_host: Some("pg.internal".into()),
            ..Default::default()
        };
        let target = args.resolve(&TargetDefaults::default());
        assert_eq!(target.host, "pg.internal");
        assert_eq!(target.port, 5432);
        assert_eq!(target.dbname, "postgres");
    }

    #[test]
    fn test_service_name_takes_precedence_over_sid() {
        let args = ConnectionArgs {
            host: Some("ora.local".into()),
            user: Some("scott".into()),
            password: Some("tiger".into()),
            service_name: Some("FREE".into()),
            sid: Some("ORCL".into()),
            ..Default::default()
        };
        let fields = args.to_fields();
        assert_eq!(fields.sid, None);
        let details = fields.into_details(DbEngine::Oracle).unwrap();
        let body = serde_json::to_value(&details).unwrap();
        assert_eq!(body["service_name"], "FREE");
        assert!(body.get("sid").is_none());

        let sid_only = ConnectionArgs {
            service_name: None,
            ..args
        };
        assert_eq!(sid_only.to_fields().sid.as_deref(), Some("ORCL"));
    }
}
