//! `dbmigrate`: terminal front end for the migration backend.

mod cli;

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use common::config::{load_dotenv, PollSettings, ServiceUrls, TargetDefaults};
use common::errors::AppError;
use common::models::{
    ConnectionDetails, DbEngine, JobStatus, MigrationObject, MigrationRequest,
};
use migration_client::display::{ConnectReport, Dashboard, DefaultsReport, StatusReport};
use migration_client::{
    HttpMigrationApi, MigrationApi, MigrationTracker, TrackerHandle, TrackerSnapshot,
};

use cli::{Cli, Command, ConnectionArgs, MigrateArgs};

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = PollSettings::load();
    if let Some(secs) = cli.poll_interval {
        settings.interval = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.timeout {
        settings.request_timeout = Duration::from_secs(secs);
    }
    let api_url = cli
        .api_url
        .clone()
        .unwrap_or_else(|| ServiceUrls::load().migration_api);
    let api = Arc::new(HttpMigrationApi::new(&api_url, settings.request_timeout)?);
    tracing::debug!(api_url = %api.base_url(), interval = ?settings.interval, "client configured");

    let tracker = MigrationTracker::new(api.clone(), settings.interval);
    run(cli.command, api.as_ref(), &tracker).await
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();
}

async fn run(command: Command, api: &HttpMigrationApi, tracker: &MigrationTracker) -> Result<()> {
    match command {
        Command::Defaults { engine } => {
            let defaults = api
                .default_connection_details(engine)
                .await
                .with_context(|| format!("failed to load {engine} defaults"))?;
            print!("{}", DefaultsReport(&defaults));
        }
        Command::Connect { engine, connection } => {
            let details = source_details(api, engine, &connection).await?;
            let response = api.connect(&details).await?;
            print!("{}", ConnectReport(&response));
        }
        Command::ListObjects {
            schema,
            object_type,
            connection,
        } => {
            let ConnectionDetails::Oracle(details) =
                source_details(api, DbEngine::Oracle, &connection).await?
            else {
                bail!("object listing needs Oracle connection details");
            };
            let objects = api.list_objects(&details, &schema, object_type).await?;
            if objects.is_empty() {
                eprintln!("No {object_type} objects found in {schema}");
            }
            for name in objects {
                println!("{name}");
            }
        }
        Command::TestTarget { target } => {
            let details = target.resolve(&TargetDefaults::from_env());
            let response = api.test_target_connection(&details).await?;
            println!(
                "{}",
                response.message.as_deref().unwrap_or("Connection successful")
            );
        }
        Command::Migrate(args) => migrate(api, tracker, args).await?,
        Command::Status { job_id, watch } => {
            if watch {
                let handle = tracker.attach(&job_id)?;
                finish(follow(handle).await)?;
            } else {
                let response = api.migration_status(&job_id).await?;
                print!("{}", StatusReport(&response));
            }
        }
    }
    Ok(())
}

/// Assembles source credentials from flags, optionally pre-filled from the
/// backend's defaults.
async fn source_details(
    api: &HttpMigrationApi,
    engine: DbEngine,
    args: &ConnectionArgs,
) -> Result<ConnectionDetails> {
    let mut fields = args.to_fields();
    if args.use_defaults {
        let defaults = api
            .default_connection_details(engine)
            .await
            .with_context(|| format!("failed to load {engine} defaults"))?;
        fields.fill_from(&defaults);
    }
    Ok(fields.into_details(engine)?)
}

async fn migrate(api: &HttpMigrationApi, tracker: &MigrationTracker, args: MigrateArgs) -> Result<()> {
    let source_connection = source_details(api, args.source_type, &args.connection).await?;
    let target_defaults = TargetDefaults::from_env();
    let target = args.target.resolve(&target_defaults);
    let target_schema = args
        .target_schema
        .clone()
        .unwrap_or_else(|| target.dbname.clone());

    let request = MigrationRequest {
        source_db_type: args.source_type,
        target_db_type: DbEngine::Postgresql,
        source_connection,
        target_connection: (!args.no_target).then_some(target),
        source_schema: args.schema.clone(),
        target_schema,
        selected_objects: args
            .objects
            .iter()
            .map(|name| MigrationObject::new(args.object_type, name.as_str()))
            .collect(),
        data_migration_enabled: args.data_migration,
    };

    if args.detach {
        let response = api.start_migration(&request.prepare()?).await?;
        println!("{}", response.job_id);
        return Ok(());
    }

    match tracker.start(request.clone()).await {
        Ok(handle) => finish(follow(handle).await),
        Err(err @ AppError::Validation(_)) => Err(err.into()),
        Err(err) => {
            let mut snapshot = TrackerSnapshot::default();
            snapshot.begin(&request);
            snapshot.initiation_failed(&err);
            render(&snapshot);
            Err(err.into())
        }
    }
}

/// Renders every snapshot change until polling ends. Ctrl-C stops watching
/// without cancelling the migration on the backend.
async fn follow(mut handle: TrackerHandle) -> Result<TrackerSnapshot> {
    let mut updates = handle.subscribe();
    loop {
        let snapshot = updates.borrow_and_update().clone();
        render(&snapshot);
        if !snapshot.running {
            return Ok(snapshot);
        }
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(handle.snapshot());
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                handle.stop();
                eprintln!(
                    "Stopped watching. Resume with `dbmigrate status {} --watch`.",
                    handle.job_id()
                );
                return Ok(handle.wait_until_settled().await);
            }
        }
    }
}

fn render(snapshot: &TrackerSnapshot) {
    let mut stdout = std::io::stdout();
    if stdout.is_terminal() {
        print!("\x1b[2J\x1b[H");
    } else {
        println!();
    }
    print!("{}", Dashboard(snapshot));
    let _ = std::io::Write::flush(&mut stdout);
}

/// Maps the final snapshot to the process outcome.
fn finish(snapshot: Result<TrackerSnapshot>) -> Result<()> {
    let snapshot = snapshot?;
    let job_id = snapshot.job_id.as_deref().unwrap_or("?");
    match (&snapshot.overall_status, &snapshot.error_message) {
        (JobStatus::Failed, Some(error)) => bail!("migration {job_id} failed: {error}"),
        (JobStatus::Failed, None) => bail!("migration {job_id} failed"),
        (JobStatus::Completed, _) => Ok(()),
        (_, Some(error)) => bail!("{error}"),
        _ => Ok(()),
    }
}
