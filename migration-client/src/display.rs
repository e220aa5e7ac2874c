//! Plain-text rendering of tracker snapshots.

use std::fmt;

use common::models::pipeline::{PipelineEntry, PipelineMap, StagePlan};
use common::models::{
    ConnectResponse, DefaultConnectionDetails, MigrationStatusResponse, ObjectType, StageClass,
};

use crate::tracker::TrackerSnapshot;

/// Live dashboard for one migration.
pub struct Dashboard<'a>(pub &'a TrackerSnapshot);

impl fmt::Display for Dashboard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.0;
        write!(
            f,
            "Migration {}  status: {}",
            snapshot.job_id.as_deref().unwrap_or("(not started)"),
            snapshot.overall_status
        )?;
        if snapshot.running {
            write!(f, "  (polling, {} updates)", snapshot.polls)?;
        }
        writeln!(f, "  at {}", snapshot.updated_at.format("%H:%M:%S"))?;

        if let Some(summary) = &snapshot.summary {
            writeln!(
                f,
                "{} {} -> {} {}  ({} objects, data migration {}, {})",
                summary.source_db_type,
                summary.source_schema,
                summary.target_db_type,
                summary.target_schema,
                summary.objects.len(),
                if summary.data_migration_enabled { "on" } else { "off" },
                if summary.plan.has_target {
                    "executing on target"
                } else {
                    "conversion only"
                },
            )?;
        }
        if let Some(error) = &snapshot.error_message {
            writeln!(f, "Error: {error}")?;
        }

        let plan = snapshot
            .summary
            .as_ref()
            .map(|s| s.plan)
            .unwrap_or(StagePlan {
                has_target: true,
                data_migration_enabled: true,
            });
        write_pipeline(f, &snapshot.pipeline, plan)
    }
}

/// One-shot rendering of a status response, without a known request.
pub struct StatusReport<'a>(pub &'a MigrationStatusResponse);

impl fmt::Display for StatusReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let response = self.0;
        writeln!(
            f,
            "Migration {}  status: {}",
            response.job_id.as_deref().unwrap_or("?"),
            response.status
        )?;
        if let Some(error) = response.error_message.as_deref().filter(|e| !e.is_empty()) {
            writeln!(f, "Error: {error}")?;
        }
        let plan = StagePlan {
            has_target: true,
            data_migration_enabled: true,
        };
        write_pipeline(f, &common::models::aggregate(&response.child_jobs), plan)
    }
}

fn write_pipeline(f: &mut fmt::Formatter<'_>, pipeline: &PipelineMap, plan: StagePlan) -> fmt::Result {
    for (key, entry) in pipeline {
        writeln!(f)?;
        write_entry(f, key, entry, plan)?;
    }
    Ok(())
}

fn write_entry(
    f: &mut fmt::Formatter<'_>,
    key: &str,
    entry: &PipelineEntry,
    plan: StagePlan,
) -> fmt::Result {
    writeln!(f, "{key}  [{}]", entry.overall)?;
    // Unrecognised types are rendered like any non-table object.
    let object_type = object_type_of(key).unwrap_or(ObjectType::View);
    for (stage, status) in plan.stages(object_type, entry) {
        writeln!(
            f,
            "    {} {:<15} {}",
            marker(status.class()),
            stage.label(),
            status
        )?;
    }
    if let Some(error) = &entry.error_message {
        writeln!(f, "    error: {error}")?;
    }
    if let Some(ddl) = entry.ddl_preview() {
        let ellipsis = match &entry.converted_ddl {
            Some(full) if full.len() > ddl.len() => "...",
            _ => "",
        };
        writeln!(f, "    ddl: {}{ellipsis}", ddl.replace('\n', " "))?;
    }
    Ok(())
}

fn object_type_of(key: &str) -> Option<ObjectType> {
    key.split_once('_')?.0.parse().ok()
}

fn marker(class: StageClass) -> &'static str {
    match class {
        StageClass::Success => "[ok]",
        StageClass::Failed => "[!!]",
        StageClass::Processing => "[..]",
        StageClass::Skipped => "[--]",
        StageClass::Pending => "[  ]",
    }
}

/// Connect result: the backend's message and, for Oracle, the schemas.
pub struct ConnectReport<'a>(pub &'a ConnectResponse);

impl fmt::Display for ConnectReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}",
            self.0.message.as_deref().unwrap_or("Connection successful")
        )?;
        if let Some(schemas) = &self.0.schemas {
            writeln!(f, "Schemas ({}):", schemas.len())?;
            for schema in schemas {
                writeln!(f, "  {schema}")?;
            }
        }
        Ok(())
    }
}

/// Default connection values, one `field: value` per line.
pub struct DefaultsReport<'a>(pub &'a DefaultConnectionDetails);

impl fmt::Display for DefaultsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.0;
        let port = d.port.map(|p| p.to_string());
        let fields = [
            ("host", d.host.as_deref()),
            ("port", port.as_deref()),
            ("user", d.user.as_deref()),
            ("password", d.password.as_deref().map(|_| "********")),
            ("service_name", d.service_name.as_deref()),
            ("sid", d.sid.as_deref()),
            ("dbname", d.dbname.as_deref()),
            ("database", d.database.as_deref()),
        ];
        for (name, value) in fields {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                writeln!(f, "{name:<13} {value}")?;
            }
        }
        Ok(())
    }
}
