//! Per-object pipeline view built from child job statuses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::migration::{object_key, MigrationObject, MigrationRequest, ObjectType};
use super::status::{ChildJobStatus, JobStatus, StageStatus};

/// Characters of converted DDL shown in previews.
pub const DDL_PREVIEW_CHARS: usize = 200;

/// Pipeline entries keyed by `"{object_type}_{object_name}"`.
pub type PipelineMap = BTreeMap<String, PipelineEntry>;

/// Pipeline stage of a migrated object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    Conversion,
    Execution,
    DataMigration,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Extraction => "Extraction",
            Stage::Conversion => "Conversion",
            Stage::Execution => "Execution",
            Stage::DataMigration => "Data Migration",
        }
    }
}

/// Aggregated state of one object's pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct PipelineEntry {
    #[schema(value_type = String)]
    pub overall: JobStatus,
    #[schema(value_type = String)]
    pub extraction: StageStatus,
    #[schema(value_type = String)]
    pub conversion: StageStatus,
    #[schema(value_type = String)]
    pub execution: StageStatus,
    #[schema(value_type = String)]
    pub data_migration: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_ddl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl PipelineEntry {
    /// Placeholder for an object whose child job has not been reported yet.
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn stage(&self, stage: Stage) -> &StageStatus {
        match stage {
            Stage::Extraction => &self.extraction,
            Stage::Conversion => &self.conversion,
            Stage::Execution => &self.execution,
            Stage::DataMigration => &self.data_migration,
        }
    }

    /// First [`DDL_PREVIEW_CHARS`] characters of the converted DDL.
    pub fn ddl_preview(&self) -> Option<&str> {
        let ddl = self.converted_ddl.as_deref()?;
        let end = ddl
            .char_indices()
            .nth(DDL_PREVIEW_CHARS)
            .map_or(ddl.len(), |(idx, _)| idx);
        Some(&ddl[..end])
    }
}

impl From<&ChildJobStatus> for PipelineEntry {
    fn from(child: &ChildJobStatus) -> Self {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        Self {
            overall: child.status.clone(),
            extraction: StageStatus::or_pending(child.extraction_status.as_deref()),
            conversion: StageStatus::or_pending(child.conversion_status.as_deref()),
            execution: StageStatus::or_pending(child.execution_status.as_deref()),
            data_migration: StageStatus::or_pending(child.data_migration_status.as_deref()),
            error_message: non_empty(&child.error_message),
            converted_ddl: non_empty(&child.converted_ddl),
            original_sql: non_empty(&child.original_sql),
            job_id: child.job_id.clone(),
        }
    }
}

/// Maps child jobs to pipeline entries by object key.
///
/// When the backend reports the same object twice the later entry wins.
pub fn aggregate(child_jobs: &[ChildJobStatus]) -> PipelineMap {
    child_jobs
        .iter()
        .map(|child| {
            (
                object_key(&child.object_type, &child.object_name),
                PipelineEntry::from(child),
            )
        })
        .collect()
}

/// Pending entries for every selected object.
pub fn initial_pipeline(objects: &[MigrationObject]) -> PipelineMap {
    objects
        .iter()
        .map(|obj| (obj.key(), PipelineEntry::pending()))
        .collect()
}

/// Which stages a migration shows for its objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StagePlan {
    /// Execution only runs when a target connection was supplied.
    pub has_target: bool,
    pub data_migration_enabled: bool,
}

impl StagePlan {
    pub fn for_request(request: &MigrationRequest) -> Self {
        Self {
            has_target: request.target_connection.is_some(),
            data_migration_enabled: request.data_migration_enabled,
        }
    }

    /// Stages to display for an object together with their status.
    ///
    /// Execution reads `skipped` without a target; data migration is listed
    /// only for tables when enabled.
    pub fn stages(
        &self,
        object_type: ObjectType,
        entry: &PipelineEntry,
    ) -> Vec<(Stage, StageStatus)> {
        let mut stages = vec![
            (Stage::Extraction, entry.extraction.clone()),
            (Stage::Conversion, entry.conversion.clone()),
        ];
        let execution = if self.has_target {
            entry.execution.clone()
        } else {
            StageStatus::skipped()
        };
        stages.push((Stage::Execution, execution));
        if object_type == ObjectType::Table && self.data_migration_enabled {
            stages.push((Stage::DataMigration, entry.data_migration.clone()));
        }
        stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::status::StageClass;

    fn child(object_type: &str, name: &str) -> ChildJobStatus {
        ChildJobStatus {
            job_id: Some(format!("job-{name}")),
            object_type: object_type.to_string(),
            object_name: name.to_string(),
            status: JobStatus::Processing,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_stage_statuses_default_to_pending() {
        let map = aggregate(&[child("TABLE", "EMP")]);
        let entry = &map["TABLE_EMP"];
        for stage in [
            Stage::Extraction,
            Stage::Conversion,
            Stage::Execution,
            Stage::DataMigration,
        ] {
            assert_eq!(entry.stage(stage).as_str(), "pending", "{stage:?}");
        }
        assert_eq!(entry.error_message, None);
        assert_eq!(entry.job_id.as_deref(), Some("job-EMP"));
    }

    #[test]
    fn test_empty_stage_string_counts_as_missing() {
        let mut c = child("VIEW", "EMP_V");
        c.extraction_status = Some("extracted".into());
        c.conversion_status = Some(String::new());
        let entry = PipelineEntry::from(&c);
        assert_eq!(entry.extraction.class(), StageClass::Success);
        assert_eq!(entry.conversion.as_str(), "pending");
    }

    #[test]
    fn test_aggregate_keys_by_type_and_name() {
        let mut emp = child("TABLE", "EMP");
        emp.status = JobStatus::Completed;
        emp.converted_ddl = Some("CREATE TABLE emp (id numeric);".into());
        let map = aggregate(&[emp, child("PROCEDURE", "RAISE_SALARY")]);
        assert_eq!(
            map.keys().cloned().collect::<Vec<_>>(),
            vec!["PROCEDURE_RAISE_SALARY", "TABLE_EMP"]
        );
        assert_eq!(map["TABLE_EMP"].overall, JobStatus::Completed);
        assert!(map["TABLE_EMP"].converted_ddl.is_some());
    }

    #[test]
    fn test_null_object_type_keys_as_unknown() {
        let children: Vec<ChildJobStatus> = serde_json::from_str(
            r#"[{"job_id": "c-1", "object_type": null, "object_name": "EMP", "status": "processing"}]"#,
        )
        .unwrap();
        let map = aggregate(&children);
        assert_eq!(map.keys().cloned().collect::<Vec<_>>(), vec!["unknown_EMP"]);
        assert_eq!(map["unknown_EMP"].overall, JobStatus::Processing);
    }

    #[test]
    fn test_stage_plan_without_target_skips_execution() {
        let plan = StagePlan {
            has_target: false,
            data_migration_enabled: true,
        };
        let mut entry = PipelineEntry::pending();
        entry.execution = StageStatus::new("success");

        let table = plan.stages(ObjectType::Table, &entry);
        assert_eq!(table.len(), 4);
        assert_eq!(table[2], (Stage::Execution, StageStatus::skipped()));

        let view = plan.stages(ObjectType::View, &entry);
        assert_eq!(view.len(), 3);
    }

    #[test]
    fn test_stage_plan_hides_data_migration_when_disabled() {
        let plan = StagePlan {
            has_target: true,
            data_migration_enabled: false,
        };
        let stages = plan.stages(ObjectType::Table, &PipelineEntry::pending());
        assert!(stages.iter().all(|(s, _)| *s != Stage::DataMigration));
    }

    #[test]
    fn test_ddl_preview_is_char_bounded() {
        let entry = PipelineEntry {
            converted_ddl: Some("é".repeat(250)),
            ..Default::default()
        };
        assert_eq!(entry.ddl_preview().unwrap().chars().count(), DDL_PREVIEW_CHARS);

        let short = PipelineEntry {
            converted_ddl: Some("CREATE VIEW v AS SELECT 1;".into()),
            ..Default::default()
        };
        assert_eq!(short.ddl_preview(), Some("CREATE VIEW v AS SELECT 1;"));
    }

    #[test]
    fn test_initial_pipeline_is_all_pending() {
        let objects = vec![
            MigrationObject::new(ObjectType::Table, "EMP"),
            MigrationObject::new(ObjectType::Trigger, "EMP_AUDIT"),
        ];
        let map = initial_pipeline(&objects);
        assert_eq!(map.len(), 2);
        assert!(map.values().all(|e| *e == PipelineEntry::pending()));
    }
}
