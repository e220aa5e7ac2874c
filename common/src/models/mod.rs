//! Wire and view models shared by the client and the gateway.

pub mod connection;
pub mod migration;
pub mod pipeline;
pub mod status;

pub use connection::{
    ConnectResponse, ConnectionDetails, ConnectionFields, DbEngine, DefaultConnectionDetails,
    MessageResponse, OracleConnectionDetails, PostgresConnectionDetails,
};
pub use migration::{
    ListObjectsRequest, ListObjectsResponse, MigrationObject, MigrationRequest, ObjectType,
    StartMigrationResponse,
};
pub use pipeline::{aggregate, PipelineEntry, PipelineMap, Stage, StagePlan};
pub use status::{ChildJobStatus, JobStatus, MigrationStatusResponse, StageClass, StageStatus};
