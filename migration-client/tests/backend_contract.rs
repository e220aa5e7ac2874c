//! Client behaviour against an in-process fake of the migration backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use common::errors::AppError;
use common::models::{
    ConnectionFields, DbEngine, JobStatus, MigrationObject, MigrationRequest, ObjectType,
    OracleConnectionDetails, PostgresConnectionDetails,
};
use migration_client::{HttpMigrationApi, MigrationApi, MigrationTracker};

#[derive(Clone, Default)]
struct FakeBackend {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
    statuses: Arc<Mutex<VecDeque<Value>>>,
    status_calls: Arc<AtomicUsize>,
}

impl FakeBackend {
    fn record(&self, path: String, body: Value) {
        self.requests.lock().unwrap().push((path, body));
    }

    fn last_request(&self) -> (String, Value) {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

async fn connect(
    State(fake): State<FakeBackend>,
    Path(engine): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    fake.record(format!("/api/{engine}/connect"), body.clone());
    if body["password"] == "wrong" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Error connecting to Oracle: ORA-01017: invalid username/password; logon denied"})),
        )
            .into_response();
    }
    let mut reply = json!({"message": format!("Connected to {engine}")});
    if engine == "oracle" {
        reply["schemas"] = json!(["HR", "SCOTT"]);
    }
    Json(reply).into_response()
}

async fn test_postgres(State(fake): State<FakeBackend>, Json(body): Json<Value>) -> Json<Value> {
    fake.record("/api/test-postgres-connection".into(), body);
    Json(json!({"message": "Successfully connected to PostgreSQL"}))
}

async fn list_objects(State(fake): State<FakeBackend>, Json(body): Json<Value>) -> Json<Value> {
    fake.record("/api/oracle/list-objects".into(), body.clone());
    let objects = match body["object_type"].as_str() {
        Some("TABLE") => json!(["DEPARTMENTS", "EMPLOYEES"]),
        _ => json!([]),
    };
    Json(json!({ "objects": objects }))
}

async fn start_migration(State(fake): State<FakeBackend>, Json(body): Json<Value>) -> Json<Value> {
    fake.record("/api/migrate".into(), body);
    Json(json!({"job_id": "parent-42", "message": "Migration workflow initiated"}))
}

async fn migration_status(State(fake): State<FakeBackend>, Path(job_id): Path<String>) -> Response {
    fake.status_calls.fetch_add(1, Ordering::SeqCst);
    if job_id != "parent-42" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "Parent migration job not found."})),
        )
            .into_response();
    }
    let mut statuses = fake.statuses.lock().unwrap();
    let reply = if statuses.len() > 1 {
        statuses.pop_front().unwrap()
    } else {
        statuses.front().cloned().unwrap_or(json!({"status": "processing"}))
    };
    Json(reply).into_response()
}

async fn defaults(Path(db_type): Path<String>) -> Json<Value> {
    match db_type.as_str() {
        "oracle" => Json(json!({
            "host": "oracle-xe", "port": 1521, "user": "migrator", "password": "secret",
            "service_name": "FREEPDB1", "sid": "XE"
        })),
        _ => Json(json!([{"detail": "Invalid database type"}, 400])),
    }
}

async fn spawn_backend(fake: FakeBackend) -> String {
    let app = Router::new()
        .route("/api/{engine}/connect", post(connect))
        .route("/api/test-postgres-connection", post(test_postgres))
        .route("/api/oracle/list-objects", post(list_objects))
        .route("/api/migrate", post(start_migration))
        .route("/api/migration/status/{job_id}", get(migration_status))
        .route("/api/default-connection-details/{db_type}", get(defaults))
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: &str) -> HttpMigrationApi {
    HttpMigrationApi::new(base_url, Duration::from_secs(5)).unwrap()
}

fn connection_fields() -> ConnectionFields {
    ConnectionFields {
        host: Some("db.internal".into()),
        user: Some("migrator".into()),
        password: Some("pw".into()),
        service_name: Some("FREEPDB1".into()),
        dbname: Some("appdb".into()),
        database: Some("appdb".into()),
        ..Default::default()
    }
}

fn keys(value: &Value) -> Vec<String> {
    let mut keys: Vec<String> = value.as_object().unwrap().keys().cloned().collect();
    keys.sort();
    keys
}

fn oracle() -> OracleConnectionDetails {
    OracleConnectionDetails {
        host: "oracle-xe".into(),
        port: 1521,
        user: "migrator".into(),
        password: "secret".into(),
        service_name: Some("FREEPDB1".into()),
        sid: None,
    }
}

#[tokio::test]
async fn test_connect_sends_engine_specific_bodies() {
    let fake = FakeBackend::default();
    let api = client(&spawn_backend(fake.clone()).await);

    let expected: [(DbEngine, &str, &[&str]); 6] = [
        (
            DbEngine::Oracle,
            "/api/oracle/connect",
            &["host", "password", "port", "service_name", "user"],
        ),
        (
            DbEngine::MySql,
            "/api/mysql/connect",
            &["database", "host", "password", "port", "user"],
        ),
        (
            DbEngine::SqlServer,
            "/api/sqlserver/connect",
            &["database", "host", "password", "port", "user"],
        ),
        (DbEngine::Teradata, "/api/teradata/connect", &["host", "password", "user"]),
        (
            DbEngine::Db2,
            "/api/db2/connect",
            &["database", "hostname", "port", "protocol", "pwd", "uid"],
        ),
        (
            DbEngine::Postgresql,
            "/api/test-postgres-connection",
            &["dbname", "host", "password", "port", "user"],
        ),
    ];

    for (engine, path, fields) in expected {
        let details = connection_fields().into_details(engine).unwrap();
        let response = api.connect(&details).await.unwrap();
        let (recorded_path, body) = fake.last_request();
        assert_eq!(recorded_path, path, "{engine}");
        assert_eq!(keys(&body), fields, "{engine}");
        if engine == DbEngine::Oracle {
            assert_eq!(response.schemas, Some(vec!["HR".into(), "SCOTT".into()]));
        }
    }
}

#[tokio::test]
async fn test_error_detail_is_surfaced_verbatim() {
    let api = client(&spawn_backend(FakeBackend::default()).await);
    let mut details = oracle();
    details.password = "wrong".into();

    let err = api.connect(&details.into()).await.unwrap_err();
    match err {
        AppError::Backend { status, detail } => {
            assert_eq!(status, 400);
            assert_eq!(
                detail,
                "Error connecting to Oracle: ORA-01017: invalid username/password; logon denied"
            );
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_list_objects_posts_nested_connection() {
    let fake = FakeBackend::default();
    let api = client(&spawn_backend(fake.clone()).await);

    let objects = api
        .list_objects(&oracle(), "HR", ObjectType::Table)
        .await
        .unwrap();
    assert_eq!(objects, vec!["DEPARTMENTS", "EMPLOYEES"]);

    let (_, body) = fake.last_request();
    assert_eq!(body["schema_name"], "HR");
    assert_eq!(body["object_type"], "TABLE");
    assert_eq!(body["connection_details"]["service_name"], "FREEPDB1");

    let none = api
        .list_objects(&oracle(), "HR", ObjectType::Trigger)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_target_connection() {
    let fake = FakeBackend::default();
    let api = client(&spawn_backend(fake.clone()).await);
    let response = api
        .test_target_connection(&PostgresConnectionDetails {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: "postgres".into(),
            dbname: "postgres".into(),
        })
        .await
        .unwrap();
    assert_eq!(
        response.message.as_deref(),
        Some("Successfully connected to PostgreSQL")
    );
    assert_eq!(fake.last_request().1["dbname"], "postgres");
}

#[tokio::test]
async fn test_default_connection_details() {
    let api = client(&spawn_backend(FakeBackend::default()).await);

    let defaults = api
        .default_connection_details(DbEngine::Oracle)
        .await
        .unwrap();
    let mut fields = ConnectionFields::default();
    fields.fill_from(&defaults);
    assert_eq!(fields.service_name.as_deref(), Some("FREEPDB1"));
    assert_eq!(fields.sid, None);

    let err = api
        .default_connection_details(DbEngine::Db2)
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Invalid database type");
}

#[tokio::test]
async fn test_unknown_job_reports_not_found_detail() {
    let api = client(&spawn_backend(FakeBackend::default()).await);
    let err = api.migration_status("nope").await.unwrap_err();
    assert!(matches!(err, AppError::Backend { status: 404, .. }));
    assert_eq!(err.user_message(), "Parent migration job not found.");
}

#[tokio::test]
async fn test_unreachable_backend_is_external_service_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = client(&format!("http://{addr}"));
    assert!(matches!(
        api.health().await,
        Err(AppError::ExternalService(_))
    ));
}

#[tokio::test]
async fn test_tracker_follows_migration_to_completion() {
    let fake = FakeBackend::default();
    fake.statuses.lock().unwrap().extend([
        json!({"job_id": "parent-42", "status": "processing", "child_jobs": []}),
        json!({
            "job_id": "parent-42",
            "status": "processing",
            "child_jobs": [
                {"job_id": "c-1", "object_type": "TABLE", "object_name": "EMPLOYEES",
                 "status": "processing", "extraction_status": "extracted", "conversion_status": "processing"}
            ]
        }),
        json!({
            "job_id": "parent-42",
            "status": "completed",
            "error_message": null,
            "child_jobs": [
                {"job_id": "c-1", "object_type": "TABLE", "object_name": "EMPLOYEES",
                 "status": "completed", "extraction_status": "extracted",
                 "conversion_status": "success", "execution_status": "success",
                 "converted_ddl": "CREATE TABLE employees (id numeric);"},
                {"job_id": "c-2", "object_type": "VIEW", "object_name": "EMP_V",
                 "status": "completed"}
            ]
        }),
    ]);
    let base_url = spawn_backend(fake.clone()).await;
    let api = Arc::new(client(&base_url));
    let tracker = MigrationTracker::new(api, Duration::from_millis(40));

    let request = MigrationRequest {
        source_db_type: DbEngine::Oracle,
        target_db_type: DbEngine::Postgresql,
        source_connection: oracle().into(),
        target_connection: Some(PostgresConnectionDetails {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: "postgres".into(),
            dbname: "postgres".into(),
        }),
        source_schema: "HR".into(),
        target_schema: "postgres".into(),
        selected_objects: vec![
            MigrationObject::new(ObjectType::Table, "EMPLOYEES"),
            MigrationObject::new(ObjectType::View, "EMP_V"),
        ],
        data_migration_enabled: true,
    };

    let handle = tracker.start(request).await.unwrap();
    assert_eq!(handle.job_id(), "parent-42");

    let (_, submitted) = fake.last_request();
    assert_eq!(submitted["source_connection"]["service_name"], "FREEPDB1");
    assert_eq!(submitted["selected_objects"][1]["object_type"], "VIEW");
    assert_eq!(submitted["data_migration_enabled"], true);

    let last = tokio::time::timeout(Duration::from_secs(5), handle.wait_until_settled())
        .await
        .expect("migration did not settle");
    assert_eq!(last.overall_status, JobStatus::Completed);
    assert_eq!(fake.status_calls.load(Ordering::SeqCst), 3);
    let employees = &last.pipeline["TABLE_EMPLOYEES"];
    assert_eq!(employees.execution.as_str(), "success");
    assert_eq!(
        employees.ddl_preview(),
        Some("CREATE TABLE employees (id numeric);")
    );
    assert_eq!(last.pipeline["VIEW_EMP_V"].conversion.as_str(), "pending");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(fake.status_calls.load(Ordering::SeqCst), 3);
}
