//! Migration gateway
//!
//! Single HTTP entry point in front of the migration backend:
//! - starts migrations and tracks their progress server side
//! - forwards every other `/api/*` call to the backend unchanged
//! - request logging with request ids

mod proxy;
mod registry;
mod routes;
mod state;
mod workflows;

use anyhow::Context;
use axum::{middleware, routing::get, Json, Router};
use common::config::{load_dotenv, AppConfig, PollSettings, ServiceUrls};
use common::middleware::request_id::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "gateway";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Database Migration Gateway API",
        version = "0.1.0",
        description = "Tracks migrations and fronts the migration backend"
    ),
    paths(
        routes::health_check,
        routes::aggregated_health,
        workflows::start_workflow,
        workflows::list_workflows,
        workflows::get_workflow,
        workflows::delete_workflow,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::AggregatedHealth,
        routes::ServiceHealth,
        workflows::WorkflowSummary,
        migration_client::TrackerSnapshot,
        migration_client::MigrationSummary,
        common::models::MigrationRequest,
        common::models::PipelineEntry,
    )),
    tags(
        (name = "health", description = "Health checks"),
        (name = "workflows", description = "Tracked migrations")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::load_with_service(SERVICE_NAME);
    let service_urls = ServiceUrls::load();
    let poll = PollSettings::load();
    info!(
        backend = %service_urls.migration_api,
        poll_interval = ?poll.interval,
        "gateway configuration loaded"
    );

    let state = AppState::new(config.clone(), service_urls, poll)?;
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!(service = SERVICE_NAME, address = %addr, "starting gateway");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .merge(workflows::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .fallback(proxy::forward)
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
