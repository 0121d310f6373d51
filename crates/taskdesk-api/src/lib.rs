//! taskdesk API - REST server
//!
//! Per-user task tracking behind stateless bearer-token authentication.
//!
//! Author: hephaex@gmail.com

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{extract::DefaultBodyLimit, routing::get, Json, Router};
use state::AppState;
use std::sync::Arc;
use std::time::Duration;
use taskdesk_core::config::AppConfig;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// OpenAPI document
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::auth::register_handler,
        handlers::auth::login_handler,
        handlers::auth::logout_handler,
        handlers::auth::me_handler,
        handlers::tasks::list_tasks,
        handlers::tasks::get_task,
        handlers::tasks::create_task,
        handlers::tasks::update_task,
        handlers::tasks::update_task_status,
        handlers::tasks::delete_task,
    ),
    components(schemas(
        error::ApiError,
        handlers::health::HealthResponse,
        handlers::health::ReadinessResponse,
        handlers::health::ReadinessChecks,
        handlers::auth::CredentialsRequest,
        handlers::auth::MeResponse,
        handlers::tasks::TaskResponse,
        handlers::tasks::CreateTaskRequest,
        handlers::tasks::UpdateTaskRequest,
        handlers::tasks::StatusUpdateRequest,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and readiness probes"),
        (name = "auth", description = "Registration, login and logout"),
        (name = "tasks", description = "Per-user task management"),
    ),
    info(title = "taskdesk API", description = "Per-user task tracking API")
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_body_size = state.config.server.max_body_size;

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::prometheus_metrics))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api", routes::api_routes(state.clone()))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::metrics_middleware,
        ))
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state)
}

/// Signing secret used by [`create_router_for_testing`]
pub const TEST_JWT_SECRET: &str = "taskdesk-test-signing-secret-0123456789";

/// In-memory application state with a fixed secret and cheap password hashing
pub fn create_state_for_testing() -> prometheus::Result<Arc<AppState>> {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = Some(taskdesk_core::config::Secret::new(TEST_JWT_SECRET));
    config.auth.password_memory_kib = 8192;
    config.auth.password_iterations = 1;
    config.auth.password_parallelism = 1;

    let codec = auth::TokenCodec::new(
        auth::SigningKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        config.auth.issuer.clone(),
        Duration::from_secs(config.auth.token_ttl_secs),
    );

    Ok(Arc::new(AppState::in_memory(config, Arc::new(codec))?))
}

/// Router over [`create_state_for_testing`]
pub fn create_router_for_testing() -> prometheus::Result<Router> {
    Ok(create_router(create_state_for_testing()?))
}
