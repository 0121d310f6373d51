//! taskdesk API Server
//!
//! REST API server for per-user task tracking.
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use taskdesk_api::auth::{
    spawn_revocation_sweeper, InMemoryRevocationStore, PgRevocationStore, RevocationStore,
    TokenCodec,
};
use taskdesk_api::{create_router, state::AppState};
use taskdesk_core::config::{AppConfig, LoggingConfig, RevocationBackend};
use taskdesk_core::{InMemoryStore, PgStore, TaskStore, UserStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "taskdesk_api={level},taskdesk_core={level},audit=info,tower_http=debug",
            level = logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("TASKDESK_CONFIG") {
        Ok(path) => AppConfig::from_file(path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("Invalid configuration")?;
    init_tracing(&config.logging);

    let codec = Arc::new(TokenCodec::from_config(&config.auth)?);

    // Stores
    let pg = match &config.database.url {
        Some(url) => {
            let store = PgStore::connect(url, config.database.pool_size)
                .await
                .context("Failed to connect to PostgreSQL")?;
            store.migrate().await?;
            tracing::info!("Using PostgreSQL user and task stores");
            Some(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; users and tasks are kept in memory");
            None
        }
    };

    let (users, tasks): (Arc<dyn UserStore>, Arc<dyn TaskStore>) = match &pg {
        Some(store) => (store.clone(), store.clone()),
        None => {
            let store = Arc::new(InMemoryStore::new());
            (store.clone(), store)
        }
    };

    let revocations: Arc<dyn RevocationStore> = match (config.auth.revocation_backend, &pg) {
        (RevocationBackend::Postgres, Some(store)) => {
            let revocations = PgRevocationStore::new(store.pool().clone());
            revocations.migrate().await?;
            tracing::info!("Using PostgreSQL revocation store");
            Arc::new(revocations)
        }
        (RevocationBackend::Postgres, None) => {
            anyhow::bail!("postgres revocation backend requires DATABASE_URL")
        }
        (RevocationBackend::Memory, _) => {
            tracing::info!("Using in-memory revocation store (single instance only)");
            Arc::new(InMemoryRevocationStore::new())
        }
    };

    let sweep_interval = Duration::from_secs(config.auth.revocation_sweep_secs.max(1));
    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state
    let state = Arc::new(AppState::new(
        config,
        codec,
        users,
        tasks,
        revocations.clone(),
    )?);

    let metrics = state.metrics.clone();
    let _sweeper = spawn_revocation_sweeper(revocations, sweep_interval, move |remaining| {
        metrics.set_revoked_tokens(remaining);
    });

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("taskdesk API Server starting on http://{}", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
