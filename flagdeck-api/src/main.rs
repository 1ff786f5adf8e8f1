//! # Flagdeck API Server
//!
//! Serves the Flagdeck REST API: users, projects and per-environment
//! feature flags behind bearer token authentication.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/flagdeck JWT_SECRET=... cargo run -p flagdeck-api
//! ```
//!
//! Set `DATABASE_URL=memory://` to run against the in-memory store.

use flagdeck_api::{
    app::{build_router, AppState},
    config::{Config, LogFormat},
};
use flagdeck_shared::{
    db::{
        migrations::run_migrations,
        pool::{self, close_pool, create_pool},
    },
    store::{memory::MemoryDatabase, postgres::PgDatabase, Database},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    tracing::info!(
        "Flagdeck API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let mut pg_pool = None;
    let db: Arc<dyn Database> = if config.database.is_memory() {
        tracing::warn!("Using in-memory store; data is lost on exit");
        Arc::new(MemoryDatabase::new())
    } else {
        let pool = create_pool(pool::DatabaseConfig {
            url: config.database.url.clone(),
            max_connections: config.database.max_connections,
            ..Default::default()
        })
        .await?;
        run_migrations(&pool).await?;
        pg_pool = Some(pool.clone());
        Arc::new(PgDatabase::new(pool))
    };

    let bind_address = config.bind_address();
    let app = build_router(AppState::new(db, config));

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pg_pool {
        close_pool(pool).await;
    }
    tracing::info!("Server stopped");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "flagdeck_api=debug,flagdeck_shared=debug,tower_http=debug".into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
