//! Serve command - Starts the HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use apalis_sql::postgres::PostgresStorage;
use apalis_sql::sqlx::postgres::PgPoolOptions;

use crate::api::state::RateLimits;
use crate::api::{create_router, AppState};
use crate::cli::args::ServeArgs;
use crate::config::{Config, EmailDelivery, RATE_LIMIT_WINDOW_SECONDS};
use crate::errors::{AppError, AppResult};
use crate::infra::{Database, FileStorage, LogNotifier, Notifier, QueueNotifier};
use crate::jobs::EmailJob;

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: Config) -> AppResult<()> {
    tracing::info!("Starting server...");

    let db = Database::connect(&config)
        .await
        .map_err(|e| AppError::internal(format!("Database connection failed: {}", e)))?;
    let db = Arc::new(db);

    let notifier = build_notifier(&config).await?;

    FileStorage::new(config.upload_dir.clone(), config.max_upload_bytes)
        .ensure_root()
        .await?;

    let host = args.host.unwrap_or_else(|| config.server_host.clone());
    let port = args.port.unwrap_or(config.server_port);

    let app_state = AppState::from_config(db, config, notifier);
    tokio::spawn(purge_idle_clients(app_state.rate_limits.clone()));
    let app = create_router(app_state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Server running on http://{}", addr);

    // Peer addresses feed the rate limiter when no proxy header is present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn build_notifier(config: &Config) -> AppResult<Arc<dyn Notifier>> {
    match config.email_delivery {
        EmailDelivery::Log => {
            tracing::warn!("EMAIL_QUEUE=log - outbound email will only be logged");
            Ok(Arc::new(LogNotifier))
        }
        EmailDelivery::Queue => {
            let pool = PgPoolOptions::new()
                .max_connections(2)
                .connect(&config.database_url)
                .await
                .map_err(|e| AppError::internal(format!("Failed to connect job queue: {}", e)))?;

            PostgresStorage::setup(&pool)
                .await
                .map_err(|e| AppError::internal(format!("Failed to setup job storage: {}", e)))?;

            let storage: PostgresStorage<EmailJob> = PostgresStorage::new(pool);
            tracing::info!("Email jobs will be queued for the worker");
            Ok(Arc::new(QueueNotifier::new(storage)))
        }
    }
}

async fn purge_idle_clients(limits: RateLimits) {
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(RATE_LIMIT_WINDOW_SECONDS));
    loop {
        interval.tick().await;
        limits.general.purge_idle();
        limits.auth.purge_idle();
        tracing::trace!(
            general = limits.general.tracked_clients(),
            auth = limits.auth.tracked_clients(),
            "Rate limiter purged"
        );
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Received shutdown signal");
}
