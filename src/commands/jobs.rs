//! Jobs command - Background job management.
//!
//! - `work`: deliver queued email and sweep elapsed bookings periodically
//! - `list`: show queued jobs by status
//! - `clear`: remove failed jobs from the queue
//! - `sweep`: run the maintenance sweep once
//!
//! ## Usage
//!
//! ```bash
//! infra-booking jobs work
//! infra-booking jobs sweep
//! ```

use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};

use crate::cli::args::{JobsAction, JobsArgs};
use crate::config::{Config, JOB_NAME_EMAIL, SWEEP_INTERVAL_SECONDS};
use crate::errors::{AppError, AppResult};
use crate::infra::{Database, Persistence};
use crate::jobs::run_sweep;

/// Execute the jobs command
pub async fn execute(args: JobsArgs, config: Config) -> AppResult<()> {
    match args.action {
        JobsAction::Work => run_worker(&config).await,
        JobsAction::List => list_jobs(&config).await,
        JobsAction::Clear => clear_failed_jobs(&config).await,
        JobsAction::Sweep => sweep_once(&config).await,
    }
}

async fn connect(config: &Config) -> AppResult<Database> {
    tracing::info!("Connecting to database...");
    Database::connect_without_migrations(config)
        .await
        .map_err(|e| AppError::internal(format!("Failed to connect to database: {}", e)))
}

/// Start the email worker
///
/// Uses apalis with PostgreSQL storage for job persistence. The maintenance
/// sweep runs alongside every `SWEEP_INTERVAL_SECONDS`.
async fn run_worker(config: &Config) -> AppResult<()> {
    use apalis::prelude::*;
    use apalis_sql::postgres::PostgresStorage;
    use apalis_sql::sqlx::postgres::PgPoolOptions;

    use crate::infra::EmailSender;
    use crate::jobs::{email_job_handler, EmailJob};

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| AppError::internal(format!("Failed to connect to database: {}", e)))?;

    PostgresStorage::setup(&pool)
        .await
        .map_err(|e| AppError::internal(format!("Failed to setup job storage: {}", e)))?;

    let email_storage: PostgresStorage<EmailJob> = PostgresStorage::new(pool);
    let sender = Arc::new(EmailSender::from_config(&config.smtp)?);

    let worker = WorkerBuilder::new(JOB_NAME_EMAIL)
        .data(sender)
        .backend(email_storage)
        .build_fn(email_job_handler);

    let monitor = Monitor::new().register(worker);
    let persistence = Persistence::from_shared(connect(config).await?.shared_connection());

    tracing::info!("Job worker started. Press Ctrl+C to stop.");

    tokio::select! {
        result = monitor.run() => {
            if let Err(e) = result {
                tracing::error!("Worker error: {}", e);
                return Err(AppError::internal(format!("Worker failed: {}", e)));
            }
        }
        _ = sweep_periodically(&persistence) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping worker...");
        }
    }

    tracing::info!("Job worker stopped.");
    Ok(())
}

async fn sweep_periodically(persistence: &Persistence) {
    let mut ticker = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECONDS));
    loop {
        ticker.tick().await;
        if let Err(e) = run_sweep(persistence).await {
            tracing::error!(error = %e, "Maintenance sweep failed");
        }
    }
}

async fn sweep_once(config: &Config) -> AppResult<()> {
    let persistence = Persistence::from_shared(connect(config).await?.shared_connection());
    let report = run_sweep(&persistence).await?;

    println!("Expired:   {}", report.bookings.expired);
    println!("Completed: {}", report.bookings.completed);
    println!("Tokens:    {} purged", report.purged_tokens);
    Ok(())
}

async fn queue_exists(db: &Database) -> AppResult<bool> {
    let row = db
        .connection()
        .query_one(Statement::from_string(
            DatabaseBackend::Postgres,
            "SELECT EXISTS(SELECT 1 FROM information_schema.schemata WHERE schema_name = 'apalis') as exists",
        ))
        .await?;

    Ok(row
        .and_then(|r| r.try_get::<bool>("", "exists").ok())
        .unwrap_or(false))
}

/// List queued jobs grouped by status
async fn list_jobs(config: &Config) -> AppResult<()> {
    let db = connect(config).await?;

    if !queue_exists(&db).await? {
        println!("Job queue not initialized. Run 'jobs work' or 'serve' first.");
        return Ok(());
    }

    let rows = db
        .connection()
        .query_all(Statement::from_string(
            DatabaseBackend::Postgres,
            "SELECT status::text as status, COUNT(*)::bigint as count FROM apalis.jobs GROUP BY status ORDER BY status",
        ))
        .await?;

    println!("\n=== Job Queue Status ===");
    if rows.is_empty() {
        println!("Queue is empty");
    }
    for row in rows {
        let status = row.try_get::<String>("", "status")?;
        let count = row.try_get::<i64>("", "count")?;
        println!("{:<9} {}", format!("{}:", status), count);
    }
    println!("========================\n");

    Ok(())
}

/// Clear failed jobs from the queue
async fn clear_failed_jobs(config: &Config) -> AppResult<()> {
    let db = connect(config).await?;

    if !queue_exists(&db).await? {
        println!("Job queue not initialized. Nothing to clear.");
        return Ok(());
    }

    let result = db
        .connection()
        .execute(Statement::from_string(
            DatabaseBackend::Postgres,
            "DELETE FROM apalis.jobs WHERE status = 'Failed'",
        ))
        .await?;

    println!("Cleared {} failed job(s) from the queue.", result.rows_affected());
    Ok(())
}
