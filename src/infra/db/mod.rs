//! Postgres connection handle and schema migrations.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

use crate::config::{Config, DB_CONNECT_TIMEOUT_SECONDS, DB_MAX_CONNECTIONS};

pub mod migrations;

pub use migrations::Migrator;

/// A known migration and whether the database has applied it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationState {
    pub name: String,
    pub applied: bool,
}

/// Shared connection pool
#[derive(Clone)]
pub struct Database {
    connection: Arc<DatabaseConnection>,
}

impl Database {
    /// Connect and bring the schema up to date before serving.
    pub async fn connect(config: &Config) -> Result<Self, DbErr> {
        let db = Self::connect_without_migrations(config).await?;

        let pending = Migrator::get_pending_migrations(db.connection.as_ref()).await?.len();
        if pending > 0 {
            tracing::info!(pending, "Applying schema migrations");
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Schema migration failed");
                e
            })?;
        }

        tracing::info!("Database ready");
        Ok(db)
    }

    /// Connect only; `migrate` drives the schema itself.
    pub async fn connect_without_migrations(config: &Config) -> Result<Self, DbErr> {
        let mut options = ConnectOptions::new(config.database_url.clone());
        options
            .max_connections(DB_MAX_CONNECTIONS)
            .connect_timeout(Duration::from_secs(DB_CONNECT_TIMEOUT_SECONDS));

        let connection = SeaDatabase::connect(options).await?;
        Ok(Self {
            connection: Arc::new(connection),
        })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    /// Shared handle for repositories and the Unit of Work
    pub fn shared_connection(&self) -> Arc<DatabaseConnection> {
        Arc::clone(&self.connection)
    }

    pub async fn run_migrations(&self) -> Result<(), DbErr> {
        Migrator::up(self.connection.as_ref(), None).await
    }

    /// Revert the most recent migration.
    pub async fn rollback_migration(&self) -> Result<(), DbErr> {
        Migrator::down(self.connection.as_ref(), Some(1)).await
    }

    /// Every migration in declaration order with its applied flag.
    pub async fn migration_status(&self) -> Result<Vec<MigrationState>, DbErr> {
        let applied: HashSet<String> = Migrator::get_applied_migrations(self.connection.as_ref())
            .await?
            .iter()
            .map(|m| m.name().to_string())
            .collect();

        Ok(Migrator::migrations()
            .iter()
            .map(|m| MigrationState {
                name: m.name().to_string(),
                applied: applied.contains(m.name()),
            })
            .collect())
    }

    /// Drop every table and re-run all migrations.
    pub async fn fresh_migrations(&self) -> Result<(), DbErr> {
        Migrator::fresh(self.connection.as_ref()).await
    }

    pub async fn ping(&self) -> Result<(), DbErr> {
        self.connection.ping().await
    }
}
