//! Hand-off of outbound email from the API process.
//!
//! The queue notifier persists jobs in the apalis PostgreSQL storage so a
//! separate `jobs work` process delivers them; the log notifier is used in
//! development and tests.

use apalis::prelude::Storage;
use apalis_sql::postgres::PostgresStorage;
use async_trait::async_trait;

use crate::errors::{AppError, AppResult};
use crate::jobs::EmailJob;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Schedule an email for delivery
    async fn notify(&self, email: EmailJob) -> AppResult<()>;
}

/// Pushes email jobs onto the persistent queue
pub struct QueueNotifier {
    storage: PostgresStorage<EmailJob>,
}

impl QueueNotifier {
    pub fn new(storage: PostgresStorage<EmailJob>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl Notifier for QueueNotifier {
    async fn notify(&self, email: EmailJob) -> AppResult<()> {
        let mut storage = self.storage.clone();
        let to = email.to.clone();
        storage
            .push(email)
            .await
            .map_err(|e| AppError::internal(format!("Failed to enqueue email: {}", e)))?;
        tracing::debug!(to = %to, "Email job enqueued");
        Ok(())
    }
}

/// Logs emails instead of sending them
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, email: EmailJob) -> AppResult<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "Email (log delivery)"
        );
        Ok(())
    }
}
