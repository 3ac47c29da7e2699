//! Email background job.
//!
//! The API process enqueues `EmailJob`s; the `jobs work` process delivers
//! them through SMTP, or logs them when no SMTP host is configured.

use apalis::prelude::Data;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::AppError;
use crate::infra::EmailSender;

/// Email job payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    /// Recipient email address
    pub to: String,
    /// Email subject line
    pub subject: String,
    /// Plain text body
    pub body: String,
}

impl EmailJob {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Email job handler - processes email sending jobs
pub async fn email_job_handler(job: EmailJob, sender: Data<Arc<EmailSender>>) -> Result<(), AppError> {
    tracing::info!(to = %job.to, subject = %job.subject, "Processing email job");

    sender.send(&job.to, &job.subject, &job.body).await.map_err(|e| {
        tracing::error!(to = %job.to, error = %e, "Email job failed");
        e
    })
}
