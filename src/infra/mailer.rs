//! Outbound email transport used by the email worker.

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;
use crate::errors::{AppError, AppResult};

/// Delivers a rendered message
pub enum EmailSender {
    Smtp {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: Mailbox,
    },
    /// Development fallback when no SMTP host is configured
    Log { from: String },
}

impl EmailSender {
    pub fn from_config(config: &SmtpConfig) -> AppResult<Self> {
        let Some(host) = config.host.as_deref() else {
            tracing::warn!("SMTP not configured - emails will be logged instead of sent");
            return Ok(EmailSender::Log {
                from: config.from.clone(),
            });
        };

        let builder = if config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| AppError::internal(format!("Invalid SMTP relay: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };

        let mut builder = builder.port(config.port);
        if let Some(user) = config.user.clone() {
            let pass = config.password().unwrap_or_default().to_string();
            builder = builder.credentials(Credentials::new(user, pass));
        }

        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| AppError::internal(format!("Invalid SMTP_FROM address: {}", e)))?;

        tracing::info!(host = %host, port = config.port, "SMTP transport configured");

        Ok(EmailSender::Smtp {
            transport: builder.build(),
            from,
        })
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        match self {
            EmailSender::Log { from } => {
                tracing::info!(
                    "=== EMAIL (not sent) ===\n\
                     From: {}\n\
                     To: {}\n\
                     Subject: {}\n\
                     Body:\n{}\n\
                     ========================",
                    from,
                    to,
                    subject,
                    body
                );
                Ok(())
            }
            EmailSender::Smtp { transport, from } => {
                let recipient = to
                    .parse::<Mailbox>()
                    .map_err(|e| AppError::validation(format!("Invalid recipient: {}", e)))?;

                let message = Message::builder()
                    .from(from.clone())
                    .to(recipient)
                    .subject(subject)
                    .header(ContentType::TEXT_PLAIN)
                    .body(body.to_string())
                    .map_err(|e| AppError::internal(format!("Cannot build email: {}", e)))?;

                transport
                    .send(message)
                    .await
                    .map_err(|e| AppError::internal(format!("SMTP delivery failed: {}", e)))?;

                tracing::info!(to = %to, "Email delivered");
                Ok(())
            }
        }
    }
}
