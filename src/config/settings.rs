//! Application settings loaded from environment variables.

use std::env;

use super::constants::{
    DEFAULT_DATABASE_URL, DEFAULT_FRONTEND_URL, DEFAULT_JWT_EXPIRATION_HOURS,
    DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, DEFAULT_SMTP_FROM,
    DEFAULT_SMTP_PORT, DEFAULT_UPLOAD_DIR, MIN_JWT_SECRET_LENGTH,
};

/// How outbound email is dispatched by the API process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailDelivery {
    /// Push to the persistent job queue, delivered by `jobs work`
    Queue,
    /// Log the message instead of sending (development)
    Log,
}

impl EmailDelivery {
    fn from_env_value(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "log" => EmailDelivery::Log,
            _ => EmailDelivery::Queue,
        }
    }
}

/// SMTP settings used by the email worker
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pass: Option<String>,
    pub from: String,
    pub tls: bool,
}

impl SmtpConfig {
    fn from_env() -> Self {
        Self {
            host: env::var("SMTP_HOST").ok().filter(|h| !h.is_empty()),
            port: env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            user: env::var("SMTP_USER").ok(),
            pass: env::var("SMTP_PASS").ok(),
            from: env::var("SMTP_FROM").unwrap_or_else(|_| DEFAULT_SMTP_FROM.to_string()),
            tls: env::var("SMTP_TLS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }

    /// SMTP delivery is only attempted when a host is configured.
    pub fn is_configured(&self) -> bool {
        self.host.is_some()
    }

    pub fn password(&self) -> Option<&str> {
        self.pass.as_deref()
    }
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub server_host: String,
    pub server_port: u16,
    pub frontend_url: String,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    pub email_delivery: EmailDelivery,
    pub smtp: SmtpConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expiration_hours", &self.jwt_expiration_hours)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("frontend_url", &self.frontend_url)
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("email_delivery", &self.email_delivery)
            .field("smtp_host", &self.smtp.host)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Panics
    /// Panics if JWT_SECRET is not set or is too short (security requirement).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                tracing::warn!("JWT_SECRET not set, using insecure default for development");
                "dev-secret-key-minimum-32-chars!!".to_string()
            } else {
                panic!("JWT_SECRET environment variable must be set in production");
            }
        });

        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            panic!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            jwt_secret,
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_JWT_EXPIRATION_HOURS),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SERVER_PORT),
            frontend_url: env::var("FRONTEND_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string()),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| DEFAULT_UPLOAD_DIR.to_string()),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            email_delivery: env::var("EMAIL_QUEUE")
                .map(|v| EmailDelivery::from_env_value(&v))
                .unwrap_or(EmailDelivery::Queue),
            smtp: SmtpConfig::from_env(),
        }
    }

    /// Configuration for tests and tooling that never touch the environment.
    pub fn for_tests() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            jwt_secret: "test-secret-key-for-testing-only-32chars".to_string(),
            jwt_expiration_hours: DEFAULT_JWT_EXPIRATION_HOURS,
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            upload_dir: std::env::temp_dir()
                .join("infra-booking-test-uploads")
                .to_string_lossy()
                .into_owned(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            email_delivery: EmailDelivery::Log,
            smtp: SmtpConfig {
                host: None,
                port: DEFAULT_SMTP_PORT,
                user: None,
                pass: None,
                from: DEFAULT_SMTP_FROM.to_string(),
                tls: false,
            },
        }
    }

    /// Get JWT secret bytes for token signing/verification.
    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Build an absolute frontend link, e.g. `link("/verify-email", token)`.
    pub fn frontend_link(&self, path: &str, token: &str) -> String {
        format!("{}{}?token={}", self.frontend_url, path, token)
    }
}
