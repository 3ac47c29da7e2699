//! Authentication service - accounts, email verification, password resets
//! and JWT issuance.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::notifications::Notifications;
use crate::config::{
    Config, EMAIL_VERIFICATION_TOKEN_HOURS, PASSWORD_RESET_TOKEN_HOURS, SECONDS_PER_HOUR,
    TOKEN_TYPE_BEARER,
};
use crate::domain::{normalize_email, Password, TokenPurpose, User, UserRole};
use crate::errors::{AppError, AppResult};
use crate::infra::{NewToken, UnitOfWork};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// JWT claims payload
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Token response returned after successful authentication
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    /// JWT access token
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    /// Token type (always "Bearer")
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Token expiration time in seconds
    #[schema(example = 86400)]
    pub expires_in: i64,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create an unverified student account and email a verification link
    async fn register(&self, email: String, password: String, name: String) -> AppResult<User>;

    async fn verify_email(&self, token: String) -> AppResult<User>;

    /// Re-send the verification link; silent for unknown or verified addresses
    async fn resend_verification(&self, email: String) -> AppResult<()>;

    /// Login and return JWT token
    async fn login(&self, email: String, password: String) -> AppResult<TokenResponse>;

    /// Email a reset link if the account exists; never reveals whether it does
    async fn forgot_password(&self, email: String) -> AppResult<()>;

    async fn reset_password(&self, token: String, new_password: String) -> AppResult<()>;

    /// Verify JWT token and extract claims
    fn verify_token(&self, token: &str) -> AppResult<Claims>;

    /// Resolve a bearer token to the account as it is stored now, so role
    /// changes and deletions apply before the token expires
    async fn authenticate(&self, token: String) -> AppResult<User>;
}

/// Sign an access token for a user
pub fn issue_access_token(user: &User, config: &Config) -> AppResult<TokenResponse> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(config.jwt_expiration_hours);

    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role.to_string(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret_bytes()),
    )?;

    Ok(TokenResponse {
        access_token: token,
        token_type: TOKEN_TYPE_BEARER.to_string(),
        expires_in: config.jwt_expiration_hours * SECONDS_PER_HOUR,
    })
}

fn verify_token_internal(token: &str, config: &Config) -> AppResult<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

pub struct Authenticator<U: UnitOfWork> {
    uow: Arc<U>,
    config: Config,
    notifications: Arc<Notifications>,
}

impl<U: UnitOfWork> Authenticator<U> {
    pub fn new(uow: Arc<U>, config: Config, notifications: Arc<Notifications>) -> Self {
        Self {
            uow,
            config,
            notifications,
        }
    }

    /// Replace any outstanding token of this purpose with a fresh one.
    async fn reissue(&self, email: &str, purpose: TokenPurpose, hours: i64) -> AppResult<String> {
        self.uow.tokens().revoke_all(email, purpose).await?;
        let token = self
            .uow
            .tokens()
            .issue(NewToken {
                purpose,
                email: email.to_string(),
                booking_id: None,
                payload: None,
                expires_at: Utc::now() + Duration::hours(hours),
            })
            .await?;
        Ok(token.token)
    }
}

#[async_trait]
impl<U: UnitOfWork> AuthService for Authenticator<U> {
    async fn register(&self, email: String, password: String, name: String) -> AppResult<User> {
        let email = normalize_email(&email);
        let name = name.trim().to_string();

        // soft-deleted accounts keep their address reserved
        if self.uow.users().find_by_email_with_deleted(&email).await?.is_some() {
            return Err(AppError::conflict("User"));
        }

        let password_hash = Password::new(&password)?.into_string();
        let (user, token) = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let user = ctx
                        .users()
                        .create(email, password_hash, name, UserRole::Student)
                        .await?;
                    let token = ctx
                        .tokens()
                        .issue(NewToken {
                            purpose: TokenPurpose::EmailVerification,
                            email: user.email.clone(),
                            booking_id: None,
                            payload: None,
                            expires_at: Utc::now() + Duration::hours(EMAIL_VERIFICATION_TOKEN_HOURS),
                        })
                        .await?;
                    Ok((user, token))
                })
            })
            .await?;

        self.notifications
            .email_verification(&user.email, &user.name, &token.token)
            .await;
        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    async fn verify_email(&self, token: String) -> AppResult<User> {
        let user = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let token = ctx
                        .tokens()
                        .find_for_update(&token)
                        .await?
                        .filter(|t| t.is_usable_for(TokenPurpose::EmailVerification, Utc::now()))
                        .ok_or(AppError::InvalidToken)?;
                    if !ctx.tokens().consume(token.id).await? {
                        return Err(AppError::InvalidToken);
                    }

                    let user = ctx
                        .users()
                        .find_by_email(&token.email)
                        .await?
                        .ok_or(AppError::InvalidToken)?;
                    ctx.users().mark_verified(user.id).await
                })
            })
            .await?;

        tracing::info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    async fn resend_verification(&self, email: String) -> AppResult<()> {
        let email = normalize_email(&email);
        let Some(user) = self.uow.users().find_by_email(&email).await? else {
            return Ok(());
        };
        if user.is_verified {
            return Ok(());
        }

        let token = self
            .reissue(&email, TokenPurpose::EmailVerification, EMAIL_VERIFICATION_TOKEN_HOURS)
            .await?;
        self.notifications
            .email_verification(&user.email, &user.name, &token)
            .await;
        Ok(())
    }

    async fn login(&self, email: String, password: String) -> AppResult<TokenResponse> {
        let email = normalize_email(&email);
        let user = self.uow.users().find_by_email(&email).await?;

        // verify even without an account so timing does not reveal which emails exist
        let valid = Password::verify_stored(user.as_ref().map(|u| u.password_hash.as_str()), &password);
        let user = match user {
            Some(user) if valid => user,
            _ => return Err(AppError::InvalidCredentials),
        };

        if !user.is_verified {
            return Err(AppError::EmailNotVerified);
        }

        tracing::debug!(user_id = %user.id, "User logged in");
        issue_access_token(&user, &self.config)
    }

    async fn forgot_password(&self, email: String) -> AppResult<()> {
        let email = normalize_email(&email);
        let Some(user) = self.uow.users().find_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown address");
            return Ok(());
        };

        let token = self
            .reissue(&user.email, TokenPurpose::PasswordReset, PASSWORD_RESET_TOKEN_HOURS)
            .await?;
        self.notifications.password_reset(&user.email, &token).await;
        Ok(())
    }

    async fn reset_password(&self, token: String, new_password: String) -> AppResult<()> {
        let password_hash = Password::new(&new_password)?.into_string();

        let user_id = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let token = ctx
                        .tokens()
                        .find_for_update(&token)
                        .await?
                        .filter(|t| t.is_usable_for(TokenPurpose::PasswordReset, Utc::now()))
                        .ok_or(AppError::InvalidToken)?;
                    if !ctx.tokens().consume(token.id).await? {
                        return Err(AppError::InvalidToken);
                    }

                    let user = ctx
                        .users()
                        .find_by_email(&token.email)
                        .await?
                        .ok_or(AppError::InvalidToken)?;
                    ctx.users().set_password(user.id, password_hash).await?;
                    Ok(user.id)
                })
            })
            .await?;

        tracing::info!(%user_id, "Password reset");
        Ok(())
    }

    fn verify_token(&self, token: &str) -> AppResult<Claims> {
        verify_token_internal(token, &self.config)
    }

    async fn authenticate(&self, token: String) -> AppResult<User> {
        let claims = verify_token_internal(&token, &self.config)?;
        let user = self
            .uow
            .users()
            .find_by_id(claims.sub)
            .await?
            .filter(|u| u.is_verified)
            .ok_or(AppError::Unauthorized)?;

        if user.role.as_str() != claims.role {
            tracing::debug!(user_id = %user.id, role = %user.role, "Token role is stale");
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            password_hash: String::new(),
            name: "Ada".to_string(),
            role: UserRole::Manager,
            email_notifications: true,
            is_verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let config = Config::for_tests();
        let user = user();
        let issued = issue_access_token(&user, &config).unwrap();
        assert_eq!(issued.token_type, "Bearer");
        assert_eq!(issued.expires_in, config.jwt_expiration_hours * SECONDS_PER_HOUR);

        let claims = verify_token_internal(&issued.access_token, &config).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, "manager");
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let config = Config::for_tests();
        let issued = issue_access_token(&user(), &config).unwrap();
        let tampered = format!("{}x", issued.access_token);
        assert!(verify_token_internal(&tampered, &config).is_err());
    }
}
