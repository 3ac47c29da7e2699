//! Authentication handlers.

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::AppState;
use crate::domain::UserResponse;
use crate::errors::AppResult;
use crate::services::TokenResponse;
use crate::types::MessageResponse;

/// User registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
    /// Minimum 8 characters
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "SecurePass123!", min_length = 8)]
    pub password: String,
    #[validate(length(min = 1, message = "Name is required"))]
    #[schema(example = "Ada Lovelace")]
    pub name: String,
}

/// User login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "SecurePass123!")]
    pub password: String,
}

/// Body carrying a single emailed token
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TokenRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

/// Body carrying only an email address
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(min_length = 8)]
    pub new_password: String,
}

/// Create authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-email", post(verify_email))
        .route("/resend-verification", post(resend_verification))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

/// Register a new account; a verification link is emailed
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered, verification pending", body = UserResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "User already exists"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = state
        .services
        .auth()
        .register(payload.email, payload.password, payload.name)
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Login and get JWT token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Email not verified")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let token = state
        .services
        .auth()
        .login(payload.email, payload.password)
        .await?;

    Ok(Json(token))
}

/// Confirm an email address
#[utoipa::path(
    post,
    path = "/api/auth/verify-email",
    tag = "Authentication",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Email verified", body = UserResponse),
        (status = 400, description = "Invalid or expired token")
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<TokenRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = state.services.auth().verify_email(payload.token).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Send a new verification link
#[utoipa::path(
    post,
    path = "/api/auth/resend-verification",
    tag = "Authentication",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Link sent if the account needs one", body = MessageResponse)
    )
)]
pub async fn resend_verification(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.services.auth().resend_verification(payload.email).await?;
    Ok(Json(MessageResponse::new(
        "If the account exists and is unverified, a new link has been sent",
    )))
}

/// Request a password reset link
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    tag = "Authentication",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Always succeeds", body = MessageResponse)
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.services.auth().forgot_password(payload.email).await?;
    Ok(Json(MessageResponse::new(
        "If an account exists for this address, a reset link has been sent",
    )))
}

/// Set a new password using a reset token
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    tag = "Authentication",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid or expired token")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .services
        .auth()
        .reset_password(payload.token, payload.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}
