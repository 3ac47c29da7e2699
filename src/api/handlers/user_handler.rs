//! Profile and admin user management handlers.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get, post, put},
    Extension, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::{require_admin, CurrentUser};
use crate::api::AppState;
use crate::domain::{UserResponse, UserRole};
use crate::errors::{AppError, AppResult};
use crate::types::{MessageResponse, NoContent, Paginated, PaginationParams};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    #[schema(example = "Ada Lovelace")]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailPreferencesRequest {
    pub email_notifications: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(min_length = 8)]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateRoleRequest {
    #[schema(example = "manager")]
    pub role: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserListQuery {
    /// Include soft-deleted accounts
    #[serde(default)]
    pub include_deleted: bool,
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/me", get(get_current_user).put(update_profile))
        .route("/me/email-preferences", put(update_email_preferences))
        .route("/me/password", put(change_password))
        .route("/:id", delete(delete_user))
        .route("/:id/role", put(update_role))
        .route("/:id/restore", post(restore_user))
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<UserResponse>> {
    let user = state.services.users().me(current_user.actor()).await?;
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    put,
    path = "/api/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Validation error")
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<UpdateProfileRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = state
        .services
        .users()
        .update_profile(current_user.actor(), payload.name)
        .await?;
    Ok(Json(UserResponse::from(user)))
}

/// Opt in or out of booking status emails
#[utoipa::path(
    put,
    path = "/api/users/me/email-preferences",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = EmailPreferencesRequest,
    responses((status = 200, description = "Preferences updated", body = UserResponse))
)]
pub async fn update_email_preferences(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<EmailPreferencesRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = state
        .services
        .users()
        .update_email_preferences(current_user.actor(), payload.email_notifications)
        .await?;
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    put,
    path = "/api/users/me/password",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Current password is wrong")
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .services
        .users()
        .change_password(current_user.actor(), payload.current_password, payload.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password changed")))
}

/// List users (admin only)
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(PaginationParams, UserListQuery),
    responses(
        (status = 200, description = "Page of users", body = UserPage),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(params): Query<PaginationParams>,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<Paginated<UserResponse>>> {
    require_admin(&current_user)?;
    let (users, total) = state
        .services
        .users()
        .list_users(current_user.actor(), params, query.include_deleted)
        .await?;
    Ok(Json(Paginated::new(users, params, total).map(UserResponse::from)))
}

/// Change a user's role (admin only)
#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = UserResponse),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_role(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateRoleRequest>,
) -> AppResult<Json<UserResponse>> {
    require_admin(&current_user)?;
    let role = UserRole::parse(&payload.role.to_ascii_lowercase())
        .ok_or_else(|| AppError::validation(format!("Unknown role '{}'", payload.role)))?;

    let user = state
        .services
        .users()
        .set_role(current_user.actor(), id, role)
        .await?;
    Ok(Json(UserResponse::from(user)))
}

/// Soft delete a user (admin only)
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<NoContent> {
    require_admin(&current_user)?;
    state
        .services
        .users()
        .delete_user(current_user.actor(), id)
        .await?;
    Ok(NoContent)
}

/// Restore a soft-deleted user (admin only)
#[utoipa::path(
    post,
    path = "/api/users/{id}/restore",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User restored", body = UserResponse),
        (status = 400, description = "User is not deleted"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn restore_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    require_admin(&current_user)?;
    let user = state
        .services
        .users()
        .restore_user(current_user.actor(), id)
        .await?;
    Ok(Json(UserResponse::from(user)))
}
