//! Infrastructure, manager assignment and question handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Extension, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::{require_admin, CurrentUser};
use crate::api::AppState;
use crate::domain::{
    BookingResponse, InfrastructureDraft, InfrastructureQuestion, InfrastructureResponse,
    QuestionDraft, QuestionType, UserResponse,
};
use crate::errors::AppResult;
use crate::types::NoContent;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InfrastructureRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    #[schema(example = "Confocal microscope")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "Building B, room 104")]
    pub location: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Longest allowed slot in minutes
    #[validate(range(min = 1, message = "Maximum booking duration must be positive"))]
    #[schema(example = 120)]
    pub max_booking_duration: Option<i32>,
}

fn default_active() -> bool {
    true
}

impl From<InfrastructureRequest> for InfrastructureDraft {
    fn from(r: InfrastructureRequest) -> Self {
        Self {
            name: r.name.trim().to_string(),
            description: r.description,
            location: r.location,
            is_active: r.is_active,
            max_booking_duration: r.max_booking_duration,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignManagerRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct QuestionRequest {
    #[validate(length(min = 1, message = "Question text is required"))]
    #[schema(example = "Which sample type will you image?")]
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub is_required: bool,
    /// Choices for `select` questions
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub display_order: i32,
}

impl From<QuestionRequest> for QuestionDraft {
    fn from(r: QuestionRequest) -> Self {
        Self {
            question_text: r.question_text.trim().to_string(),
            question_type: r.question_type,
            is_required: r.is_required,
            options: r.options,
            display_order: r.display_order,
        }
    }
}

/// Routes reachable without a token
pub fn public_infrastructure_routes() -> Router<AppState> {
    Router::new()
        .route("/active", get(list_active))
        .route("/:id/available-timeslots", get(available_timeslots))
}

pub fn infrastructure_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_infrastructures).post(create_infrastructure))
        .route("/managed", get(list_managed))
        .route(
            "/:id",
            get(get_infrastructure)
                .put(update_infrastructure)
                .delete(delete_infrastructure),
        )
        .route("/:id/toggle-active", post(toggle_active))
        .route("/:id/managers", get(list_managers).post(assign_manager))
        .route("/:id/managers/:user_id", delete(unassign_manager))
        .route("/:id/questions", get(list_questions).post(create_question))
        .route(
            "/:id/questions/:question_id",
            put(update_question).delete(delete_question),
        )
}

fn to_responses(
    items: Vec<crate::domain::Infrastructure>,
) -> Json<Vec<InfrastructureResponse>> {
    Json(items.into_iter().map(InfrastructureResponse::from).collect())
}

/// Active infrastructures (public)
#[utoipa::path(
    get,
    path = "/api/infrastructures/active",
    tag = "Infrastructures",
    responses((status = 200, description = "Active infrastructures", body = [InfrastructureResponse]))
)]
pub async fn list_active(State(state): State<AppState>) -> AppResult<Json<Vec<InfrastructureResponse>>> {
    let items = state.services.infrastructures().list_active().await?;
    Ok(to_responses(items))
}

/// Open timeslots from today on (public)
#[utoipa::path(
    get,
    path = "/api/infrastructures/{id}/available-timeslots",
    tag = "Timeslots",
    params(("id" = i32, Path, description = "Infrastructure ID")),
    responses(
        (status = 200, description = "Available timeslots", body = [BookingResponse]),
        (status = 404, description = "Infrastructure not found")
    )
)]
pub async fn available_timeslots(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<BookingResponse>>> {
    let slots = state.services.timeslots().available_timeslots(id).await?;
    Ok(Json(slots.into_iter().map(BookingResponse::from).collect()))
}

/// All infrastructures for admins, active ones for everybody else
#[utoipa::path(
    get,
    path = "/api/infrastructures",
    tag = "Infrastructures",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Infrastructures", body = [InfrastructureResponse]))
)]
pub async fn list_infrastructures(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<Vec<InfrastructureResponse>>> {
    let items = state
        .services
        .infrastructures()
        .list(current_user.actor())
        .await?;
    Ok(to_responses(items))
}

/// Infrastructures the caller manages
#[utoipa::path(
    get,
    path = "/api/infrastructures/managed",
    tag = "Infrastructures",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Managed infrastructures", body = [InfrastructureResponse]))
)]
pub async fn list_managed(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<Vec<InfrastructureResponse>>> {
    let items = state
        .services
        .infrastructures()
        .managed_by(current_user.actor())
        .await?;
    Ok(to_responses(items))
}

#[utoipa::path(
    get,
    path = "/api/infrastructures/{id}",
    tag = "Infrastructures",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Infrastructure ID")),
    responses(
        (status = 200, description = "Infrastructure", body = InfrastructureResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_infrastructure(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<InfrastructureResponse>> {
    let infrastructure = state.services.infrastructures().get(id).await?;
    Ok(Json(InfrastructureResponse::from(infrastructure)))
}

#[utoipa::path(
    post,
    path = "/api/infrastructures",
    tag = "Infrastructures",
    security(("bearer_auth" = [])),
    request_body = InfrastructureRequest,
    responses(
        (status = 201, description = "Created", body = InfrastructureResponse),
        (status = 403, description = "Admin only")
    )
)]
pub async fn create_infrastructure(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<InfrastructureRequest>,
) -> AppResult<(StatusCode, Json<InfrastructureResponse>)> {
    require_admin(&current_user)?;
    let created = state
        .services
        .infrastructures()
        .create(current_user.actor(), payload.into())
        .await?;
    Ok((StatusCode::CREATED, Json(InfrastructureResponse::from(created))))
}

#[utoipa::path(
    put,
    path = "/api/infrastructures/{id}",
    tag = "Infrastructures",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Infrastructure ID")),
    request_body = InfrastructureRequest,
    responses(
        (status = 200, description = "Updated", body = InfrastructureResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_infrastructure(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    ValidatedJson(payload): ValidatedJson<InfrastructureRequest>,
) -> AppResult<Json<InfrastructureResponse>> {
    require_admin(&current_user)?;
    let updated = state
        .services
        .infrastructures()
        .update(current_user.actor(), id, payload.into())
        .await?;
    Ok(Json(InfrastructureResponse::from(updated)))
}

/// Flip `is_active`
#[utoipa::path(
    post,
    path = "/api/infrastructures/{id}/toggle-active",
    tag = "Infrastructures",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Infrastructure ID")),
    responses((status = 200, description = "Toggled", body = InfrastructureResponse))
)]
pub async fn toggle_active(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> AppResult<Json<InfrastructureResponse>> {
    let updated = state
        .services
        .infrastructures()
        .toggle_active(current_user.actor(), id)
        .await?;
    Ok(Json(InfrastructureResponse::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/infrastructures/{id}",
    tag = "Infrastructures",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Infrastructure ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_infrastructure(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> AppResult<NoContent> {
    state
        .services
        .infrastructures()
        .delete(current_user.actor(), id)
        .await?;
    Ok(NoContent)
}

#[utoipa::path(
    get,
    path = "/api/infrastructures/{id}/managers",
    tag = "Infrastructures",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Infrastructure ID")),
    responses((status = 200, description = "Assigned managers", body = [UserResponse]))
)]
pub async fn list_managers(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<UserResponse>>> {
    let managers = state
        .services
        .infrastructures()
        .managers(current_user.actor(), id)
        .await?;
    Ok(Json(managers.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/infrastructures/{id}/managers",
    tag = "Infrastructures",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Infrastructure ID")),
    request_body = AssignManagerRequest,
    responses(
        (status = 204, description = "Assigned"),
        (status = 400, description = "User cannot manage infrastructures"),
        (status = 404, description = "Infrastructure or user not found")
    )
)]
pub async fn assign_manager(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    ValidatedJson(payload): ValidatedJson<AssignManagerRequest>,
) -> AppResult<NoContent> {
    state
        .services
        .infrastructures()
        .assign_manager(current_user.actor(), id, payload.user_id)
        .await?;
    Ok(NoContent)
}

#[utoipa::path(
    delete,
    path = "/api/infrastructures/{id}/managers/{user_id}",
    tag = "Infrastructures",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Infrastructure ID"),
        ("user_id" = Uuid, Path, description = "Manager user ID")
    ),
    responses(
        (status = 204, description = "Unassigned"),
        (status = 404, description = "Assignment not found")
    )
)]
pub async fn unassign_manager(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path((id, user_id)): Path<(i32, Uuid)>,
) -> AppResult<NoContent> {
    state
        .services
        .infrastructures()
        .unassign_manager(current_user.actor(), id, user_id)
        .await?;
    Ok(NoContent)
}

#[utoipa::path(
    get,
    path = "/api/infrastructures/{id}/questions",
    tag = "Questions",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Infrastructure ID")),
    responses((status = 200, description = "Questions in display order", body = [InfrastructureQuestion]))
)]
pub async fn list_questions(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<InfrastructureQuestion>>> {
    Ok(Json(state.services.infrastructures().questions(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/infrastructures/{id}/questions",
    tag = "Questions",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Infrastructure ID")),
    request_body = QuestionRequest,
    responses(
        (status = 201, description = "Created", body = InfrastructureQuestion),
        (status = 403, description = "Not a manager of this infrastructure")
    )
)]
pub async fn create_question(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    ValidatedJson(payload): ValidatedJson<QuestionRequest>,
) -> AppResult<(StatusCode, Json<InfrastructureQuestion>)> {
    let question = state
        .services
        .infrastructures()
        .create_question(current_user.actor(), id, payload.into())
        .await?;
    Ok((StatusCode::CREATED, Json(question)))
}

#[utoipa::path(
    put,
    path = "/api/infrastructures/{id}/questions/{question_id}",
    tag = "Questions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Infrastructure ID"),
        ("question_id" = i32, Path, description = "Question ID")
    ),
    request_body = QuestionRequest,
    responses(
        (status = 200, description = "Updated", body = InfrastructureQuestion),
        (status = 404, description = "Question not found on this infrastructure")
    )
)]
pub async fn update_question(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path((id, question_id)): Path<(i32, i32)>,
    ValidatedJson(payload): ValidatedJson<QuestionRequest>,
) -> AppResult<Json<InfrastructureQuestion>> {
    let question = state
        .services
        .infrastructures()
        .update_question(current_user.actor(), id, question_id, payload.into())
        .await?;
    Ok(Json(question))
}

#[utoipa::path(
    delete,
    path = "/api/infrastructures/{id}/questions/{question_id}",
    tag = "Questions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Infrastructure ID"),
        ("question_id" = i32, Path, description = "Question ID")
    ),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_question(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path((id, question_id)): Path<(i32, i32)>,
) -> AppResult<NoContent> {
    state
        .services
        .infrastructures()
        .delete_question(current_user.actor(), id, question_id)
        .await?;
    Ok(NoContent)
}
