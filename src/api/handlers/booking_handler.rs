//! Timeslot publishing, booking requests and status changes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::{require_staff, CurrentUser};
use crate::api::AppState;
use crate::domain::{AnswerInput, BookingAnswer, BookingResponse, BookingStatus};
use crate::errors::AppResult;
use crate::services::{BookingDetails, BookingQuery, SlotPlan, StatusChangeOutcome};
use crate::types::{Paginated, PaginationParams};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SlotInput {
    #[schema(value_type = String, example = "09:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "10:00")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTimeslotsRequest {
    #[schema(example = 3)]
    pub infrastructure_id: i32,
    #[schema(value_type = String, example = "2026-11-02")]
    pub date: NaiveDate,
    #[validate(length(min = 1, message = "At least one timeslot is required"))]
    pub slots: Vec<SlotInput>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GenerateTimeslotsRequest {
    #[schema(example = 3)]
    pub infrastructure_id: i32,
    #[schema(value_type = String, example = "2026-11-02")]
    pub from_date: NaiveDate,
    #[schema(value_type = String, example = "2026-11-06")]
    pub to_date: NaiveDate,
    #[schema(value_type = String, example = "09:00")]
    pub day_start: NaiveTime,
    #[schema(value_type = String, example = "17:00")]
    pub day_end: NaiveTime,
    #[validate(range(min = 1, max = 1440, message = "Slot length must be 1-1440 minutes"))]
    #[schema(example = 60)]
    pub slot_minutes: u32,
    #[serde(default)]
    pub skip_weekends: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GeneratedTimeslotsResponse {
    pub created: Vec<BookingResponse>,
    /// Planned slots left out because they overlapped existing ones
    pub skipped: usize,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DeleteTimeslotsRequest {
    #[validate(length(min = 1, message = "No timeslot ids given"))]
    pub ids: Vec<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteTimeslotsResponse {
    pub deleted_count: usize,
    pub deleted: Vec<i32>,
    pub not_deleted: Vec<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BookingRequestBody {
    #[schema(example = 42)]
    pub timeslot_id: i32,
    #[validate(length(max = 2000, message = "Purpose is too long"))]
    pub purpose: Option<String>,
    #[serde(default)]
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BookingListQuery {
    pub infrastructure_id: Option<i32>,
    pub status: Option<BookingStatus>,
    #[param(value_type = Option<String>, example = "2026-11-01")]
    pub date_from: Option<NaiveDate>,
    #[param(value_type = Option<String>, example = "2026-11-30")]
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStatusRequest {
    /// `approved`, `rejected` or `canceled`
    pub status: BookingStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusChangeResponse {
    pub booking: BookingResponse,
    pub previous_status: BookingStatus,
    /// Pending requests rejected because they overlapped this approval
    pub auto_rejected_count: usize,
    pub auto_rejected_ids: Vec<i32>,
}

impl From<StatusChangeOutcome> for StatusChangeResponse {
    fn from(outcome: StatusChangeOutcome) -> Self {
        Self {
            auto_rejected_count: outcome.auto_rejected_count(),
            auto_rejected_ids: outcome.auto_rejected.iter().map(|b| b.id).collect(),
            previous_status: outcome.previous_status,
            booking: BookingResponse::from(outcome.booking),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailActionRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingDetailsResponse {
    #[serde(flatten)]
    pub booking: BookingResponse,
    pub answers: Vec<BookingAnswer>,
}

impl From<BookingDetails> for BookingDetailsResponse {
    fn from(details: BookingDetails) -> Self {
        Self {
            booking: BookingResponse::from(details.booking),
            answers: details.answers,
        }
    }
}

/// Emailed approve/reject links work without a session
pub fn public_booking_routes() -> Router<AppState> {
    Router::new().route("/email-action", post(email_action))
}

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_bookings))
        .route("/mine", get(my_bookings))
        .route("/request", post(request_booking))
        .route("/timeslots", post(create_timeslots).delete(delete_timeslots))
        .route("/timeslots/generate", post(generate_timeslots))
        .route("/:id", get(get_booking))
        .route("/:id/status", put(update_status))
}

fn booking_responses(bookings: Vec<crate::domain::Booking>) -> Vec<BookingResponse> {
    bookings.into_iter().map(BookingResponse::from).collect()
}

/// Publish explicit timeslots on one day
#[utoipa::path(
    post,
    path = "/api/bookings/timeslots",
    tag = "Timeslots",
    security(("bearer_auth" = [])),
    request_body = CreateTimeslotsRequest,
    responses(
        (status = 201, description = "Timeslots created", body = [BookingResponse]),
        (status = 400, description = "Invalid window, past date or duration over the limit"),
        (status = 403, description = "Not a manager of this infrastructure"),
        (status = 409, description = "Overlaps an existing timeslot or booking")
    )
)]
pub async fn create_timeslots(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<CreateTimeslotsRequest>,
) -> AppResult<(StatusCode, Json<Vec<BookingResponse>>)> {
    require_staff(&current_user)?;
    let slots = payload
        .slots
        .into_iter()
        .map(|s| (s.start_time, s.end_time))
        .collect();

    let created = state
        .services
        .timeslots()
        .create_timeslots(current_user.actor(), payload.infrastructure_id, payload.date, slots)
        .await?;
    Ok((StatusCode::CREATED, Json(booking_responses(created))))
}

/// Publish evenly sized timeslots over a date range
#[utoipa::path(
    post,
    path = "/api/bookings/timeslots/generate",
    tag = "Timeslots",
    security(("bearer_auth" = [])),
    request_body = GenerateTimeslotsRequest,
    responses(
        (status = 201, description = "Timeslots generated", body = GeneratedTimeslotsResponse),
        (status = 400, description = "Invalid plan"),
        (status = 403, description = "Not a manager of this infrastructure")
    )
)]
pub async fn generate_timeslots(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<GenerateTimeslotsRequest>,
) -> AppResult<(StatusCode, Json<GeneratedTimeslotsResponse>)> {
    require_staff(&current_user)?;
    let plan = SlotPlan {
        from_date: payload.from_date,
        to_date: payload.to_date,
        day_start: payload.day_start,
        day_end: payload.day_end,
        slot_minutes: payload.slot_minutes,
        skip_weekends: payload.skip_weekends,
    };

    let generated = state
        .services
        .timeslots()
        .generate_timeslots(current_user.actor(), payload.infrastructure_id, plan)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(GeneratedTimeslotsResponse {
            created: booking_responses(generated.created),
            skipped: generated.skipped,
        }),
    ))
}

/// Withdraw timeslots that are still available
#[utoipa::path(
    delete,
    path = "/api/bookings/timeslots",
    tag = "Timeslots",
    security(("bearer_auth" = [])),
    request_body = DeleteTimeslotsRequest,
    responses((status = 200, description = "Deletion report", body = DeleteTimeslotsResponse))
)]
pub async fn delete_timeslots(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<DeleteTimeslotsRequest>,
) -> AppResult<Json<DeleteTimeslotsResponse>> {
    require_staff(&current_user)?;
    let outcome = state
        .services
        .timeslots()
        .delete_timeslots(current_user.actor(), payload.ids)
        .await?;
    Ok(Json(DeleteTimeslotsResponse {
        deleted_count: outcome.deleted.len(),
        deleted: outcome.deleted,
        not_deleted: outcome.not_deleted,
    }))
}

/// Claim an available timeslot; the booking starts as pending
#[utoipa::path(
    post,
    path = "/api/bookings/request",
    tag = "Bookings",
    security(("bearer_auth" = [])),
    request_body = BookingRequestBody,
    responses(
        (status = 201, description = "Pending booking created", body = BookingResponse),
        (status = 400, description = "Required questions unanswered"),
        (status = 404, description = "Timeslot not found or no longer available")
    )
)]
pub async fn request_booking(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<BookingRequestBody>,
) -> AppResult<(StatusCode, Json<BookingResponse>)> {
    let booking = state
        .services
        .bookings()
        .request_booking(
            current_user.actor(),
            payload.timeslot_id,
            payload.purpose,
            payload.answers,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(BookingResponse::from(booking))))
}

/// Bookings visible to the caller
#[utoipa::path(
    get,
    path = "/api/bookings",
    tag = "Bookings",
    security(("bearer_auth" = [])),
    params(PaginationParams, BookingListQuery),
    responses((status = 200, description = "Page of bookings", body = BookingPage))
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(params): Query<PaginationParams>,
    Query(query): Query<BookingListQuery>,
) -> AppResult<Json<Paginated<BookingResponse>>> {
    let query = BookingQuery {
        infrastructure_id: query.infrastructure_id,
        status: query.status,
        date_from: query.date_from,
        date_to: query.date_to,
    };
    let (bookings, total) = state
        .services
        .bookings()
        .list_bookings(current_user.actor(), query, params)
        .await?;
    Ok(Json(Paginated::new(bookings, params, total).map(BookingResponse::from)))
}

/// The caller's own bookings
#[utoipa::path(
    get,
    path = "/api/bookings/mine",
    tag = "Bookings",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses((status = 200, description = "Page of bookings", body = BookingPage))
)]
pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<Paginated<BookingResponse>>> {
    let (bookings, total) = state
        .services
        .bookings()
        .my_bookings(current_user.actor(), params)
        .await?;
    Ok(Json(Paginated::new(bookings, params, total).map(BookingResponse::from)))
}

/// A booking with its answers
#[utoipa::path(
    get,
    path = "/api/bookings/{id}",
    tag = "Bookings",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking", body = BookingDetailsResponse),
        (status = 403, description = "Not visible to the caller"),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> AppResult<Json<BookingDetailsResponse>> {
    let details = state
        .services
        .bookings()
        .get_booking(current_user.actor(), id)
        .await?;
    Ok(Json(BookingDetailsResponse::from(details)))
}

/// Approve, reject or cancel a booking
#[utoipa::path(
    put,
    path = "/api/bookings/{id}/status",
    tag = "Bookings",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Booking ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = StatusChangeResponse),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Not allowed to change this booking"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    ValidatedJson(payload): ValidatedJson<UpdateStatusRequest>,
) -> AppResult<Json<StatusChangeResponse>> {
    let outcome = state
        .services
        .bookings()
        .update_status(current_user.actor(), id, payload.status)
        .await?;
    Ok(Json(StatusChangeResponse::from(outcome)))
}

/// Apply an emailed approve/reject link
#[utoipa::path(
    post,
    path = "/api/bookings/email-action",
    tag = "Bookings",
    request_body = EmailActionRequest,
    responses(
        (status = 200, description = "Action applied", body = StatusChangeResponse),
        (status = 400, description = "Invalid, used or expired token, or transition not allowed")
    )
)]
pub async fn email_action(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<EmailActionRequest>,
) -> AppResult<Json<StatusChangeResponse>> {
    let outcome = state
        .services
        .bookings()
        .apply_email_action(payload.token)
        .await?;
    Ok(Json(StatusChangeResponse::from(outcome)))
}
