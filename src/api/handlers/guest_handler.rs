//! Unauthenticated guest booking handlers.

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::AppState;
use crate::domain::{AnswerInput, BookingResponse};
use crate::errors::AppResult;
use crate::services::GuestBookingRequest;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GuestBookingBody {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    #[schema(example = "Grace Hopper")]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "grace@example.org")]
    pub email: String,
    #[schema(example = 42)]
    pub timeslot_id: i32,
    #[validate(length(max = 2000, message = "Purpose is too long"))]
    pub purpose: Option<String>,
    #[serde(default)]
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GuestBookingStartedResponse {
    pub message: String,
    pub timeslot_id: i32,
    pub email: String,
    /// The confirmation link stops working after this instant
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GuestConfirmRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

pub fn guest_routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(start_guest_booking))
        .route("/bookings/confirm", post(confirm_guest_booking))
}

/// Submit a guest request; a confirmation link is emailed
#[utoipa::path(
    post,
    path = "/api/guest/bookings",
    tag = "Guest bookings",
    request_body = GuestBookingBody,
    responses(
        (status = 202, description = "Confirmation email sent", body = GuestBookingStartedResponse),
        (status = 400, description = "Validation error or unanswered required questions"),
        (status = 404, description = "Timeslot not found or no longer available")
    )
)]
pub async fn start_guest_booking(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<GuestBookingBody>,
) -> AppResult<(StatusCode, Json<GuestBookingStartedResponse>)> {
    let started = state
        .services
        .guests()
        .start(GuestBookingRequest {
            name: payload.name,
            email: payload.email,
            timeslot_id: payload.timeslot_id,
            purpose: payload.purpose,
            answers: payload.answers,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(GuestBookingStartedResponse {
            message: "Check your inbox to confirm the booking".to_string(),
            timeslot_id: started.timeslot_id,
            email: started.email,
            expires_at: started.expires_at,
        }),
    ))
}

/// Confirm a guest request; the timeslot becomes a pending booking
#[utoipa::path(
    post,
    path = "/api/guest/bookings/confirm",
    tag = "Guest bookings",
    request_body = GuestConfirmRequest,
    responses(
        (status = 201, description = "Pending booking created", body = BookingResponse),
        (status = 400, description = "Invalid, used or expired token"),
        (status = 404, description = "Timeslot no longer available")
    )
)]
pub async fn confirm_guest_booking(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<GuestConfirmRequest>,
) -> AppResult<(StatusCode, Json<BookingResponse>)> {
    let booking = state.services.guests().confirm(payload.token).await?;
    Ok((StatusCode::CREATED, Json(BookingResponse::from(booking))))
}
