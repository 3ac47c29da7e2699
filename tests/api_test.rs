//! Router tests.
//!
//! These tests drive the full router with mocked services, without a
//! database connection.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use infra_booking::api::state::RateLimits;
use infra_booking::api::{create_router, AppState};
use infra_booking::domain::{Booking, BookingStatus, BookingType, Infrastructure, User, UserRole};
use infra_booking::errors::AppError;
use infra_booking::infra::{FileStorage, RateLimiter};
use infra_booking::services::{
    AuthService, BookingService, InfrastructureService, MockAuthService,
    MockBookingService, MockInfrastructureService, MockServiceContainer, MockTimeslotService,
    TimeslotService,
};

const STUDENT_TOKEN: &str = "student-token";
/// Signed for an account that has since been soft-deleted
const DELETED_ACCOUNT_TOKEN: &str = "deleted-account-token";

// =============================================================================
// Helpers
// =============================================================================

fn storage() -> FileStorage {
    FileStorage::new(std::env::temp_dir().join("infra-booking-api-test"), 1024 * 1024)
}

fn app(services: MockServiceContainer) -> Router {
    create_router(AppState::new(Arc::new(services), storage()))
}

fn app_with_limits(services: MockServiceContainer, general: u64, auth: u64) -> Router {
    let state = AppState::new(Arc::new(services), storage()).with_rate_limits(RateLimits {
        general: Arc::new(RateLimiter::new(general, 60)),
        auth: Arc::new(RateLimiter::new(auth, 60)),
    });
    create_router(state)
}

/// Auth service resolving `STUDENT_TOKEN` to an active student only
fn student_auth() -> Arc<dyn AuthService> {
    let mut auth = MockAuthService::new();
    auth.expect_authenticate().returning(|token| {
        if token == STUDENT_TOKEN {
            Ok(User {
                id: Uuid::new_v4(),
                email: "ada@uni.edu".to_string(),
                password_hash: String::new(),
                name: "Ada".to_string(),
                role: UserRole::Student,
                email_notifications: true,
                is_verified: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                deleted_at: None,
            })
        } else {
            Err(AppError::Unauthorized)
        }
    });
    Arc::new(auth)
}

fn infrastructure(id: i32) -> Infrastructure {
    Infrastructure {
        id,
        name: "Confocal microscope".to_string(),
        description: None,
        location: None,
        is_active: true,
        max_booking_duration: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn open_slot(id: i32) -> Booking {
    Booking {
        id,
        infrastructure_id: 1,
        booking_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        booking_type: BookingType::Timeslot,
        status: BookingStatus::Available,
        user_email: None,
        purpose: None,
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.7");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Health and documentation
// =============================================================================

#[tokio::test]
async fn test_health_without_database() {
    let response = app(MockServiceContainer::new())
        .oneshot(get("/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "not configured");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let response = app(MockServiceContainer::new())
        .oneshot(get("/api-docs/openapi.json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["paths"]["/api/bookings/request"].is_object());
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_protected_route_requires_token() {
    let response = app(MockServiceContainer::new())
        .oneshot(get("/api/users/me"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let mut services = MockServiceContainer::new();
    services.expect_auth().returning(student_auth);

    let request = Request::builder()
        .uri("/api/bookings/mine")
        .header(header::AUTHORIZATION, "Bearer forged")
        .body(Body::empty())
        .unwrap();
    let response = app(services).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deleted_account_token_is_rejected() {
    let mut services = MockServiceContainer::new();
    services.expect_auth().returning(student_auth);
    services.expect_bookings().never();

    let request = Request::builder()
        .uri("/api/bookings/mine")
        .header(header::AUTHORIZATION, format!("Bearer {}", DELETED_ACCOUNT_TOKEN))
        .body(Body::empty())
        .unwrap();
    let response = app(services).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_students_cannot_publish_timeslots() {
    let mut services = MockServiceContainer::new();
    services.expect_auth().returning(student_auth);
    services.expect_timeslots().never();

    let response = app(services)
        .oneshot(post_json(
            "/api/bookings/timeslots",
            Some(STUDENT_TOKEN),
            serde_json::json!({
                "infrastructure_id": 1,
                "date": "2026-11-02",
                "slots": [{ "start_time": "09:00:00", "end_time": "10:00:00" }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// =============================================================================
// Public routes
// =============================================================================

#[tokio::test]
async fn test_active_infrastructures_are_public() {
    let mut infrastructures = MockInfrastructureService::new();
    infrastructures
        .expect_list_active()
        .times(1)
        .returning(|| Ok(vec![infrastructure(1), infrastructure(2)]));
    let infrastructures: Arc<dyn InfrastructureService> = Arc::new(infrastructures);

    let mut services = MockServiceContainer::new();
    services
        .expect_infrastructures()
        .returning(move || infrastructures.clone());

    let response = app(services)
        .oneshot(get("/api/infrastructures/active"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_available_timeslots_are_public() {
    let mut timeslots = MockTimeslotService::new();
    timeslots
        .expect_available_timeslots()
        .withf(|id| *id == 1)
        .returning(|_| Ok(vec![open_slot(10), open_slot(11)]));
    let timeslots: Arc<dyn TimeslotService> = Arc::new(timeslots);

    let mut services = MockServiceContainer::new();
    services
        .expect_timeslots()
        .returning(move || timeslots.clone());

    let response = app(services)
        .oneshot(get("/api/infrastructures/1/available-timeslots"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body[0]["status"], "available");
    assert_eq!(body[0]["start_time"], "09:00:00");
}

// =============================================================================
// Booking requests
// =============================================================================

#[tokio::test]
async fn test_missing_answers_are_reported_with_question_ids() {
    let mut bookings = MockBookingService::new();
    bookings
        .expect_request_booking()
        .withf(|actor, timeslot_id, _, _| actor.email == "ada@uni.edu" && *timeslot_id == 7)
        .returning(|_, _, _, _| Err(AppError::MissingAnswers(vec![3, 5])));
    let bookings: Arc<dyn BookingService> = Arc::new(bookings);

    let mut services = MockServiceContainer::new();
    services.expect_auth().returning(student_auth);
    services
        .expect_bookings()
        .returning(move || bookings.clone());

    let response = app(services)
        .oneshot(post_json(
            "/api/bookings/request",
            Some(STUDENT_TOKEN),
            serde_json::json!({ "timeslot_id": 7, "answers": [] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "MISSING_ANSWERS");
    assert_eq!(
        body["error"]["details"]["missing_question_ids"],
        serde_json::json!([3, 5])
    );
}

#[tokio::test]
async fn test_claimed_timeslot_is_not_found() {
    let mut bookings = MockBookingService::new();
    bookings
        .expect_request_booking()
        .returning(|_, _, _, _| Err(AppError::TimeslotUnavailable));
    let bookings: Arc<dyn BookingService> = Arc::new(bookings);

    let mut services = MockServiceContainer::new();
    services.expect_auth().returning(student_auth);
    services
        .expect_bookings()
        .returning(move || bookings.clone());

    let response = app(services)
        .oneshot(post_json(
            "/api/bookings/request",
            Some(STUDENT_TOKEN),
            serde_json::json!({ "timeslot_id": 7 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "TIMESLOT_UNAVAILABLE");
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn test_general_rate_limit_returns_429() {
    let mut infrastructures = MockInfrastructureService::new();
    infrastructures
        .expect_list_active()
        .times(1)
        .returning(|| Ok(vec![]));
    let infrastructures: Arc<dyn InfrastructureService> = Arc::new(infrastructures);

    let mut services = MockServiceContainer::new();
    services
        .expect_infrastructures()
        .returning(move || infrastructures.clone());
    let app = app_with_limits(services, 1, 10);

    let first = app
        .clone()
        .oneshot(get("/api/infrastructures/active"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()["x-ratelimit-limit"], "1");
    assert_eq!(first.headers()["x-ratelimit-remaining"], "0");

    let second = app
        .oneshot(get("/api/infrastructures/active"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key(header::RETRY_AFTER));
    let body = json_body(second).await;
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn test_auth_routes_use_their_own_tier() {
    let mut auth = MockAuthService::new();
    auth.expect_forgot_password().times(1).returning(|_| Ok(()));
    let auth: Arc<dyn AuthService> = Arc::new(auth);

    let mut services = MockServiceContainer::new();
    services.expect_auth().returning(move || auth.clone());
    // general tier is exhausted immediately; auth routes must not use it
    let app = app_with_limits(services, 0, 1);

    let body = serde_json::json!({ "email": "ada@uni.edu" });
    let first = app
        .clone()
        .oneshot(post_json("/api/auth/forgot-password", None, body.clone()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(post_json("/api/auth/forgot-password", None, body))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}
