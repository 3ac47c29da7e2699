//! Guest bookings - unauthenticated requests confirmed by an emailed link.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::access::load_infrastructure;
use super::booking_service::notify_managers;
use super::booking_workflow::{claim_timeslot_in, BookingRequest};
use super::notifications::Notifications;
use crate::config::GUEST_BOOKING_TOKEN_HOURS;
use crate::domain::{
    ensure_required_answers, normalize_email, AnswerInput, Booking, TokenPurpose,
};
use crate::errors::{AppError, AppResult};
use crate::infra::{NewToken, UnitOfWork};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// What a guest submits; stored as the confirmation token payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestBookingRequest {
    pub name: String,
    pub email: String,
    pub timeslot_id: i32,
    pub purpose: Option<String>,
    #[serde(default)]
    pub answers: Vec<AnswerInput>,
}

/// Returned once the confirmation email is on its way
#[derive(Debug, Clone)]
pub struct GuestBookingStarted {
    pub timeslot_id: i32,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait GuestBookingService: Send + Sync {
    /// Validate the request and email a confirmation link
    async fn start(&self, request: GuestBookingRequest) -> AppResult<GuestBookingStarted>;

    /// Claim the timeslot using a confirmation token
    async fn confirm(&self, token: String) -> AppResult<Booking>;
}

pub struct GuestBookingManager<U: UnitOfWork> {
    uow: Arc<U>,
    notifications: Arc<Notifications>,
}

impl<U: UnitOfWork> GuestBookingManager<U> {
    pub fn new(uow: Arc<U>, notifications: Arc<Notifications>) -> Self {
        Self { uow, notifications }
    }
}

fn normalize_request(mut request: GuestBookingRequest) -> AppResult<GuestBookingRequest> {
    request.name = request.name.trim().to_string();
    request.email = normalize_email(&request.email);
    request.purpose = request.purpose.filter(|p| !p.trim().is_empty());

    if request.name.is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    if !request.email.contains('@') || request.email.starts_with('@') || request.email.ends_with('@') {
        return Err(AppError::validation("Invalid email format"));
    }
    Ok(request)
}

#[async_trait]
impl<U: UnitOfWork> GuestBookingService for GuestBookingManager<U> {
    async fn start(&self, request: GuestBookingRequest) -> AppResult<GuestBookingStarted> {
        let request = normalize_request(request)?;

        let slot = self
            .uow
            .bookings()
            .find_by_id(request.timeslot_id)
            .await?
            .ok_or(AppError::TimeslotUnavailable)?;
        slot.ensure_claimable()?;

        let questions = self.uow.questions().list_for(slot.infrastructure_id).await?;
        ensure_required_answers(&questions, &request.answers)?;
        let infrastructure = load_infrastructure(self.uow.as_ref(), slot.infrastructure_id).await?;

        let payload = serde_json::to_string(&request)
            .map_err(|e| AppError::internal(format!("Failed to encode guest request: {}", e)))?;
        let token = self
            .uow
            .tokens()
            .issue(NewToken {
                purpose: TokenPurpose::GuestBooking,
                email: request.email.clone(),
                booking_id: Some(slot.id),
                payload: Some(payload),
                expires_at: Utc::now() + Duration::hours(GUEST_BOOKING_TOKEN_HOURS),
            })
            .await?;

        self.notifications
            .guest_confirmation(&request.email, &request.name, &token.token, &slot, &infrastructure)
            .await;

        tracing::info!(timeslot_id = slot.id, guest = %request.email, "Guest booking started");
        Ok(GuestBookingStarted {
            timeslot_id: slot.id,
            email: request.email,
            expires_at: token.expires_at,
        })
    }

    async fn confirm(&self, token: String) -> AppResult<Booking> {
        let outcome = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let token = ctx
                        .tokens()
                        .find_for_update(&token)
                        .await?
                        .filter(|t| t.is_usable_for(TokenPurpose::GuestBooking, Utc::now()))
                        .ok_or(AppError::InvalidToken)?;
                    let request: GuestBookingRequest = token
                        .payload
                        .as_deref()
                        .and_then(|p| serde_json::from_str(p).ok())
                        .ok_or(AppError::InvalidToken)?;

                    if !ctx.tokens().consume(token.id).await? {
                        return Err(AppError::InvalidToken);
                    }

                    claim_timeslot_in(
                        &ctx,
                        BookingRequest {
                            timeslot_id: request.timeslot_id,
                            user_email: request.email,
                            purpose: request.purpose,
                            answers: request.answers,
                            skip_question_validation: true,
                        },
                    )
                    .await
                })
            })
            .await?;

        notify_managers(self.uow.as_ref(), &self.notifications, &outcome).await;
        tracing::info!(booking_id = outcome.booking.id, "Guest booking confirmed");
        Ok(outcome.booking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};

    use crate::config::Config;
    use crate::domain::{BookingStatus, BookingType};
    use crate::infra::repositories::entities::{
        auth_token, booking, infrastructure, infrastructure_manager, question,
    };
    use crate::infra::{LogNotifier, Persistence};

    fn request(name: &str, email: &str) -> GuestBookingRequest {
        GuestBookingRequest {
            name: name.to_string(),
            email: email.to_string(),
            timeslot_id: 7,
            purpose: Some("  ".to_string()),
            answers: vec![],
        }
    }

    #[test]
    fn test_request_is_normalized() {
        let normalized = normalize_request(request(" Grace ", " Grace@Example.ORG ")).unwrap();
        assert_eq!(normalized.name, "Grace");
        assert_eq!(normalized.email, "grace@example.org");
        assert_eq!(normalized.purpose, None);
    }

    #[test]
    fn test_request_requires_name_and_email() {
        assert!(normalize_request(request("", "a@b.org")).is_err());
        assert!(normalize_request(request("Grace", "not-an-email")).is_err());
        assert!(normalize_request(request("Grace", "@b.org")).is_err());
    }

    #[test]
    fn test_payload_survives_storage() {
        let original = normalize_request(request("Grace", "grace@example.org")).unwrap();
        let stored = serde_json::to_string(&original).unwrap();
        let restored: GuestBookingRequest = serde_json::from_str(&stored).unwrap();
        assert_eq!(restored, original);
    }

    fn guest_token(used: bool, expires_in: Duration) -> auth_token::Model {
        let request = GuestBookingRequest {
            name: "Grace".to_string(),
            email: "grace@example.org".to_string(),
            timeslot_id: 7,
            purpose: Some("Imaging".to_string()),
            answers: vec![],
        };
        auth_token::Model {
            id: 40,
            token: "guest-token".to_string(),
            purpose: TokenPurpose::GuestBooking.as_str().to_string(),
            email: request.email.clone(),
            booking_id: Some(7),
            payload: Some(serde_json::to_string(&request).unwrap()),
            expires_at: Utc::now() + expires_in,
            used_at: used.then(Utc::now),
            created_at: Utc::now(),
        }
    }

    fn slot(status: BookingStatus) -> booking::Model {
        let booking_type = if status == BookingStatus::Available {
            BookingType::Timeslot
        } else {
            BookingType::Booking
        };
        booking::Model {
            id: 7,
            infrastructure_id: 1,
            booking_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            booking_type: booking_type.as_str().to_string(),
            status: status.as_str().to_string(),
            user_email: None,
            purpose: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn required_question() -> question::Model {
        question::Model {
            id: 3,
            infrastructure_id: 1,
            question_text: "Sample type".to_string(),
            question_type: "text".to_string(),
            is_required: true,
            options: None,
            display_order: 0,
        }
    }

    fn microscope() -> infrastructure::Model {
        infrastructure::Model {
            id: 1,
            name: "Confocal microscope".to_string(),
            description: None,
            location: None,
            is_active: true,
            max_booking_duration: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn executed(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    async fn confirm_with(db: DatabaseConnection) -> (AppResult<Booking>, String) {
        let db = Arc::new(db);
        let notifications = Arc::new(Notifications::new(Arc::new(LogNotifier), Config::for_tests()));
        let manager =
            GuestBookingManager::new(Arc::new(Persistence::from_shared(db.clone())), notifications);

        let result = manager.confirm("guest-token".to_string()).await;

        drop(manager);
        let db = Arc::try_unwrap(db).unwrap_or_else(|_| panic!("connection still shared"));
        (result, format!("{:?}", db.into_transaction_log()))
    }

    #[tokio::test]
    async fn test_confirm_claims_slot_without_revalidating_answers() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![guest_token(false, Duration::hours(1))]])
            .append_query_results([vec![slot(BookingStatus::Available)]])
            .append_query_results([vec![required_question()]])
            .append_query_results([vec![microscope()]])
            .append_query_results([Vec::<infrastructure_manager::Model>::new()])
            .append_exec_results([executed(1), executed(1)])
            .into_connection();

        let (result, log) = confirm_with(db).await;

        let booking = result.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.user_email.as_deref(), Some("grace@example.org"));
        assert!(log.contains(r#"UPDATE \"auth_tokens\""#));
        assert!(log.contains(r#"UPDATE \"bookings\""#));
        assert!(log.contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_confirm_with_used_token_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![guest_token(true, Duration::hours(1))]])
            .into_connection();

        let (result, log) = confirm_with(db).await;

        assert!(matches!(result, Err(AppError::InvalidToken)));
        assert!(!log.contains(r#"UPDATE \"auth_tokens\""#));
        assert!(log.contains("ROLLBACK"));
    }

    #[tokio::test]
    async fn test_confirm_with_expired_token_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![guest_token(false, Duration::hours(-1))]])
            .into_connection();

        let (result, _) = confirm_with(db).await;

        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_confirm_after_slot_was_taken_rolls_back_token() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![guest_token(false, Duration::hours(1))]])
            .append_query_results([vec![slot(BookingStatus::Pending)]])
            .append_exec_results([executed(1)])
            .into_connection();

        let (result, log) = confirm_with(db).await;

        assert!(matches!(result, Err(AppError::TimeslotUnavailable)));
        assert!(log.contains(r#"UPDATE \"auth_tokens\""#));
        assert!(!log.contains(r#"UPDATE \"bookings\""#));
        assert!(log.contains("ROLLBACK"));
        assert!(!log.contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_confirm_loses_race_for_token() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![guest_token(false, Duration::hours(1))]])
            .append_exec_results([executed(0)])
            .into_connection();

        let (result, log) = confirm_with(db).await;

        assert!(matches!(result, Err(AppError::InvalidToken)));
        assert!(!log.contains(r#"UPDATE \"bookings\""#));
    }
}
