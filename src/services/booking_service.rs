//! Booking service - booking requests, status changes and listings.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;

use super::booking_workflow::{
    apply_status_change_in, process_booking_request, update_booking_status, BookingRequest,
    BookingRequestOutcome, StatusChangeOutcome,
};
use super::notifications::Notifications;
use crate::config::BOOKING_ACTION_TOKEN_HOURS;
use crate::domain::{
    normalize_email, Actor, AnswerInput, Booking, BookingActionPayload, BookingAnswer,
    BookingStatus, BookingType, TokenPurpose,
};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::{BookingFilter, NewToken, UnitOfWork};
use crate::types::PaginationParams;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// A booking with the answers submitted for it
#[derive(Debug, Clone)]
pub struct BookingDetails {
    pub booking: Booking,
    pub answers: Vec<BookingAnswer>,
}

/// Filters accepted by the booking listing
#[derive(Debug, Clone, Default)]
pub struct BookingQuery {
    pub infrastructure_id: Option<i32>,
    pub status: Option<BookingStatus>,
    pub date_from: Option<chrono::NaiveDate>,
    pub date_to: Option<chrono::NaiveDate>,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait BookingService: Send + Sync {
    /// Claim an available timeslot as a pending booking
    async fn request_booking(
        &self,
        actor: Actor,
        timeslot_id: i32,
        purpose: Option<String>,
        answers: Vec<AnswerInput>,
    ) -> AppResult<Booking>;

    /// Approve, reject or cancel
    async fn update_status(
        &self,
        actor: Actor,
        booking_id: i32,
        status: BookingStatus,
    ) -> AppResult<StatusChangeOutcome>;

    /// Apply an emailed approve/reject link
    async fn apply_email_action(&self, token: String) -> AppResult<StatusChangeOutcome>;

    /// Bookings visible to the actor: all for admins, managed
    /// infrastructures for managers, own bookings otherwise
    async fn list_bookings(
        &self,
        actor: Actor,
        query: BookingQuery,
        params: PaginationParams,
    ) -> AppResult<(Vec<Booking>, u64)>;

    async fn my_bookings(
        &self,
        actor: Actor,
        params: PaginationParams,
    ) -> AppResult<(Vec<Booking>, u64)>;

    async fn get_booking(&self, actor: Actor, id: i32) -> AppResult<BookingDetails>;
}

pub struct BookingManager<U: UnitOfWork> {
    uow: Arc<U>,
    notifications: Arc<Notifications>,
}

impl<U: UnitOfWork> BookingManager<U> {
    pub fn new(uow: Arc<U>, notifications: Arc<Notifications>) -> Self {
        Self { uow, notifications }
    }

    async fn can_view(&self, actor: &Actor, booking: &Booking) -> AppResult<bool> {
        if actor.is_admin() || booking.is_owned_by(&actor.email) {
            return Ok(true);
        }
        if actor.role.can_manage_infrastructure() {
            return self
                .uow
                .infrastructures()
                .is_manager(booking.infrastructure_id, actor.id)
                .await;
        }
        Ok(false)
    }
}

#[async_trait]
impl<U: UnitOfWork> BookingService for BookingManager<U> {
    async fn request_booking(
        &self,
        actor: Actor,
        timeslot_id: i32,
        purpose: Option<String>,
        answers: Vec<AnswerInput>,
    ) -> AppResult<Booking> {
        let outcome = process_booking_request(
            self.uow.as_ref(),
            BookingRequest {
                timeslot_id,
                user_email: normalize_email(&actor.email),
                purpose: purpose.filter(|p| !p.trim().is_empty()),
                answers,
                skip_question_validation: false,
            },
        )
        .await?;

        notify_managers(self.uow.as_ref(), &self.notifications, &outcome).await;
        Ok(outcome.booking)
    }

    async fn update_status(
        &self,
        actor: Actor,
        booking_id: i32,
        status: BookingStatus,
    ) -> AppResult<StatusChangeOutcome> {
        let outcome = update_booking_status(self.uow.as_ref(), booking_id, status, actor).await?;
        notify_status_change(self.uow.as_ref(), &self.notifications, &outcome).await;
        Ok(outcome)
    }

    async fn apply_email_action(&self, token: String) -> AppResult<StatusChangeOutcome> {
        let stored = self
            .uow
            .tokens()
            .find(&token)
            .await?
            .ok_or(AppError::InvalidToken)?;
        let manager = self
            .uow
            .users()
            .find_by_email(&stored.email)
            .await?
            .ok_or(AppError::InvalidToken)?;
        let actor = Actor::from(&manager);

        let outcome = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let token = ctx
                        .tokens()
                        .find_for_update(&token)
                        .await?
                        .filter(|t| t.is_usable_for(TokenPurpose::BookingAction, Utc::now()))
                        .ok_or(AppError::InvalidToken)?;
                    let booking_id = token.booking_id.ok_or(AppError::InvalidToken)?;
                    let payload: BookingActionPayload = token
                        .payload
                        .as_deref()
                        .and_then(|p| serde_json::from_str(p).ok())
                        .ok_or(AppError::InvalidToken)?;

                    if !ctx.tokens().consume(token.id).await? {
                        return Err(AppError::InvalidToken);
                    }
                    apply_status_change_in(&ctx, booking_id, payload.action, &actor).await
                })
            })
            .await?;

        notify_status_change(self.uow.as_ref(), &self.notifications, &outcome).await;
        Ok(outcome)
    }

    async fn list_bookings(
        &self,
        actor: Actor,
        query: BookingQuery,
        params: PaginationParams,
    ) -> AppResult<(Vec<Booking>, u64)> {
        let mut filter = BookingFilter {
            infrastructure_id: query.infrastructure_id,
            status: query.status,
            date_from: query.date_from,
            date_to: query.date_to,
            booking_type: Some(BookingType::Booking),
            ..Default::default()
        };

        if !actor.is_admin() {
            if actor.role.can_manage_infrastructure() {
                let managed = self.uow.infrastructures().managed_by(actor.id).await?;
                if managed.is_empty() {
                    return Ok((Vec::new(), 0));
                }
                filter.infrastructure_ids = Some(managed);
            } else {
                filter.user_email = Some(normalize_email(&actor.email));
            }
        }

        self.uow.bookings().list(filter, params).await
    }

    async fn my_bookings(
        &self,
        actor: Actor,
        params: PaginationParams,
    ) -> AppResult<(Vec<Booking>, u64)> {
        let filter = BookingFilter {
            user_email: Some(normalize_email(&actor.email)),
            booking_type: Some(BookingType::Booking),
            ..Default::default()
        };
        self.uow.bookings().list(filter, params).await
    }

    async fn get_booking(&self, actor: Actor, id: i32) -> AppResult<BookingDetails> {
        let booking = self.uow.bookings().find_by_id(id).await?.ok_or_not_found()?;
        if !self.can_view(&actor, &booking).await? {
            return Err(AppError::Forbidden);
        }
        let answers = self.uow.questions().answers_for(id).await?;
        Ok(BookingDetails { booking, answers })
    }
}

/// Email every manager who wants notifications, with single-use approve
/// and reject links. Failures are logged.
pub(crate) async fn notify_managers<U: UnitOfWork>(
    uow: &U,
    notifications: &Notifications,
    outcome: &BookingRequestOutcome,
) {
    let expires_at = Utc::now() + Duration::hours(BOOKING_ACTION_TOKEN_HOURS);
    let token_store = uow.tokens();

    for manager in outcome.managers.iter().filter(|m| m.wants_notifications()) {
        let issue = |action: BookingStatus| {
            let payload = serde_json::to_string(&BookingActionPayload { action }).ok();
            token_store.issue(NewToken {
                purpose: TokenPurpose::BookingAction,
                email: manager.email.clone(),
                booking_id: Some(outcome.booking.id),
                payload,
                expires_at,
            })
        };

        let tokens = match (issue(BookingStatus::Approved).await, issue(BookingStatus::Rejected).await) {
            (Ok(approve), Ok(reject)) => (approve, reject),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(
                    manager = %manager.email,
                    booking_id = outcome.booking.id,
                    error = %e,
                    "Could not issue booking action links"
                );
                continue;
            }
        };

        notifications
            .booking_requested(
                &manager.email,
                &outcome.booking,
                &outcome.infrastructure,
                &tokens.0.token,
                &tokens.1.token,
            )
            .await;
    }
}

/// Tell the owner, and every owner whose request was auto-rejected.
/// Registered users are skipped when they opted out of notifications.
pub(crate) async fn notify_status_change<U: UnitOfWork>(
    uow: &U,
    notifications: &Notifications,
    outcome: &StatusChangeOutcome,
) {
    let affected = std::iter::once((&outcome.booking, false))
        .chain(outcome.auto_rejected.iter().map(|b| (b, true)));

    for (booking, auto_rejected) in affected {
        let Some(owner) = booking.user_email.as_deref() else {
            continue;
        };
        let wants_email = match uow.users().find_by_email(owner).await {
            Ok(Some(user)) => user.wants_notifications(),
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(owner = %owner, error = %e, "Could not load booking owner");
                continue;
            }
        };
        if wants_email {
            notifications
                .booking_status_changed(owner, booking, auto_rejected)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use uuid::Uuid;

    use crate::config::Config;
    use crate::infra::repositories::entities::{auth_token, booking, user};
    use crate::infra::{LogNotifier, Persistence};

    fn action_token(action: BookingStatus, used: bool, expires_in: Duration) -> auth_token::Model {
        auth_token::Model {
            id: 50,
            token: "action-token".to_string(),
            purpose: TokenPurpose::BookingAction.as_str().to_string(),
            email: "lead@uni.edu".to_string(),
            booking_id: Some(10),
            payload: Some(serde_json::to_string(&BookingActionPayload { action }).unwrap()),
            expires_at: Utc::now() + expires_in,
            used_at: used.then(Utc::now),
            created_at: Utc::now(),
        }
    }

    fn lead() -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            email: "lead@uni.edu".to_string(),
            password_hash: "hash".to_string(),
            name: "Facility lead".to_string(),
            role: "admin".to_string(),
            email_notifications: true,
            is_verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn pending_booking() -> booking::Model {
        booking::Model {
            id: 10,
            infrastructure_id: 1,
            booking_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            booking_type: BookingType::Booking.as_str().to_string(),
            status: BookingStatus::Pending.as_str().to_string(),
            user_email: Some("student@uni.edu".to_string()),
            purpose: None,
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

    async fn apply_with(db: DatabaseConnection) -> (AppResult<StatusChangeOutcome>, String) {
        let db = Arc::new(db);
        let notifications = Arc::new(Notifications::new(Arc::new(LogNotifier), Config::for_tests()));
        let manager = BookingManager::new(Arc::new(Persistence::from_shared(db.clone())), notifications);

        let result = manager.apply_email_action("action-token".to_string()).await;

        drop(manager);
        let db = Arc::try_unwrap(db).unwrap_or_else(|_| panic!("connection still shared"));
        (result, format!("{:?}", db.into_transaction_log()))
    }

    #[tokio::test]
    async fn test_email_action_approves_as_token_holder() {
        let token = action_token(BookingStatus::Approved, false, Duration::hours(1));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![token.clone()]])
            .append_query_results([vec![lead()]])
            .append_query_results([vec![token]])
            .append_query_results([vec![pending_booking()]])
            .append_query_results([Vec::<booking::Model>::new()])
            .append_query_results([Vec::<user::Model>::new()])
            .append_exec_results([executed(1), executed(1), executed(1)])
            .into_connection();

        let (result, log) = apply_with(db).await;

        let outcome = result.unwrap();
        assert_eq!(outcome.previous_status, BookingStatus::Pending);
        assert_eq!(outcome.booking.status, BookingStatus::Approved);
        assert!(log.contains(r#"UPDATE \"auth_tokens\""#));
        assert!(log.contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_email_action_with_used_token_is_invalid() {
        let token = action_token(BookingStatus::Rejected, true, Duration::hours(1));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![token.clone()]])
            .append_query_results([vec![lead()]])
            .append_query_results([vec![token]])
            .into_connection();

        let (result, log) = apply_with(db).await;

        assert!(matches!(result, Err(AppError::InvalidToken)));
        assert!(!log.contains(r#"UPDATE \"bookings\""#));
        assert!(log.contains("ROLLBACK"));
    }

    #[tokio::test]
    async fn test_email_action_with_expired_token_is_invalid() {
        let token = action_token(BookingStatus::Approved, false, Duration::hours(-1));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![token.clone()]])
            .append_query_results([vec![lead()]])
            .append_query_results([vec![token]])
            .into_connection();

        let (result, log) = apply_with(db).await;

        assert!(matches!(result, Err(AppError::InvalidToken)));
        assert!(!log.contains(r#"UPDATE \"bookings\""#));
    }

    #[tokio::test]
    async fn test_email_action_with_unknown_token_is_invalid() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<auth_token::Model>::new()])
            .into_connection();

        let (result, _) = apply_with(db).await;

        assert!(matches!(result, Err(AppError::InvalidToken)));
    }
}
