//! Timeslot claiming and booking status transitions.
//!
//! Both operations run inside a single database transaction. The
//! `*_in` variants take an open `TransactionContext` so token-driven flows
//! (guest confirmation, emailed approve/reject links) can consume their
//! token in the same transaction.

use crate::domain::{
    answers_to_store, ensure_required_answers, Actor, AnswerInput, Booking, BookingStatus,
    BookingType, Infrastructure, User,
};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::{TransactionContext, UnitOfWork};

/// Input of the booking request processor
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub timeslot_id: i32,
    pub user_email: String,
    pub purpose: Option<String>,
    pub answers: Vec<AnswerInput>,
    /// Set when the answers were already validated (guest confirmation)
    pub skip_question_validation: bool,
}

/// A freshly created pending booking and who to tell about it
#[derive(Debug, Clone)]
pub struct BookingRequestOutcome {
    pub booking: Booking,
    pub infrastructure: Infrastructure,
    pub managers: Vec<User>,
}

/// Result of a status change
#[derive(Debug, Clone)]
pub struct StatusChangeOutcome {
    pub booking: Booking,
    pub previous_status: BookingStatus,
    /// Pending bookings rejected because they overlapped an approval
    pub auto_rejected: Vec<Booking>,
}

impl StatusChangeOutcome {
    pub fn auto_rejected_count(&self) -> usize {
        self.auto_rejected.len()
    }
}

/// Convert an available timeslot into a pending booking.
pub async fn process_booking_request<U: UnitOfWork>(
    uow: &U,
    request: BookingRequest,
) -> AppResult<BookingRequestOutcome> {
    uow.transaction(move |ctx| Box::pin(async move { claim_timeslot_in(&ctx, request).await }))
        .await
}

pub async fn claim_timeslot_in(
    ctx: &TransactionContext<'_>,
    request: BookingRequest,
) -> AppResult<BookingRequestOutcome> {
    let bookings = ctx.bookings();

    let slot = bookings
        .find_for_update(request.timeslot_id)
        .await?
        .ok_or(AppError::TimeslotUnavailable)?;
    slot.ensure_claimable()?;

    let questions = ctx.questions().list_for(slot.infrastructure_id).await?;
    if !request.skip_question_validation {
        ensure_required_answers(&questions, &request.answers)?;
    }

    let answers = answers_to_store(&questions, request.answers);
    ctx.questions().insert_answers(slot.id, answers).await?;

    let claimed = bookings
        .claim(slot.id, &request.user_email, request.purpose.clone())
        .await?;
    if claimed != 1 {
        return Err(AppError::TimeslotUnavailable);
    }

    let infrastructure = ctx
        .infrastructures()
        .find_by_id(slot.infrastructure_id)
        .await?
        .ok_or_not_found()?;
    let managers = ctx.infrastructures().managers(slot.infrastructure_id).await?;

    tracing::info!(
        booking_id = slot.id,
        infrastructure_id = slot.infrastructure_id,
        user = %request.user_email,
        "Timeslot claimed"
    );

    Ok(BookingRequestOutcome {
        booking: Booking {
            booking_type: BookingType::Booking,
            status: BookingStatus::Pending,
            user_email: Some(request.user_email),
            purpose: request.purpose,
            ..slot
        },
        infrastructure,
        managers,
    })
}

/// Approve, reject or cancel a booking on behalf of `actor`.
pub async fn update_booking_status<U: UnitOfWork>(
    uow: &U,
    booking_id: i32,
    target: BookingStatus,
    actor: Actor,
) -> AppResult<StatusChangeOutcome> {
    uow.transaction(move |ctx| {
        Box::pin(async move { apply_status_change_in(&ctx, booking_id, target, &actor).await })
    })
    .await
}

pub async fn apply_status_change_in(
    ctx: &TransactionContext<'_>,
    booking_id: i32,
    target: BookingStatus,
    actor: &Actor,
) -> AppResult<StatusChangeOutcome> {
    let bookings = ctx.bookings();

    let booking = bookings.find_for_update(booking_id).await?.ok_or_not_found()?;
    authorize_status_change(ctx, &booking, target, actor).await?;

    let previous_status = booking.status;
    previous_status.transition_to(target)?;

    if bookings.set_status_if(booking.id, previous_status, target).await? != 1 {
        return Err(AppError::InvalidTransition {
            from: previous_status,
            to: target,
        });
    }

    let updated = Booking {
        status: target,
        ..booking
    };

    let mut auto_rejected = Vec::new();
    if target == BookingStatus::Approved {
        let candidates = bookings
            .pending_overlapping_for_update(updated.infrastructure_id, &updated.window(), updated.id)
            .await?;
        auto_rejected = candidates
            .into_iter()
            .filter(|candidate| candidate.collides_with_approval(&updated))
            .map(|candidate| Booking {
                status: BookingStatus::Rejected,
                ..candidate
            })
            .collect();

        let ids: Vec<i32> = auto_rejected.iter().map(|b| b.id).collect();
        let rejected = bookings.reject_pending(ids).await?;
        if rejected as usize != auto_rejected.len() {
            tracing::warn!(
                booking_id = updated.id,
                expected = auto_rejected.len(),
                rejected,
                "Overlapping bookings changed during approval"
            );
        }
    }

    let mut settled: Vec<i32> = auto_rejected.iter().map(|b| b.id).collect();
    settled.push(updated.id);
    ctx.tokens().revoke_booking_actions(settled).await?;

    tracing::info!(
        booking_id = updated.id,
        from = %previous_status,
        to = %target,
        actor = %actor.email,
        auto_rejected = auto_rejected.len(),
        "Booking status changed"
    );

    Ok(StatusChangeOutcome {
        booking: updated,
        previous_status,
        auto_rejected,
    })
}

/// Admins and assigned managers may change any status; owners may cancel.
async fn authorize_status_change(
    ctx: &TransactionContext<'_>,
    booking: &Booking,
    target: BookingStatus,
    actor: &Actor,
) -> AppResult<()> {
    if actor.is_admin() {
        return Ok(());
    }
    if target == BookingStatus::Canceled && booking.is_owned_by(&actor.email) {
        return Ok(());
    }
    if actor.role.can_manage_infrastructure() {
        let managers = ctx.infrastructures().managers(booking.infrastructure_id).await?;
        if managers.iter().any(|m| m.id == actor.id) {
            return Ok(());
        }
    }
    Err(AppError::Forbidden)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use std::sync::Arc;
    use uuid::Uuid;

    use crate::domain::UserRole;
    use crate::infra::repositories::entities::{booking, question};
    use crate::infra::Persistence;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn row(
        id: i32,
        start: NaiveTime,
        end: NaiveTime,
        booking_type: BookingType,
        status: BookingStatus,
        email: Option<&str>,
    ) -> booking::Model {
        booking::Model {
            id,
            infrastructure_id: 1,
            booking_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            start_time: start,
            end_time: end,
            booking_type: booking_type.as_str().to_string(),
            status: status.as_str().to_string(),
            user_email: email.map(str::to_string),
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

    fn admin() -> Actor {
        Actor {
            id: Uuid::new_v4(),
            email: "admin@uni.edu".to_string(),
            role: UserRole::Admin,
        }
    }

    fn request(timeslot_id: i32) -> BookingRequest {
        BookingRequest {
            timeslot_id,
            user_email: "student@uni.edu".to_string(),
            purpose: Some("Imaging".to_string()),
            answers: vec![],
            skip_question_validation: false,
        }
    }

    fn shared(db: DatabaseConnection) -> (Persistence, Arc<DatabaseConnection>) {
        let db = Arc::new(db);
        (Persistence::from_shared(db.clone()), db)
    }

    fn transaction_log(uow: Persistence, db: Arc<DatabaseConnection>) -> String {
        drop(uow);
        let db = Arc::try_unwrap(db).unwrap_or_else(|_| panic!("connection still shared"));
        format!("{:?}", db.into_transaction_log())
    }

    const BOOKING_UPDATE: &str = r#"UPDATE \"bookings\""#;

    #[tokio::test]
    async fn test_claiming_a_pending_booking_fails_without_writes() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row(
                7,
                at(9, 0),
                at(10, 0),
                BookingType::Booking,
                BookingStatus::Pending,
                Some("someone@uni.edu"),
            )]])
            .into_connection();
        let (uow, db) = shared(db);

        let result = process_booking_request(&uow, request(7)).await;

        assert!(matches!(result, Err(AppError::TimeslotUnavailable)));
        let log = transaction_log(uow, db);
        assert!(log.contains("FOR UPDATE"));
        assert!(!log.contains(BOOKING_UPDATE));
    }

    #[tokio::test]
    async fn test_claiming_a_missing_timeslot_is_unavailable() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<booking::Model>::new()])
            .into_connection();
        let uow = Persistence::new(db);

        let result = process_booking_request(&uow, request(404)).await;

        assert!(matches!(result, Err(AppError::TimeslotUnavailable)));
    }

    #[tokio::test]
    async fn test_missing_required_answer_blocks_claim() {
        let slot = row(7, at(9, 0), at(10, 0), BookingType::Timeslot, BookingStatus::Available, None);
        let required = question::Model {
            id: 3,
            infrastructure_id: 1,
            question_text: "Sample type".to_string(),
            question_type: "text".to_string(),
            is_required: true,
            options: None,
            display_order: 0,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![slot]])
            .append_query_results([vec![required]])
            .into_connection();
        let (uow, db) = shared(db);

        let result = process_booking_request(&uow, request(7)).await;

        match result {
            Err(AppError::MissingAnswers(ids)) => assert_eq!(ids, vec![3]),
            other => panic!("unexpected result: {:?}", other.map(|o| o.booking)),
        }
        assert!(!transaction_log(uow, db).contains(BOOKING_UPDATE));
    }

    #[tokio::test]
    async fn test_claim_lost_to_concurrent_request() {
        let slot = row(7, at(9, 0), at(10, 0), BookingType::Timeslot, BookingStatus::Available, None);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![slot]])
            .append_query_results([Vec::<question::Model>::new()])
            .append_exec_results([executed(0)])
            .into_connection();
        let uow = Persistence::new(db);

        let result = process_booking_request(&uow, request(7)).await;

        assert!(matches!(result, Err(AppError::TimeslotUnavailable)));
    }

    #[tokio::test]
    async fn test_approval_rejects_only_overlapping_pending_requests() {
        let approved = row(
            10,
            at(9, 0),
            at(10, 0),
            BookingType::Booking,
            BookingStatus::Pending,
            Some("first@uni.edu"),
        );
        let overlapping = row(
            11,
            at(9, 30),
            at(10, 30),
            BookingType::Booking,
            BookingStatus::Pending,
            Some("second@uni.edu"),
        );
        let touching = row(
            12,
            at(10, 0),
            at(11, 0),
            BookingType::Booking,
            BookingStatus::Pending,
            Some("third@uni.edu"),
        );
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![approved]])
            .append_query_results([vec![overlapping, touching]])
            .append_exec_results([executed(1), executed(1), executed(0)])
            .into_connection();
        let (uow, db) = shared(db);

        let outcome = update_booking_status(&uow, 10, BookingStatus::Approved, admin())
            .await
            .unwrap();

        assert_eq!(outcome.previous_status, BookingStatus::Pending);
        assert_eq!(outcome.booking.status, BookingStatus::Approved);
        assert_eq!(outcome.auto_rejected_count(), 1);
        assert_eq!(outcome.auto_rejected[0].id, 11);
        assert_eq!(outcome.auto_rejected[0].status, BookingStatus::Rejected);
        assert!(transaction_log(uow, db).contains("FOR UPDATE"));
    }

    #[tokio::test]
    async fn test_approval_after_concurrent_change_is_rejected() {
        let booking = row(
            10,
            at(9, 0),
            at(10, 0),
            BookingType::Booking,
            BookingStatus::Pending,
            Some("first@uni.edu"),
        );
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking]])
            .append_exec_results([executed(0)])
            .into_connection();
        let uow = Persistence::new(db);

        let result = update_booking_status(&uow, 10, BookingStatus::Approved, admin()).await;

        assert!(matches!(
            result,
            Err(AppError::InvalidTransition {
                from: BookingStatus::Pending,
                to: BookingStatus::Approved
            })
        ));
    }

    #[tokio::test]
    async fn test_rejecting_a_rejected_booking_is_invalid() {
        let booking = row(
            10,
            at(9, 0),
            at(10, 0),
            BookingType::Booking,
            BookingStatus::Rejected,
            Some("first@uni.edu"),
        );
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking]])
            .into_connection();
        let (uow, db) = shared(db);

        let result = update_booking_status(&uow, 10, BookingStatus::Rejected, admin()).await;

        assert!(matches!(result, Err(AppError::InvalidTransition { .. })));
        assert!(!transaction_log(uow, db).contains(BOOKING_UPDATE));
    }

    #[tokio::test]
    async fn test_owner_may_cancel_but_not_approve() {
        let owner = Actor {
            id: Uuid::new_v4(),
            email: "First@uni.edu".to_string(),
            role: UserRole::Student,
        };
        let booking = || {
            row(
                10,
                at(9, 0),
                at(10, 0),
                BookingType::Booking,
                BookingStatus::Pending,
                Some("first@uni.edu"),
            )
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking()]])
            .into_connection();
        let uow = Persistence::new(db);
        let denied = update_booking_status(&uow, 10, BookingStatus::Approved, owner.clone()).await;
        assert!(matches!(denied, Err(AppError::Forbidden)));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![booking()]])
            .append_exec_results([executed(1), executed(0)])
            .into_connection();
        let uow = Persistence::new(db);
        let canceled = update_booking_status(&uow, 10, BookingStatus::Canceled, owner)
            .await
            .unwrap();
        assert_eq!(canceled.booking.status, BookingStatus::Canceled);
        assert!(canceled.auto_rejected.is_empty());
    }
}
