//! Booking and timeslot repository.
//!
//! Store methods serve read paths and single-statement writes. The
//! claim and approval flows run through the transactional helpers at the
//! bottom of this file, which the unit of work exposes.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sea_orm::{
    sea_query::{Expr, SimpleExpr},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;

use super::entities::booking::{self, ActiveModel, Entity as BookingEntity};
use crate::domain::{Booking, BookingStatus, BookingType, TimeWindow};
use crate::errors::AppResult;
use crate::types::PaginationParams;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Criteria for booking listings
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    /// Restrict to these infrastructures (manager scope)
    pub infrastructure_ids: Option<Vec<i32>>,
    pub infrastructure_id: Option<i32>,
    pub user_email: Option<String>,
    pub status: Option<BookingStatus>,
    pub booking_type: Option<BookingType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Rows changed by one maintenance sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub expired: u64,
    pub completed: u64,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Booking>>;

    /// Page through bookings matching `filter`, newest date first
    async fn list(
        &self,
        filter: BookingFilter,
        params: PaginationParams,
    ) -> AppResult<(Vec<Booking>, u64)>;

    /// Available timeslots on or after `from`, in chronological order
    async fn available_timeslots(
        &self,
        infrastructure_id: i32,
        from: NaiveDate,
    ) -> AppResult<Vec<Booking>>;

    /// Delete a row only while it is still an available timeslot.
    /// Returns whether a row was removed.
    async fn delete_available_timeslot(&self, id: i32) -> AppResult<bool>;

    /// Expire elapsed open slots and pending requests, complete elapsed
    /// approved bookings.
    async fn sweep_elapsed(&self, now: NaiveDateTime) -> AppResult<SweepOutcome>;
}

pub struct BookingStore {
    db: Arc<DatabaseConnection>,
}

impl BookingStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn into_domain(models: Vec<booking::Model>) -> AppResult<Vec<Booking>> {
    models.into_iter().map(Booking::try_from).collect()
}

/// Rows on the same infrastructure and day whose interval strictly
/// overlaps `window`.
fn overlapping(infrastructure_id: i32, window: &TimeWindow) -> Condition {
    Condition::all()
        .add(booking::Column::InfrastructureId.eq(infrastructure_id))
        .add(booking::Column::BookingDate.eq(window.date))
        .add(booking::Column::StartTime.lt(window.end))
        .add(booking::Column::EndTime.gt(window.start))
}

/// Windows that ended at or before `now`
fn elapsed_before(now: NaiveDateTime) -> Condition {
    Condition::any()
        .add(booking::Column::BookingDate.lt(now.date()))
        .add(
            Condition::all()
                .add(booking::Column::BookingDate.eq(now.date()))
                .add(booking::Column::EndTime.lte(now.time())),
        )
}

fn status_value(status: BookingStatus) -> SimpleExpr {
    Expr::value(status.as_str())
}

#[async_trait]
impl BookingRepository for BookingStore {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Booking>> {
        find_by_id(self.db.as_ref(), id).await
    }

    async fn list(
        &self,
        filter: BookingFilter,
        params: PaginationParams,
    ) -> AppResult<(Vec<Booking>, u64)> {
        let mut condition = Condition::all();
        if let Some(ids) = filter.infrastructure_ids {
            condition = condition.add(booking::Column::InfrastructureId.is_in(ids));
        }
        if let Some(id) = filter.infrastructure_id {
            condition = condition.add(booking::Column::InfrastructureId.eq(id));
        }
        if let Some(email) = filter.user_email {
            condition = condition.add(booking::Column::UserEmail.eq(email));
        }
        if let Some(status) = filter.status {
            condition = condition.add(booking::Column::Status.eq(status.as_str()));
        }
        if let Some(kind) = filter.booking_type {
            condition = condition.add(booking::Column::BookingType.eq(kind.as_str()));
        }
        if let Some(from) = filter.date_from {
            condition = condition.add(booking::Column::BookingDate.gte(from));
        }
        if let Some(to) = filter.date_to {
            condition = condition.add(booking::Column::BookingDate.lte(to));
        }

        let paginator = BookingEntity::find()
            .filter(condition)
            .order_by_desc(booking::Column::BookingDate)
            .order_by_asc(booking::Column::StartTime)
            .order_by_asc(booking::Column::Id)
            .paginate(self.db.as_ref(), params.limit());
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(params.page_index()).await?;

        Ok((into_domain(models)?, total))
    }

    async fn available_timeslots(
        &self,
        infrastructure_id: i32,
        from: NaiveDate,
    ) -> AppResult<Vec<Booking>> {
        let models = BookingEntity::find()
            .filter(booking::Column::InfrastructureId.eq(infrastructure_id))
            .filter(booking::Column::BookingType.eq(BookingType::Timeslot.as_str()))
            .filter(booking::Column::Status.eq(BookingStatus::Available.as_str()))
            .filter(booking::Column::BookingDate.gte(from))
            .order_by_asc(booking::Column::BookingDate)
            .order_by_asc(booking::Column::StartTime)
            .all(self.db.as_ref())
            .await?;
        into_domain(models)
    }

    async fn delete_available_timeslot(&self, id: i32) -> AppResult<bool> {
        let result = BookingEntity::delete_many()
            .filter(booking::Column::Id.eq(id))
            .filter(booking::Column::BookingType.eq(BookingType::Timeslot.as_str()))
            .filter(booking::Column::Status.eq(BookingStatus::Available.as_str()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn sweep_elapsed(&self, now: NaiveDateTime) -> AppResult<SweepOutcome> {
        let stamp = chrono::Utc::now();

        let expired = BookingEntity::update_many()
            .col_expr(booking::Column::Status, status_value(BookingStatus::Expired))
            .col_expr(booking::Column::UpdatedAt, Expr::value(stamp))
            .filter(booking::Column::Status.is_in([
                BookingStatus::Available.as_str(),
                BookingStatus::Pending.as_str(),
            ]))
            .filter(elapsed_before(now))
            .exec(self.db.as_ref())
            .await?
            .rows_affected;

        let completed = BookingEntity::update_many()
            .col_expr(booking::Column::Status, status_value(BookingStatus::Completed))
            .col_expr(booking::Column::UpdatedAt, Expr::value(stamp))
            .filter(booking::Column::Status.eq(BookingStatus::Approved.as_str()))
            .filter(elapsed_before(now))
            .exec(self.db.as_ref())
            .await?
            .rows_affected;

        Ok(SweepOutcome { expired, completed })
    }
}

// -----------------------------------------------------------------------------
// Transactional helpers
// -----------------------------------------------------------------------------

/// Load a row and hold a row lock on it until the transaction ends.
pub(crate) async fn find_for_update<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> AppResult<Option<Booking>> {
    BookingEntity::find_by_id(id)
        .lock_exclusive()
        .one(db)
        .await?
        .map(Booking::try_from)
        .transpose()
}

/// Turn an available timeslot into a pending booking.
/// Returns the number of rows flipped (0 or 1).
pub(crate) async fn claim<C: ConnectionTrait>(
    db: &C,
    id: i32,
    user_email: &str,
    purpose: Option<String>,
) -> AppResult<u64> {
    let result = BookingEntity::update_many()
        .col_expr(booking::Column::BookingType, Expr::value(BookingType::Booking.as_str()))
        .col_expr(booking::Column::Status, status_value(BookingStatus::Pending))
        .col_expr(booking::Column::UserEmail, Expr::value(user_email))
        .col_expr(booking::Column::Purpose, Expr::value(purpose))
        .col_expr(booking::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(booking::Column::Id.eq(id))
        .filter(booking::Column::Status.eq(BookingStatus::Available.as_str()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Move a row from `from` to `to`; zero rows means someone else got there first.
pub(crate) async fn set_status_if<C: ConnectionTrait>(
    db: &C,
    id: i32,
    from: BookingStatus,
    to: BookingStatus,
) -> AppResult<u64> {
    let result = BookingEntity::update_many()
        .col_expr(booking::Column::Status, status_value(to))
        .col_expr(booking::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(booking::Column::Id.eq(id))
        .filter(booking::Column::Status.eq(from.as_str()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Other pending bookings overlapping `window`, locked for update.
pub(crate) async fn pending_overlapping_for_update<C: ConnectionTrait>(
    db: &C,
    infrastructure_id: i32,
    window: &TimeWindow,
    exclude_id: i32,
) -> AppResult<Vec<Booking>> {
    let models = BookingEntity::find()
        .filter(overlapping(infrastructure_id, window))
        .filter(booking::Column::Id.ne(exclude_id))
        .filter(booking::Column::BookingType.eq(BookingType::Booking.as_str()))
        .filter(booking::Column::Status.eq(BookingStatus::Pending.as_str()))
        .order_by_asc(booking::Column::Id)
        .lock_exclusive()
        .all(db)
        .await?;
    into_domain(models)
}

/// Reject the given bookings while they are still pending.
pub(crate) async fn reject_pending<C: ConnectionTrait>(db: &C, ids: Vec<i32>) -> AppResult<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = BookingEntity::update_many()
        .col_expr(booking::Column::Status, status_value(BookingStatus::Rejected))
        .col_expr(booking::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(booking::Column::Id.is_in(ids))
        .filter(booking::Column::Status.eq(BookingStatus::Pending.as_str()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Rows that still hold part of `window` (open, pending or approved).
pub(crate) async fn occupying<C: ConnectionTrait>(
    db: &C,
    infrastructure_id: i32,
    window: &TimeWindow,
) -> AppResult<Vec<Booking>> {
    let models = BookingEntity::find()
        .filter(overlapping(infrastructure_id, window))
        .filter(booking::Column::Status.is_in([
            BookingStatus::Available.as_str(),
            BookingStatus::Pending.as_str(),
            BookingStatus::Approved.as_str(),
        ]))
        .all(db)
        .await?;
    into_domain(models)
}

pub(crate) async fn insert_timeslot<C: ConnectionTrait>(
    db: &C,
    infrastructure_id: i32,
    window: &TimeWindow,
) -> AppResult<Booking> {
    let now = chrono::Utc::now();
    let active_model = ActiveModel {
        infrastructure_id: Set(infrastructure_id),
        booking_date: Set(window.date),
        start_time: Set(window.start),
        end_time: Set(window.end),
        booking_type: Set(BookingType::Timeslot.as_str().to_string()),
        status: Set(BookingStatus::Available.as_str().to_string()),
        user_email: Set(None),
        purpose: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let model = active_model.insert(db).await?;
    Booking::try_from(model)
}

pub(crate) async fn find_by_id<C: ConnectionTrait>(db: &C, id: i32) -> AppResult<Option<Booking>> {
    BookingEntity::find_by_id(id)
        .one(db)
        .await?
        .map(Booking::try_from)
        .transpose()
}
