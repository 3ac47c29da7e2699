//! Timeslot service - publishing, generating and withdrawing open slots.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;

use super::access::{ensure_can_manage, load_infrastructure};
use crate::config::MAX_GENERATED_TIMESLOTS;
use crate::domain::{Actor, Booking, TimeWindow};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Recurring daily slots between two dates (inclusive)
#[derive(Debug, Clone)]
pub struct SlotPlan {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
    pub slot_minutes: u32,
    pub skip_weekends: bool,
}

/// Result of a generate request
#[derive(Debug, Clone)]
pub struct GeneratedTimeslots {
    pub created: Vec<Booking>,
    /// Planned windows left out because they overlap an existing row
    pub skipped: usize,
}

/// Result of a bulk delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletedTimeslots {
    pub deleted: Vec<i32>,
    /// Ids that are missing, not manageable by the caller, or no longer available
    pub not_deleted: Vec<i32>,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait TimeslotService: Send + Sync {
    /// Publish explicit slots on one day; any overlap fails the whole request
    async fn create_timeslots(
        &self,
        actor: Actor,
        infrastructure_id: i32,
        date: NaiveDate,
        slots: Vec<(NaiveTime, NaiveTime)>,
    ) -> AppResult<Vec<Booking>>;

    /// Publish evenly sized slots over a date range, skipping occupied windows
    async fn generate_timeslots(
        &self,
        actor: Actor,
        infrastructure_id: i32,
        plan: SlotPlan,
    ) -> AppResult<GeneratedTimeslots>;

    /// Open slots from today on
    async fn available_timeslots(&self, infrastructure_id: i32) -> AppResult<Vec<Booking>>;

    /// Withdraw slots that are still available
    async fn delete_timeslots(&self, actor: Actor, ids: Vec<i32>) -> AppResult<DeletedTimeslots>;
}

pub struct TimeslotManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> TimeslotManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

/// Expand a plan into concrete windows.
pub fn plan_windows(plan: &SlotPlan, today: NaiveDate) -> AppResult<Vec<TimeWindow>> {
    if plan.slot_minutes == 0 {
        return Err(AppError::validation("Slot length must be positive"));
    }
    if plan.from_date > plan.to_date {
        return Err(AppError::validation("Start date must not be after end date"));
    }
    if plan.from_date < today {
        return Err(AppError::validation("Cannot create timeslots in the past"));
    }
    // validates day_start < day_end
    TimeWindow::new(plan.from_date, plan.day_start, plan.day_end)?;

    let step = Duration::minutes(i64::from(plan.slot_minutes));
    let mut windows = Vec::new();
    let mut date = plan.from_date;
    while date <= plan.to_date {
        let weekend = matches!(
            chrono::Datelike::weekday(&date),
            chrono::Weekday::Sat | chrono::Weekday::Sun
        );
        if !(plan.skip_weekends && weekend) {
            let mut start = plan.day_start;
            loop {
                let (end, wrapped) = start.overflowing_add_signed(step);
                if wrapped != 0 || end > plan.day_end || end <= start {
                    break;
                }
                windows.push(TimeWindow::new(date, start, end)?);
                if windows.len() > MAX_GENERATED_TIMESLOTS {
                    return Err(AppError::validation(format!(
                        "A single request may create at most {} timeslots",
                        MAX_GENERATED_TIMESLOTS
                    )));
                }
                start = end;
            }
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    if windows.is_empty() {
        return Err(AppError::validation("The plan does not produce any timeslot"));
    }
    Ok(windows)
}

/// Fail when two requested windows overlap each other.
fn ensure_disjoint(windows: &[TimeWindow]) -> AppResult<()> {
    for (i, a) in windows.iter().enumerate() {
        if windows[i + 1..].iter().any(|b| a.overlaps(b)) {
            return Err(AppError::validation("Requested timeslots overlap each other"));
        }
    }
    Ok(())
}

#[async_trait]
impl<U: UnitOfWork> TimeslotService for TimeslotManager<U> {
    async fn create_timeslots(
        &self,
        actor: Actor,
        infrastructure_id: i32,
        date: NaiveDate,
        slots: Vec<(NaiveTime, NaiveTime)>,
    ) -> AppResult<Vec<Booking>> {
        ensure_can_manage(self.uow.as_ref(), &actor, infrastructure_id).await?;
        let infrastructure = load_infrastructure(self.uow.as_ref(), infrastructure_id).await?;

        if slots.is_empty() {
            return Err(AppError::validation("At least one timeslot is required"));
        }
        if date < Utc::now().date_naive() {
            return Err(AppError::validation("Cannot create timeslots in the past"));
        }

        let windows = slots
            .into_iter()
            .map(|(start, end)| {
                let window = TimeWindow::new(date, start, end)?;
                infrastructure.check_slot(&window)?;
                Ok(window)
            })
            .collect::<AppResult<Vec<_>>>()?;
        ensure_disjoint(&windows)?;

        let created = self
            .uow
            .transaction_serializable(move |ctx| {
                Box::pin(async move {
                    let bookings = ctx.bookings();
                    let mut created = Vec::with_capacity(windows.len());
                    for window in &windows {
                        if !bookings.occupying(infrastructure_id, window).await?.is_empty() {
                            return Err(AppError::conflict(format!(
                                "A timeslot overlapping {}-{}",
                                window.start.format("%H:%M"),
                                window.end.format("%H:%M")
                            )));
                        }
                        created.push(bookings.insert_timeslot(infrastructure_id, window).await?);
                    }
                    Ok(created)
                })
            })
            .await?;

        tracing::info!(
            infrastructure_id,
            count = created.len(),
            actor = %actor.email,
            "Timeslots created"
        );
        Ok(created)
    }

    async fn generate_timeslots(
        &self,
        actor: Actor,
        infrastructure_id: i32,
        plan: SlotPlan,
    ) -> AppResult<GeneratedTimeslots> {
        ensure_can_manage(self.uow.as_ref(), &actor, infrastructure_id).await?;
        let infrastructure = load_infrastructure(self.uow.as_ref(), infrastructure_id).await?;

        let windows = plan_windows(&plan, Utc::now().date_naive())?;
        if let Some(first) = windows.first() {
            infrastructure.check_slot(first)?;
        }

        let outcome = self
            .uow
            .transaction_serializable(move |ctx| {
                Box::pin(async move {
                    let bookings = ctx.bookings();
                    let mut created = Vec::new();
                    let mut skipped = 0;
                    for window in &windows {
                        if bookings.occupying(infrastructure_id, window).await?.is_empty() {
                            created.push(bookings.insert_timeslot(infrastructure_id, window).await?);
                        } else {
                            skipped += 1;
                        }
                    }
                    Ok(GeneratedTimeslots { created, skipped })
                })
            })
            .await?;

        tracing::info!(
            infrastructure_id,
            created = outcome.created.len(),
            skipped = outcome.skipped,
            actor = %actor.email,
            "Timeslots generated"
        );
        Ok(outcome)
    }

    async fn available_timeslots(&self, infrastructure_id: i32) -> AppResult<Vec<Booking>> {
        load_infrastructure(self.uow.as_ref(), infrastructure_id).await?;
        self.uow
            .bookings()
            .available_timeslots(infrastructure_id, Utc::now().date_naive())
            .await
    }

    async fn delete_timeslots(&self, actor: Actor, ids: Vec<i32>) -> AppResult<DeletedTimeslots> {
        if ids.is_empty() {
            return Err(AppError::validation("No timeslot ids given"));
        }

        let mut outcome = DeletedTimeslots::default();
        for id in ids {
            let Some(slot) = self.uow.bookings().find_by_id(id).await? else {
                outcome.not_deleted.push(id);
                continue;
            };
            match ensure_can_manage(self.uow.as_ref(), &actor, slot.infrastructure_id).await {
                Ok(()) => {}
                Err(AppError::Forbidden) => {
                    outcome.not_deleted.push(id);
                    continue;
                }
                Err(e) => return Err(e),
            }
            if self.uow.bookings().delete_available_timeslot(id).await? {
                outcome.deleted.push(id);
            } else {
                outcome.not_deleted.push(id);
            }
        }

        tracing::info!(
            deleted = outcome.deleted.len(),
            not_deleted = outcome.not_deleted.len(),
            actor = %actor.email,
            "Timeslots deleted"
        );
        Ok(outcome)
    }
}
