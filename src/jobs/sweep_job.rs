//! Maintenance sweep for elapsed timeslots, bookings and tokens.

use chrono::Utc;

use crate::errors::AppResult;
use crate::infra::{SweepOutcome, UnitOfWork};

/// Counts reported by one sweep run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub bookings: SweepOutcome,
    pub purged_tokens: u64,
}

/// Expire elapsed open slots and pending requests, complete elapsed
/// approved bookings and drop spent tokens.
///
/// Booking times are wall-clock times without a zone; they are compared
/// against the current UTC time.
pub async fn run_sweep<U: UnitOfWork>(uow: &U) -> AppResult<SweepReport> {
    let now = Utc::now();
    let bookings = uow.bookings().sweep_elapsed(now.naive_utc()).await?;
    let purged_tokens = uow.tokens().purge(now).await?;

    tracing::info!(
        expired = bookings.expired,
        completed = bookings.completed,
        purged_tokens,
        "Maintenance sweep finished"
    );

    Ok(SweepReport {
        bookings,
        purged_tokens,
    })
}
