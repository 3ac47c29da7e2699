//! Booking and timeslot domain model.
//!
//! Timeslots and bookings share one record. An open slot is a
//! `Timeslot` in `Available` status; claiming it turns the same record
//! into a `Booking` in `Pending` status, which then moves through the
//! lifecycle below.
//!
//! ```text
//! available --claim--> pending --approve--> approved --sweep--> completed
//!     |                  |  \                  |  \
//!   sweep             reject cancel         reject cancel
//!     v                  v     v               v     v
//!  expired          rejected canceled     rejected canceled
//! ```

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};

/// Discriminates open slots from claimed reservations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookingType {
    Timeslot,
    Booking,
}

impl BookingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingType::Timeslot => "timeslot",
            BookingType::Booking => "booking",
        }
    }
}

impl std::str::FromStr for BookingType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timeslot" => Ok(BookingType::Timeslot),
            "booking" => Ok(BookingType::Booking),
            other => Err(AppError::validation(format!("Unknown booking type '{}'", other))),
        }
    }
}

/// Status of a timeslot or booking record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Available,
    Pending,
    Approved,
    Rejected,
    Completed,
    Expired,
    #[serde(alias = "cancelled")]
    Canceled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Available => "available",
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Completed => "completed",
            BookingStatus::Expired => "expired",
            BookingStatus::Canceled => "canceled",
        }
    }

    /// Statuses that hold the time window of their infrastructure
    pub fn occupies_slot(&self) -> bool {
        matches!(
            self,
            BookingStatus::Available | BookingStatus::Pending | BookingStatus::Approved
        )
    }

    /// Terminal statuses never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Rejected
                | BookingStatus::Completed
                | BookingStatus::Expired
                | BookingStatus::Canceled
        )
    }

    /// Whether a user-initiated change from `self` to `target` is allowed.
    ///
    /// Only approve, reject and cancel can be requested through the API;
    /// claiming and sweeping have their own entry points.
    pub fn can_transition_to(&self, target: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, target),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Rejected)
                | (Pending, Canceled)
                | (Approved, Canceled)
        )
    }

    /// Validate a requested transition, returning the target on success.
    pub fn transition_to(&self, target: BookingStatus) -> AppResult<BookingStatus> {
        if !target.is_requestable() {
            return Err(AppError::validation(format!(
                "Status '{}' cannot be set directly",
                target
            )));
        }
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(AppError::InvalidTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Statuses a caller may request through the status endpoint
    pub fn is_requestable(&self) -> bool {
        matches!(
            self,
            BookingStatus::Approved | BookingStatus::Rejected | BookingStatus::Canceled
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(BookingStatus::Available),
            "pending" => Ok(BookingStatus::Pending),
            "approved" => Ok(BookingStatus::Approved),
            "rejected" => Ok(BookingStatus::Rejected),
            "completed" => Ok(BookingStatus::Completed),
            "expired" => Ok(BookingStatus::Expired),
            // accept the double-l spelling some clients send
            "canceled" | "cancelled" => Ok(BookingStatus::Canceled),
            other => Err(AppError::validation(format!("Unknown booking status '{}'", other))),
        }
    }
}

/// A half-open time window `[start, end)` on a single day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    /// Build a window, rejecting empty or inverted ranges.
    pub fn new(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> AppResult<Self> {
        if start >= end {
            return Err(AppError::validation("Start time must be before end time"));
        }
        Ok(Self { date, start, end })
    }

    /// Strict overlap; windows that only touch do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.date == other.date && self.start < other.end && other.start < self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end)
    }
}

/// Booking/timeslot domain entity
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: i32,
    pub infrastructure_id: i32,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub booking_type: BookingType,
    pub status: BookingStatus,
    pub user_email: Option<String>,
    pub purpose: Option<String>,
}

impl Booking {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            date: self.booking_date,
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// A record can be claimed only while it is an available timeslot.
    pub fn is_claimable(&self) -> bool {
        self.booking_type == BookingType::Timeslot && self.status == BookingStatus::Available
    }

    /// Fail with `TimeslotUnavailable` unless the record can be claimed.
    pub fn ensure_claimable(&self) -> AppResult<()> {
        if self.is_claimable() {
            Ok(())
        } else {
            Err(AppError::TimeslotUnavailable)
        }
    }

    pub fn is_owned_by(&self, email: &str) -> bool {
        self.user_email
            .as_deref()
            .is_some_and(|owner| owner.eq_ignore_ascii_case(email))
    }

    /// Whether this booking loses to `approved` under first-approved-wins.
    pub fn collides_with_approval(&self, approved: &Booking) -> bool {
        self.id != approved.id
            && self.infrastructure_id == approved.infrastructure_id
            && self.booking_type == BookingType::Booking
            && self.status == BookingStatus::Pending
            && self.window().overlaps(&approved.window())
    }

    /// Status the maintenance sweep assigns once the window has ended.
    pub fn elapsed_status(&self, now: NaiveDateTime) -> Option<BookingStatus> {
        if self.window().ends_at() > now {
            return None;
        }
        match self.status {
            BookingStatus::Available | BookingStatus::Pending => Some(BookingStatus::Expired),
            BookingStatus::Approved => Some(BookingStatus::Completed),
            _ => None,
        }
    }
}

/// Booking response DTO
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = 3)]
    pub infrastructure_id: i32,
    #[schema(value_type = String, example = "2026-11-02")]
    pub booking_date: NaiveDate,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "10:00:00")]
    pub end_time: NaiveTime,
    pub booking_type: BookingType,
    pub status: BookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            infrastructure_id: b.infrastructure_id,
            booking_date: b.booking_date,
            start_time: b.start_time,
            end_time: b.end_time,
            booking_type: b.booking_type,
            status: b.status,
            user_email: b.user_email,
            purpose: b.purpose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, 2).unwrap()
    }

    fn booking(id: i32, status: BookingStatus, start: NaiveTime, end: NaiveTime) -> Booking {
        Booking {
            id,
            infrastructure_id: 1,
            booking_date: day(),
            start_time: start,
            end_time: end,
            booking_type: if status == BookingStatus::Available {
                BookingType::Timeslot
            } else {
                BookingType::Booking
            },
            status,
            user_email: Some(format!("user{}@example.com", id)),
            purpose: None,
        }
    }

    #[test]
    fn test_window_overlap_is_strict() {
        let a = TimeWindow::new(day(), t(9, 0), t(10, 0)).unwrap();
        let touching = TimeWindow::new(day(), t(10, 0), t(11, 0)).unwrap();
        let inner = TimeWindow::new(day(), t(9, 15), t(9, 45)).unwrap();
        let straddling = TimeWindow::new(day(), t(8, 30), t(9, 1)).unwrap();

        assert!(!a.overlaps(&touching));
        assert!(a.overlaps(&inner));
        assert!(inner.overlaps(&a));
        assert!(a.overlaps(&straddling));
    }

    #[test]
    fn test_window_on_other_day_never_overlaps() {
        let a = TimeWindow::new(day(), t(9, 0), t(10, 0)).unwrap();
        let b = TimeWindow::new(day().succ_opt().unwrap(), t(9, 0), t(10, 0)).unwrap();
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_window_rejects_inverted_range() {
        assert!(TimeWindow::new(day(), t(10, 0), t(10, 0)).is_err());
        assert!(TimeWindow::new(day(), t(11, 0), t(10, 0)).is_err());
    }

    #[test]
    fn test_only_available_timeslots_are_claimable() {
        assert!(booking(1, BookingStatus::Available, t(9, 0), t(10, 0)).is_claimable());
        for status in [
            BookingStatus::Pending,
            BookingStatus::Approved,
            BookingStatus::Rejected,
            BookingStatus::Completed,
            BookingStatus::Expired,
            BookingStatus::Canceled,
        ] {
            let b = booking(1, status, t(9, 0), t(10, 0));
            assert!(matches!(b.ensure_claimable(), Err(AppError::TimeslotUnavailable)));
        }
    }

    #[test]
    fn test_available_record_of_booking_type_is_not_claimable() {
        let mut b = booking(1, BookingStatus::Available, t(9, 0), t(10, 0));
        b.booking_type = BookingType::Booking;
        assert!(!b.is_claimable());
    }

    #[test]
    fn test_transition_table() {
        use BookingStatus::*;
        assert!(Pending.transition_to(Approved).is_ok());
        assert!(Pending.transition_to(Rejected).is_ok());
        assert!(Pending.transition_to(Canceled).is_ok());
        assert!(Approved.transition_to(Canceled).is_ok());
        assert!(Approved.transition_to(Rejected).is_ok());

        assert!(matches!(
            Approved.transition_to(Approved),
            Err(AppError::InvalidTransition { .. })
        ));
        assert!(matches!(
            Rejected.transition_to(Approved),
            Err(AppError::InvalidTransition { .. })
        ));
        assert!(matches!(
            Available.transition_to(Approved),
            Err(AppError::InvalidTransition { .. })
        ));
        assert!(matches!(
            Pending.transition_to(Completed),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_collision_only_hits_other_overlapping_pending_bookings() {
        let approved = booking(1, BookingStatus::Approved, t(9, 0), t(11, 0));

        assert!(booking(2, BookingStatus::Pending, t(10, 0), t(12, 0)).collides_with_approval(&approved));
        assert!(!booking(3, BookingStatus::Pending, t(11, 0), t(12, 0)).collides_with_approval(&approved));
        assert!(!booking(4, BookingStatus::Approved, t(9, 0), t(10, 0)).collides_with_approval(&approved));
        assert!(!booking(5, BookingStatus::Available, t(9, 0), t(10, 0)).collides_with_approval(&approved));

        let mut other_infra = booking(6, BookingStatus::Pending, t(9, 0), t(10, 0));
        other_infra.infrastructure_id = 2;
        assert!(!other_infra.collides_with_approval(&approved));

        let mut itself = approved.clone();
        itself.status = BookingStatus::Pending;
        assert!(!itself.collides_with_approval(&approved));
    }

    #[test]
    fn test_elapsed_status() {
        let before = day().and_time(t(8, 0));
        let after = day().and_time(t(12, 0));

        let slot = booking(1, BookingStatus::Available, t(9, 0), t(10, 0));
        assert_eq!(slot.elapsed_status(before), None);
        assert_eq!(slot.elapsed_status(after), Some(BookingStatus::Expired));

        let approved = booking(2, BookingStatus::Approved, t(9, 0), t(10, 0));
        assert_eq!(approved.elapsed_status(after), Some(BookingStatus::Completed));

        let canceled = booking(3, BookingStatus::Canceled, t(9, 0), t(10, 0));
        assert_eq!(canceled.elapsed_status(after), None);
    }

    #[test]
    fn test_status_parsing_accepts_both_spellings() {
        assert_eq!("cancelled".parse::<BookingStatus>().unwrap(), BookingStatus::Canceled);
        assert_eq!("canceled".parse::<BookingStatus>().unwrap(), BookingStatus::Canceled);
        assert!("unknown".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_status_json_accepts_both_spellings() {
        let parsed: BookingStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, BookingStatus::Canceled);
        let parsed: BookingStatus = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(parsed, BookingStatus::Canceled);
        assert_eq!(serde_json::to_string(&BookingStatus::Canceled).unwrap(), "\"canceled\"");
    }

    #[test]
    fn test_ownership_ignores_case() {
        let b = booking(7, BookingStatus::Pending, t(9, 0), t(10, 0));
        assert!(b.is_owned_by("USER7@example.com"));
        assert!(!b.is_owned_by("someone@example.com"));
    }
}
