//! Infrastructure (room / instrument) domain entity.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::TimeWindow;
use crate::errors::{AppError, AppResult};

/// Bookable infrastructure
#[derive(Debug, Clone, PartialEq)]
pub struct Infrastructure {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub is_active: bool,
    /// Longest allowed slot in minutes; `None` means unlimited
    pub max_booking_duration: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Infrastructure {
    /// Check a prospective timeslot against this infrastructure's limits.
    pub fn check_slot(&self, window: &TimeWindow) -> AppResult<()> {
        if !self.is_active {
            return Err(AppError::validation(format!(
                "Infrastructure '{}' is not active",
                self.name
            )));
        }
        if let Some(max) = self.max_booking_duration {
            if window.duration_minutes() > i64::from(max) {
                return Err(AppError::validation(format!(
                    "Timeslot exceeds the maximum booking duration of {} minutes",
                    max
                )));
            }
        }
        Ok(())
    }
}

/// Fields accepted when creating or replacing an infrastructure
#[derive(Debug, Clone)]
pub struct InfrastructureDraft {
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub is_active: bool,
    pub max_booking_duration: Option<i32>,
}

/// Infrastructure response DTO
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InfrastructureResponse {
    #[schema(example = 3)]
    pub id: i32,
    #[schema(example = "Confocal microscope")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "Building B, room 104")]
    pub location: Option<String>,
    pub is_active: bool,
    #[schema(example = 120)]
    pub max_booking_duration: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<Infrastructure> for InfrastructureResponse {
    fn from(i: Infrastructure) -> Self {
        Self {
            id: i.id,
            name: i.name,
            description: i.description,
            location: i.location,
            is_active: i.is_active,
            max_booking_duration: i.max_booking_duration,
            created_at: i.created_at,
        }
    }
}
