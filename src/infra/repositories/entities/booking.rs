//! Booking/timeslot database entity.
//!
//! `booking_type` and `status` are stored as plain strings so the table
//! stays readable from SQL tooling.

use sea_orm::entity::prelude::*;

use crate::domain::{Booking, BookingStatus, BookingType};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub infrastructure_id: i32,
    pub booking_date: Date,
    pub start_time: Time,
    pub end_time: Time,
    pub booking_type: String,
    pub status: String,
    pub user_email: Option<String>,
    pub purpose: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Booking {
    type Error = crate::errors::AppError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: model.id,
            infrastructure_id: model.infrastructure_id,
            booking_date: model.booking_date,
            start_time: model.start_time,
            end_time: model.end_time,
            booking_type: model.booking_type.parse::<BookingType>()?,
            status: model.status.parse::<BookingStatus>()?,
            user_email: model.user_email,
            purpose: model.purpose,
        })
    }
}
