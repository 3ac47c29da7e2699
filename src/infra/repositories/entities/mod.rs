//! SeaORM entity definitions
//!
//! These are database-specific entities separate from domain models.

pub mod auth_token;
pub mod booking;
pub mod booking_answer;
pub mod infrastructure;
pub mod infrastructure_manager;
pub mod question;
pub mod user;
