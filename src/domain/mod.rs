//! Domain layer - Core business entities and logic
//!
//! Booking lifecycle rules, timeslot windows and question validation live
//! here, independent of the database and HTTP layers.

pub mod booking;
pub mod infrastructure;
pub mod password;
pub mod question;
pub mod token;
pub mod user;

pub use booking::{Booking, BookingResponse, BookingStatus, BookingType, TimeWindow};
pub use infrastructure::{Infrastructure, InfrastructureDraft, InfrastructureResponse};
pub use password::Password;
pub use question::{
    answers_to_store, ensure_required_answers, missing_required_answers, AnswerInput,
    BookingAnswer, InfrastructureQuestion, QuestionDraft, QuestionType,
};
pub use token::{generate_token, AuthToken, BookingActionPayload, TokenPurpose};
pub use user::{normalize_email, Actor, User, UserResponse, UserRole};
