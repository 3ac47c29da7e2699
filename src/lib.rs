//! Infrastructure Booking - scheduling API for shared research facilities
//!
//! Managers publish timeslots for microscopes, rooms and instruments;
//! users turn a timeslot into a pending booking by answering the
//! infrastructure's questions; approving a booking rejects every other
//! pending request overlapping the same window.
//!
//! # Architecture Layers
//!
//! - **cli**: Command-line interface
//! - **commands**: CLI command implementations
//! - **config**: Application configuration and constants
//! - **domain**: Booking lifecycle, timeslot windows, question validation
//! - **services**: Use cases (auth, timeslots, booking workflow, guests)
//! - **infra**: Database, repositories, Unit of Work, rate limiter, storage, email
//! - **jobs**: Email delivery and the maintenance sweep
//! - **api**: HTTP handlers, middleware, and routes
//! - **types**: Shared types (pagination, responses)
//! - **errors**: Centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! # Start the server
//! infra-booking serve
//!
//! # Run migrations
//! infra-booking migrate up
//!
//! # Deliver queued email
//! infra-booking jobs work
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod jobs;
pub mod services;
pub mod types;

// Re-export commonly used types at crate root
pub use api::AppState;
pub use config::Config;
pub use domain::{Booking, BookingStatus, Password, User, UserRole};
pub use errors::{AppError, AppResult};
