//! CLI module - Command-line interface for the application.
//!
//! Provides commands for:
//! - `serve` - Start the HTTP server
//! - `migrate` - Database migrations
//! - `jobs` - Email worker, queue inspection and the maintenance sweep

pub mod args;

pub use args::{Cli, Commands};
