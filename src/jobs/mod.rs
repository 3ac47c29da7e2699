//! Background jobs.

mod email_job;
mod sweep_job;

pub use email_job::{email_job_handler, EmailJob};
pub use sweep_job::{run_sweep, SweepReport};
