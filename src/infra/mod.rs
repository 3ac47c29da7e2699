//! Infrastructure layer - External systems integration
//!
//! - Database connections, migrations and repositories
//! - Unit of Work for transaction management
//! - In-memory rate limiter
//! - File storage for uploads
//! - Email hand-off (queue) and delivery (SMTP)

pub mod db;
pub mod mailer;
pub mod notifier;
pub mod rate_limiter;
pub mod repositories;
pub mod storage;
pub mod unit_of_work;

pub use db::{Database, Migrator};
pub use mailer::EmailSender;
pub use notifier::{LogNotifier, Notifier, QueueNotifier};
pub use rate_limiter::{RateDecision, RateLimiter};
pub use repositories::{
    BookingFilter, BookingRepository, InfrastructureRepository, NewToken, QuestionRepository,
    SweepOutcome, TokenRepository, UserRepository,
};
pub use storage::{FileStorage, StoredFile};
pub use unit_of_work::{
    Persistence, TransactionContext, TxBookingRepository, TxFuture, TxInfrastructureRepository,
    TxQuestionRepository, TxTokenRepository, TxUserRepository, UnitOfWork,
};

#[cfg(any(test, feature = "test-utils"))]
pub use notifier::MockNotifier;
#[cfg(any(test, feature = "test-utils"))]
pub use repositories::{
    MockBookingRepository, MockInfrastructureRepository, MockQuestionRepository,
    MockTokenRepository, MockUserRepository,
};
