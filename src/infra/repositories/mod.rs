//! Repository layer - Data access abstraction
//!
//! Each repository exposes a mockable trait backed by a `*Store` over the
//! shared connection. Query helpers generic over `ConnectionTrait` are
//! shared with the transaction-scoped repositories in `unit_of_work`.

pub(crate) mod booking_repository;
pub(crate) mod entities;
pub(crate) mod infrastructure_repository;
pub(crate) mod question_repository;
pub(crate) mod token_repository;
pub(crate) mod user_repository;

pub use booking_repository::{BookingFilter, BookingRepository, BookingStore, SweepOutcome};
pub use infrastructure_repository::{InfrastructureRepository, InfrastructureStore};
pub use question_repository::{QuestionRepository, QuestionStore};
pub use token_repository::{NewToken, TokenRepository, TokenStore};
pub use user_repository::{UserRepository, UserStore};

// Export mocks for tests (both unit and integration)
#[cfg(any(test, feature = "test-utils"))]
pub use booking_repository::MockBookingRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use infrastructure_repository::MockInfrastructureRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use question_repository::MockQuestionRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use token_repository::MockTokenRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
