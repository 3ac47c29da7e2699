//! Application services layer - use cases over the Unit of Work.
//!
//! Each service is a trait object so handlers and tests can swap
//! implementations. The booking request processor and the status
//! transition handler live in `booking_workflow`.

mod access;
mod auth_service;
mod booking_service;
pub mod booking_workflow;
pub mod container;
mod guest_service;
mod infrastructure_service;
mod notifications;
mod timeslot_service;
mod user_service;

pub use container::{ServiceContainer, Services};

pub use auth_service::{issue_access_token, AuthService, Authenticator, Claims, TokenResponse};
pub use booking_service::{BookingDetails, BookingManager, BookingQuery, BookingService};
pub use booking_workflow::{
    process_booking_request, update_booking_status, BookingRequest, BookingRequestOutcome,
    StatusChangeOutcome,
};
pub use guest_service::{
    GuestBookingManager, GuestBookingRequest, GuestBookingService, GuestBookingStarted,
};
pub use infrastructure_service::{InfrastructureManager, InfrastructureService};
pub use notifications::Notifications;
pub use timeslot_service::{
    plan_windows, DeletedTimeslots, GeneratedTimeslots, SlotPlan, TimeslotManager,
    TimeslotService,
};
pub use user_service::{UserManager, UserService};

#[cfg(any(test, feature = "test-utils"))]
pub use auth_service::MockAuthService;
#[cfg(any(test, feature = "test-utils"))]
pub use booking_service::MockBookingService;
#[cfg(any(test, feature = "test-utils"))]
pub use container::MockServiceContainer;
#[cfg(any(test, feature = "test-utils"))]
pub use guest_service::MockGuestBookingService;
#[cfg(any(test, feature = "test-utils"))]
pub use infrastructure_service::MockInfrastructureService;
#[cfg(any(test, feature = "test-utils"))]
pub use timeslot_service::MockTimeslotService;
#[cfg(any(test, feature = "test-utils"))]
pub use user_service::MockUserService;
