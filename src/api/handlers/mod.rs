//! HTTP request handlers.

pub mod auth_handler;
pub mod booking_handler;
pub mod guest_handler;
pub mod infrastructure_handler;
pub mod upload_handler;
pub mod user_handler;

pub use auth_handler::auth_routes;
pub use booking_handler::{booking_routes, public_booking_routes};
pub use guest_handler::guest_routes;
pub use infrastructure_handler::{infrastructure_routes, public_infrastructure_routes};
pub use upload_handler::upload_routes;
pub use user_handler::user_routes;
