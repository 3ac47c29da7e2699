//! Shared request and response types.

mod pagination;
mod response;

pub use pagination::{BookingPage, Paginated, PaginationMeta, PaginationParams, UserPage};
pub use response::{Created, MessageResponse, NoContent};
