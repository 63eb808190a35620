//! Data Transfer Objects for API responses.

mod error;

pub use error::ErrorResponse;
