//! Middleware components for request processing.
//!
//! This module contains token authentication and the error-to-response
//! mapping.

mod auth;
mod error_handler;

pub use auth::{AuthGuard, AuthUser, authenticate, bearer_token, optional_authenticate};
pub use error_handler::{error_to_code, error_to_status_code};
