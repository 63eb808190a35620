//! HTTP integration layer for axum.
//!
//! Provides the authentication middleware and the JSON error body returned
//! when an [`AppError`](crate::error::AppError) becomes a response.

pub mod dto;
pub mod middleware;
