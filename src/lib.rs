//! Ori-Kit Library
//!
//! Generic document repository over a MongoDB-style store, with token
//! authentication middleware for axum.

pub mod api;
pub mod config;
pub mod error;
pub mod logger;
pub mod repositories;
pub mod state;
pub mod store;
pub mod utils;

pub use state::AppState;
