//! In-memory document store.
//!
//! A thread-safe, process-local implementation of the store collaborator,
//! used by the test suite and handy for development without a MongoDB
//! server. Collections keep insertion order, which acts as the store's
//! natural ordering.

mod evaluator;
mod store;

pub use store::InMemoryStore;
