//! Document store collaborator.
//!
//! The repository layer never talks to a driver directly. It goes through the
//! [`DocumentStore`] / [`DocumentCollection`] traits so the same repository code
//! runs against MongoDB in production and [`memory::InMemoryStore`] in tests.

pub mod error;
pub mod memory;
pub mod mongo;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use mongodb::bson::{Bson, Document};

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use mongo::MongoStore;

/// Forward-only stream of raw documents returned by a store query.
///
/// Dropping the cursor releases it. Backends hold their server-side
/// resources for exactly as long as the cursor value is alive.
pub type DocumentCursor = BoxStream<'static, StoreResult<Document>>;

/// Store-level query options.
///
/// Skip and limit are applied by the store, never in application memory.
/// A limit of `0` follows the MongoDB convention and means "no limit".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Handle to a named collection inside a document store.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Runs a filtered query and returns a cursor over the matching documents.
    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<DocumentCursor>;

    /// Runs an aggregation pipeline. Stage validation is the store's job.
    async fn aggregate(&self, pipeline: Vec<Document>) -> StoreResult<DocumentCursor>;

    /// Counts the documents matching `filter` without returning them.
    async fn count_documents(&self, filter: Document) -> StoreResult<u64>;

    /// Inserts one document and returns the identifier assigned by the store.
    async fn insert_one(&self, document: Document) -> StoreResult<Bson>;

    /// Applies `update` to the first document matching `filter` and returns the
    /// document as it looks after the update.
    ///
    /// Fails with [`StoreError::NoDocuments`] when nothing matched.
    async fn find_one_and_update(&self, filter: Document, update: Document)
    -> StoreResult<Document>;

    /// Replaces the first document matching `filter`.
    async fn replace_one(&self, filter: Document, replacement: Document) -> StoreResult<()>;

    /// Deletes the first document matching `filter`. Deleting nothing is not an error.
    async fn delete_one(&self, filter: Document) -> StoreResult<()>;
}

/// A document store able to hand out collection handles.
pub trait DocumentStore: Send + Sync {
    /// Short backend name used in diagnostics.
    fn name(&self) -> &str;

    /// Returns a handle bound to the named collection.
    fn collection(&self, name: &str) -> Box<dyn DocumentCollection>;
}

/// Process-wide store handle.
///
/// Built once by the composition root and cloned into every repository.
/// Cloning only bumps a reference count.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<dyn DocumentStore>,
}

impl StoreHandle {
    pub fn new<S>(store: S) -> Self
    where
        S: DocumentStore + 'static,
    {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an already shared store, keeping the caller's reference usable
    /// (tests keep one to read the in-memory counters).
    pub fn from_arc(store: Arc<dyn DocumentStore>) -> Self {
        Self { inner: store }
    }

    pub fn collection(&self, name: &str) -> Box<dyn DocumentCollection> {
        self.inner.collection(name)
    }

    pub fn backend_name(&self) -> &str {
        self.inner.name()
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("backend", &self.inner.name())
            .finish()
    }
}
