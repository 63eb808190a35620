//! In-memory store implementation.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::Stream;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};

use super::evaluator::{apply_update, matches, run_pipeline};
use crate::store::{
    DocumentCollection, DocumentCursor, DocumentStore, FindOptions, StoreError, StoreResult,
};

const NO_FAULT: usize = usize::MAX;

#[derive(Default)]
struct Shared {
    collections: DashMap<String, Vec<Document>>,
    operations: AtomicU64,
    open_cursors: AtomicUsize,
    fault_after: AtomicUsize,
}

/// Document store keeping every collection in process memory.
///
/// Cloning is cheap and clones share the same data, so a test can keep one
/// handle for inspection while the repository under test owns another.
#[derive(Clone)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        let shared = Shared {
            fault_after: AtomicUsize::new(NO_FAULT),
            ..Shared::default()
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Number of collaborator calls served so far.
    pub fn operation_count(&self) -> u64 {
        self.shared.operations.load(Ordering::SeqCst)
    }

    /// Number of cursors handed out and not yet dropped.
    pub fn open_cursors(&self) -> usize {
        self.shared.open_cursors.load(Ordering::SeqCst)
    }

    /// Makes every cursor created from now on fail after yielding `after`
    /// documents. `None` turns fault injection off.
    pub fn fail_cursors_after(&self, after: Option<usize>) {
        self.shared
            .fault_after
            .store(after.unwrap_or(NO_FAULT), Ordering::SeqCst);
    }

    /// Snapshot of a collection in store order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.shared
            .collections
            .get(collection)
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }

    /// Drops every collection. Counters are left untouched.
    pub fn clear(&self) {
        self.shared.collections.clear();
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn collection(&self, name: &str) -> Box<dyn DocumentCollection> {
        Box::new(MemoryCollection {
            name: name.to_string(),
            shared: Arc::clone(&self.shared),
        })
    }
}

struct MemoryCollection {
    name: String,
    shared: Arc<Shared>,
}

impl MemoryCollection {
    fn record(&self) {
        self.shared.operations.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Vec<Document> {
        self.shared
            .collections
            .get(&self.name)
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }

    fn filtered(&self, filter: &Document) -> StoreResult<Vec<Document>> {
        let Some(docs) = self.shared.collections.get(&self.name) else {
            return Ok(Vec::new());
        };
        let mut selected = Vec::new();
        for doc in docs.iter() {
            if matches(doc, filter)? {
                selected.push(doc.clone());
            }
        }
        Ok(selected)
    }

    fn first_match(docs: &[Document], filter: &Document) -> StoreResult<Option<usize>> {
        for (index, doc) in docs.iter().enumerate() {
            if matches(doc, filter)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn cursor(&self, documents: Vec<Document>) -> DocumentCursor {
        let fault_after = match self.shared.fault_after.load(Ordering::SeqCst) {
            NO_FAULT => None,
            after => Some(after),
        };
        self.shared.open_cursors.fetch_add(1, Ordering::SeqCst);
        Box::pin(MemoryCursor {
            items: documents.into_iter(),
            position: 0,
            fault_after,
            exhausted: false,
            shared: Arc::clone(&self.shared),
        })
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<DocumentCursor> {
        self.record();
        let selected = self.filtered(&filter)?;
        let skip = options
            .skip
            .map(|s| usize::try_from(s).unwrap_or(usize::MAX))
            .unwrap_or(0);
        let window: Vec<Document> = match options.limit {
            Some(limit) if limit > 0 => selected
                .into_iter()
                .skip(skip)
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            _ => selected.into_iter().skip(skip).collect(),
        };
        Ok(self.cursor(window))
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> StoreResult<DocumentCursor> {
        self.record();
        let output = run_pipeline(self.snapshot(), &pipeline)?;
        Ok(self.cursor(output))
    }

    async fn count_documents(&self, filter: Document) -> StoreResult<u64> {
        self.record();
        let count = self.filtered(&filter)?.len();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Bson> {
        self.record();
        let id = document
            .get("_id")
            .cloned()
            .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

        let mut stored = Document::new();
        stored.insert("_id", id.clone());
        for (key, value) in document {
            if key != "_id" {
                stored.insert(key, value);
            }
        }

        let mut docs = self.shared.collections.entry(self.name.clone()).or_default();
        if docs.iter().any(|existing| existing.get("_id") == Some(&id)) {
            return Err(StoreError::invalid_query(format!(
                "duplicate key: _id {}",
                id
            )));
        }
        docs.push(stored);
        Ok(id)
    }

    async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
    ) -> StoreResult<Document> {
        self.record();
        let Some(mut docs) = self.shared.collections.get_mut(&self.name) else {
            return Err(StoreError::NoDocuments);
        };
        let Some(index) = Self::first_match(&docs, &filter)? else {
            return Err(StoreError::NoDocuments);
        };
        let mut updated = docs[index].clone();
        apply_update(&mut updated, &update)?;
        docs[index] = updated.clone();
        Ok(updated)
    }

    async fn replace_one(&self, filter: Document, replacement: Document) -> StoreResult<()> {
        self.record();
        let Some(mut docs) = self.shared.collections.get_mut(&self.name) else {
            return Ok(());
        };
        let Some(index) = Self::first_match(&docs, &filter)? else {
            return Ok(());
        };

        let original_id = docs[index].get("_id").cloned().unwrap_or(Bson::Null);
        if let Some(new_id) = replacement.get("_id") {
            if *new_id != original_id {
                return Err(StoreError::invalid_query("field '_id' is immutable"));
            }
        }
        let mut stored = Document::new();
        stored.insert("_id", original_id);
        for (key, value) in replacement {
            if key != "_id" {
                stored.insert(key, value);
            }
        }
        docs[index] = stored;
        Ok(())
    }

    async fn delete_one(&self, filter: Document) -> StoreResult<()> {
        self.record();
        let Some(mut docs) = self.shared.collections.get_mut(&self.name) else {
            return Ok(());
        };
        if let Some(index) = Self::first_match(&docs, &filter)? {
            docs.remove(index);
        }
        Ok(())
    }
}

/// Cursor over a materialised result set.
///
/// Decrements the store's open-cursor gauge when dropped, which is how the
/// tests observe that every read path releases its cursor.
struct MemoryCursor {
    items: std::vec::IntoIter<Document>,
    position: usize,
    fault_after: Option<usize>,
    exhausted: bool,
    shared: Arc<Shared>,
}

impl Stream for MemoryCursor {
    type Item = StoreResult<Document>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.exhausted {
            return Poll::Ready(None);
        }
        if this.fault_after == Some(this.position) {
            this.exhausted = true;
            return Poll::Ready(Some(Err(StoreError::CursorFault {
                position: this.position,
            })));
        }
        match this.items.next() {
            Some(doc) => {
                this.position += 1;
                Poll::Ready(Some(Ok(doc)))
            }
            None => {
                this.exhausted = true;
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.shared.open_cursors.fetch_sub(1, Ordering::SeqCst);
    }
}
