//! Generic document repository.
//!
//! One implementation serves every collection. The element type is chosen by
//! the caller at each call through the container it passes in, so there is no
//! per-entity repository code.

use std::fmt;
use std::sync::Arc;

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{self, Bson, Document, doc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::Instrument;
use validator::Validate;

use super::decode::{decode_all, decode_first};
use super::error::{RepositoryError, RepositoryResult};
use super::pagination::{Page, PageRequest};
use crate::store::{DocumentCollection, FindOptions, StoreHandle};

/// Largest skip or limit the store accepts (its native integer range).
const MAX_WINDOW: u64 = i64::MAX as u64;

/// Repository bound to a single collection.
///
/// Holds only the store handle and the immutable collection name, so cloning
/// is cheap and one instance may be shared across tasks without locking.
#[derive(Clone)]
pub struct GenericRepository {
    store: StoreHandle,
    collection_name: Arc<str>,
}

impl fmt::Debug for GenericRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericRepository")
            .field("collection", &self.collection_name)
            .field("store", &self.store.backend_name())
            .finish()
    }
}

impl GenericRepository {
    /// Creates a repository for `collection_name` on the given store.
    pub fn new(store: StoreHandle, collection_name: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            collection_name: collection_name.into(),
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn collection(&self) -> Box<dyn DocumentCollection> {
        self.store.collection(&self.collection_name)
    }

    fn span(&self, operation: &'static str) -> tracing::Span {
        tracing::debug_span!(
            "repository",
            operation,
            collection = %self.collection_name
        )
    }

    /// Loads every document in the collection.
    ///
    /// There is no upper bound on the number of documents read. Prefer
    /// [`Self::get_all_with_skip_limit`] or [`Self::get_page`] for
    /// collections that can grow large.
    pub async fn get_all<T>(&self, out: &mut Vec<T>) -> RepositoryResult<()>
    where
        T: DeserializeOwned,
    {
        self.find_into(Document::new(), FindOptions::default(), out)
            .instrument(self.span("get_all"))
            .await
    }

    /// Loads the documents matching `filter` inside the store-side window
    /// `skip`/`limit`.
    ///
    /// `limit == 0` is passed to the store unchanged, where it means "no
    /// limit"; it does not mean "return nothing".
    ///
    /// # Errors
    /// `InvalidArgument` if `skip` or `limit` exceed the store's range. No
    /// store call is made in that case.
    pub async fn get_with_skip_limit<T>(
        &self,
        filter: Document,
        out: &mut Vec<T>,
        skip: u64,
        limit: u64,
    ) -> RepositoryResult<()>
    where
        T: DeserializeOwned,
    {
        let span = self.span("get_with_skip_limit");
        async move {
            check_window(skip, limit)?;
            let options = FindOptions::new().skip(skip).limit(limit);
            self.find_into(filter, options, out).await
        }
        .instrument(span)
        .await
    }

    /// Same as [`Self::get_with_skip_limit`] with a match-all filter.
    pub async fn get_all_with_skip_limit<T>(
        &self,
        out: &mut Vec<T>,
        skip: u64,
        limit: u64,
    ) -> RepositoryResult<()>
    where
        T: DeserializeOwned,
    {
        self.get_with_skip_limit(Document::new(), out, skip, limit)
            .await
    }

    /// Loads the first document matching `filter` into `dest`.
    ///
    /// `dest` is only assigned once a document has been decoded successfully.
    ///
    /// # Errors
    /// `EntityNotFound` when nothing matches. `dest` is left as it was.
    pub async fn get_one<T>(&self, filter: Document, dest: &mut T) -> RepositoryResult<()>
    where
        T: DeserializeOwned,
    {
        let span = self.span("get_one");
        async move {
            let options = FindOptions::new().limit(1);
            let mut cursor = self.collection().find(filter, options).await?;
            match decode_first(&mut cursor).await? {
                Some(found) => {
                    *dest = found;
                    Ok(())
                }
                None => Err(RepositoryError::EntityNotFound),
            }
        }
        .instrument(span)
        .await
    }

    /// Loads the document whose `_id` is the ObjectId written as `id` in hex.
    ///
    /// # Errors
    /// `InvalidId` if `id` is not a valid ObjectId, whether or not a matching
    /// document exists. `EntityNotFound` when no document has that id.
    pub async fn get_by_id<T>(&self, id: &str, dest: &mut T) -> RepositoryResult<()>
    where
        T: DeserializeOwned,
    {
        let object_id = ObjectId::parse_str(id)?;
        self.get_by_object_id(object_id, dest).await
    }

    /// Loads the document with the given `_id`.
    pub async fn get_by_object_id<T>(&self, id: ObjectId, dest: &mut T) -> RepositoryResult<()>
    where
        T: DeserializeOwned,
    {
        self.get_one(doc! { "_id": id }, dest).await
    }

    /// Runs an aggregation pipeline and decodes its output.
    ///
    /// The pipeline is forwarded untouched. Unknown or malformed stages are
    /// reported by the store and returned as `RepositoryError::Store`.
    pub async fn aggregate<T>(&self, pipeline: Vec<Document>, out: &mut Vec<T>) -> RepositoryResult<()>
    where
        T: DeserializeOwned,
    {
        let span = self.span("aggregate");
        async move {
            let mut cursor = self.collection().aggregate(pipeline).await?;
            decode_all(&mut cursor, out).await
        }
        .instrument(span)
        .await
    }

    /// Counts every document in the collection.
    pub async fn count_all(&self) -> RepositoryResult<u64> {
        self.count_with_filter(Document::new()).await
    }

    /// Counts the documents matching `filter`. Nothing is decoded.
    pub async fn count_with_filter(&self, filter: Document) -> RepositoryResult<u64> {
        let span = self.span("count");
        async move { Ok(self.collection().count_documents(filter).await?) }
            .instrument(span)
            .await
    }

    /// Inserts `value` as a new document and returns its store-assigned id.
    ///
    /// Equal values inserted twice produce two documents.
    ///
    /// # Errors
    /// `InvalidArgument` if `value` does not serialize to a document.
    /// `UnexpectedIdentifier` if the store assigns an id that is not an
    /// ObjectId.
    pub async fn insert_one<V>(&self, value: &V) -> RepositoryResult<ObjectId>
    where
        V: Serialize + ?Sized,
    {
        let span = self.span("insert_one");
        async move {
            let document = to_document(value)?;
            match self.collection().insert_one(document).await? {
                Bson::ObjectId(id) => Ok(id),
                other => Err(RepositoryError::UnexpectedIdentifier {
                    found: other.to_string(),
                }),
            }
        }
        .instrument(span)
        .await
    }

    /// Applies `update` to the document with the given id.
    ///
    /// When `result` is given, the document as it looks after the update is
    /// decoded into it. When it is `None`, nothing is decoded.
    ///
    /// # Errors
    /// When no document has that id this returns the store's own no-match
    /// error (`RepositoryError::Store(StoreError::NoDocuments)`), not
    /// `EntityNotFound`.
    pub async fn update_one<T>(
        &self,
        id: ObjectId,
        update: Document,
        result: Option<&mut T>,
    ) -> RepositoryResult<()>
    where
        T: DeserializeOwned,
    {
        let span = self.span("update_one");
        async move {
            let updated = self
                .collection()
                .find_one_and_update(doc! { "_id": id }, update)
                .await?;
            if let Some(result) = result {
                *result = bson::from_document(updated)?;
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Replaces the whole document with the given id by `entity`.
    ///
    /// The stored `_id` is kept. Replacing an id that does not exist is not
    /// reported.
    pub async fn replace_one<E>(&self, id: ObjectId, entity: &E) -> RepositoryResult<()>
    where
        E: Serialize + ?Sized,
    {
        let span = self.span("replace_one");
        async move {
            let replacement = to_document(entity)?;
            self.collection()
                .replace_one(doc! { "_id": id }, replacement)
                .await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Deletes the document with the given id.
    ///
    /// Succeeds whether or not a document was deleted.
    pub async fn delete_one(&self, id: ObjectId) -> RepositoryResult<()> {
        let span = self.span("delete_one");
        async move {
            self.collection().delete_one(doc! { "_id": id }).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Loads one page of documents matching `filter`.
    ///
    /// Issues one count and one windowed find.
    ///
    /// # Errors
    /// `InvalidArgument` if `request` fails validation, before any store call.
    pub async fn get_page<T>(&self, filter: Document, request: &PageRequest) -> RepositoryResult<Page<T>>
    where
        T: DeserializeOwned,
    {
        let span = self.span("get_page");
        async move {
            request
                .validate()
                .map_err(|e| RepositoryError::invalid_argument(e.to_string()))?;
            check_window(request.skip(), request.limit())?;

            let total_items = self.collection().count_documents(filter.clone()).await?;
            let options = FindOptions::new()
                .skip(request.skip())
                .limit(request.limit());
            let mut items = Vec::new();
            self.find_into(filter, options, &mut items).await?;

            Ok(Page::new(items, request, total_items))
        }
        .instrument(span)
        .await
    }

    async fn find_into<T>(
        &self,
        filter: Document,
        options: FindOptions,
        out: &mut Vec<T>,
    ) -> RepositoryResult<()>
    where
        T: DeserializeOwned,
    {
        let mut cursor = self.collection().find(filter, options).await?;
        decode_all(&mut cursor, out).await
    }
}

fn check_window(skip: u64, limit: u64) -> RepositoryResult<()> {
    if skip > MAX_WINDOW {
        return Err(RepositoryError::invalid_argument(format!(
            "skip {skip} exceeds the maximum of {MAX_WINDOW}"
        )));
    }
    if limit > MAX_WINDOW {
        return Err(RepositoryError::invalid_argument(format!(
            "limit {limit} exceeds the maximum of {MAX_WINDOW}"
        )));
    }
    Ok(())
}

fn to_document<V>(value: &V) -> RepositoryResult<Document>
where
    V: Serialize + ?Sized,
{
    match bson::to_bson(value)? {
        Bson::Document(document) => Ok(document),
        other => Err(RepositoryError::invalid_argument(format!(
            "expected a document-shaped value, got {:?}",
            other.element_type()
        ))),
    }
}
