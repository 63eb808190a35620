//! MongoDB document store backend.
//!
//! Thin adapter over the official `mongodb` driver. Connection pooling,
//! retries and per-request timeouts are the driver's business and are
//! configured once when the client is built.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use mongodb::bson::{Bson, Document};
use mongodb::options::{ClientOptions, FindOptions as DriverFindOptions, ReturnDocument};
use mongodb::{Client, Collection, Database};

use crate::config::DatabaseConfig;
use crate::store::{
    DocumentCollection, DocumentCursor, DocumentStore, FindOptions, StoreError, StoreResult,
};

/// Document store backed by a MongoDB database.
///
/// `Client` is internally reference counted, so the store can be shared
/// freely once wrapped in a [`crate::store::StoreHandle`].
#[derive(Clone, Debug)]
pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    /// Connects to the server described by `config` and binds the named database.
    ///
    /// # Errors
    /// Returns `StoreError::Driver` if the URL cannot be parsed or the client
    /// cannot be created.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let mut options = ClientOptions::parse(&config.url).await?;
        options.connect_timeout = Some(Duration::from_secs(config.connect_timeout));
        options.server_selection_timeout =
            Some(Duration::from_secs(config.server_selection_timeout));
        if options.app_name.is_none() {
            options.app_name = config.app_name.clone();
        }

        let client = Client::with_options(options)?;
        let database = client.database(&config.name);

        tracing::info!(
            database = %config.name,
            connect_timeout = %config.connect_timeout,
            "MongoDB client initialized"
        );

        Ok(Self { client, database })
    }

    /// Builds a store around an existing client.
    pub fn from_client(client: Client, database_name: &str) -> Self {
        let database = client.database(database_name);
        Self { client, database }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}

impl DocumentStore for MongoStore {
    fn name(&self) -> &str {
        "mongodb"
    }

    fn collection(&self, name: &str) -> Box<dyn DocumentCollection> {
        Box::new(MongoCollection {
            inner: self.database.collection::<Document>(name),
        })
    }
}

struct MongoCollection {
    inner: Collection<Document>,
}

fn into_cursor(cursor: mongodb::Cursor<Document>) -> DocumentCursor {
    cursor.map(|item| item.map_err(StoreError::from)).boxed()
}

#[async_trait]
impl DocumentCollection for MongoCollection {
    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<DocumentCursor> {
        let mut driver_options = DriverFindOptions::default();
        driver_options.skip = options.skip;
        // Callers validate the range; saturate rather than wrap if one slips through.
        driver_options.limit = options
            .limit
            .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX));

        let cursor = self.inner.find(filter).with_options(driver_options).await?;
        Ok(into_cursor(cursor))
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> StoreResult<DocumentCursor> {
        let cursor = self.inner.aggregate(pipeline).await?;
        Ok(into_cursor(cursor))
    }

    async fn count_documents(&self, filter: Document) -> StoreResult<u64> {
        Ok(self.inner.count_documents(filter).await?)
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Bson> {
        let result = self.inner.insert_one(document).await?;
        Ok(result.inserted_id)
    }

    async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
    ) -> StoreResult<Document> {
        self.inner
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or(StoreError::NoDocuments)
    }

    async fn replace_one(&self, filter: Document, replacement: Document) -> StoreResult<()> {
        self.inner.replace_one(filter, replacement).await?;
        Ok(())
    }

    async fn delete_one(&self, filter: Document) -> StoreResult<()> {
        self.inner.delete_one(filter).await?;
        Ok(())
    }
}
