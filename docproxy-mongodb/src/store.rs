use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, Uuid, doc};
use mongodb::{
    Client, Collection as MongoCollection, Cursor,
    error::{Error as MongoError, ErrorKind},
    options::{ClientOptions, FindOneOptions, FindOptions, Hint as MongoHint},
};
use tracing::{debug, warn};
use docproxy_core::{
    backend::{DocumentCursor, ID_FIELD, StoreBackend, StoreBackendBuilder, UpdateOutcome},
    error::{DocumentStoreError, DocumentStoreResult},
    options::{Hint, QueryOptions},
};

use crate::{config::MongoDbConfig, sanitizer::ValueSanitizer};


/// Maps driver failures onto store errors; connectivity problems are reported as unavailability.
fn store_error(error: MongoError) -> DocumentStoreError {
    match error.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. } => DocumentStoreError::StoreUnavailable(error.to_string()),
        _ => DocumentStoreError::StoreOperationFailed(error.to_string()),
    }
}

fn hint(options: &QueryOptions) -> DocumentStoreResult<Option<MongoHint>> {
    Ok(options.hint()?.map(|hint| match hint {
        Hint::Name(name) => MongoHint::Name(name),
        Hint::Keys(keys) => MongoHint::Keys(keys),
    }))
}


#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&ValueSanitizer::sanitize_string(collection_name))
    }

    fn warn_unsupported(options: &QueryOptions, collection: &str) -> DocumentStoreResult<()> {
        if options.snapshot()?.is_some() {
            warn!(target: "docproxy::mongodb", collection, "The snapshot option is not supported by the server and is ignored");
        }

        Ok(())
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_document(&self, document: Document, collection: &str) -> DocumentStoreResult<Uuid> {
        if document.contains_key(ID_FIELD) {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "inserted documents must not carry `{ID_FIELD}`; it is assigned by the store"
            )));
        }

        let id = Uuid::new();
        let mut prepared = doc! { ID_FIELD: id };
        for (key, value) in ValueSanitizer::sanitize_fields(&document) {
            prepared.insert(key, value);
        }

        self.get_collection(collection)
            .insert_one(prepared)
            .await
            .map_err(store_error)?;

        debug!(target: "docproxy::mongodb", collection, %id, "Inserted document");

        Ok(id)
    }

    async fn find_one(
        &self,
        filter: Document,
        options: QueryOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        Self::warn_unsupported(&options, collection)?;

        let mut find_options = FindOneOptions::default();
        find_options.projection = options.projection()?;
        find_options.skip = options.skip()?;
        find_options.sort = options.sort_document()?;
        find_options.hint = hint(&options)?;

        Ok(
            self.get_collection(collection)
                .find_one(ValueSanitizer::sanitize_filter(&filter))
                .with_options(find_options)
                .await
                .map_err(store_error)?
                .map(|document| ValueSanitizer::restore_fields(&document))
        )
    }

    async fn find(
        &self,
        filter: Document,
        options: QueryOptions,
        collection: &str,
    ) -> DocumentStoreResult<Box<dyn DocumentCursor>> {
        Self::warn_unsupported(&options, collection)?;

        let mut find_options = FindOptions::default();
        find_options.projection = options.projection()?;
        find_options.skip = options.skip()?;
        find_options.limit = options.limit()?.filter(|limit| *limit != 0);
        find_options.sort = options.sort_document()?;
        find_options.hint = hint(&options)?;

        if options.timeout()? == Some(false) {
            find_options.no_cursor_timeout = Some(true);
        }

        let cursor = self
            .get_collection(collection)
            .find(ValueSanitizer::sanitize_filter(&filter))
            .with_options(find_options)
            .await
            .map_err(store_error)?;

        debug!(target: "docproxy::mongodb", collection, "Opened cursor");

        Ok(Box::new(MongoCursor { cursor }))
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let result = self
            .get_collection(collection)
            .update_one(
                ValueSanitizer::sanitize_filter(&filter),
                ValueSanitizer::sanitize_update(&update),
            )
            .await
            .map_err(store_error)?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_document(&self, id: Uuid, collection: &str) -> DocumentStoreResult<bool> {
        let result = self
            .get_collection(collection)
            .delete_one(doc! { ID_FIELD: id })
            .await
            .map_err(store_error)?;

        Ok(result.deleted_count > 0)
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(store_error)?;

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(
            self.client
                .database(&self.database)
                .list_collection_names()
                .await
                .map_err(store_error)?
                .into_iter()
                .map(|name| ValueSanitizer::restore_string(&name))
                .collect()
        )
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.shutdown().await
    }
}


/// Server-side cursor. Dropping it kills the cursor on the server.
struct MongoCursor {
    cursor: Cursor<Document>,
}

#[async_trait]
impl DocumentCursor for MongoCursor {
    async fn next_document(&mut self) -> DocumentStoreResult<Option<Document>> {
        Ok(
            self.cursor
                .try_next()
                .await
                .map_err(store_error)?
                .map(|document| ValueSanitizer::restore_fields(&document))
        )
    }

    async fn close(self: Box<Self>) -> DocumentStoreResult<()> {
        drop(self);

        Ok(())
    }
}


pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    app_name: Option<String>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            app_name: None,
        }
    }

    pub fn from_config(config: MongoDbConfig) -> Self {
        Self {
            dsn: config.uri,
            database: config.database,
            app_name: config.app_name,
        }
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        if let Some(app_name) = self.app_name {
            options.app_name = Some(app_name);
        }

        debug!(target: "docproxy::mongodb", database = %self.database, "Connecting");

        Ok(MongoDbStore::new(
            Client::with_options(options)
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
