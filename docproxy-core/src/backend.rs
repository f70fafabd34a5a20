//! Storage backend abstraction for record proxies.
//!
//! This module defines the driver surface that records and finders are built on:
//! point lookups, cursor-based queries, inserts that assign identifiers, and
//! updates expressed as atomic operator documents (`$set`, `$push`, `$inc`).
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DocumentCursor`]: A forward-only handle over the results of a query
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docproxy::backend::StoreBackend;
//! use docproxy::options::QueryOptions;
//! use bson::doc;
//!
//! let id = backend.insert_document(doc! {}, "widgets").await?;
//! backend.update_one(doc! { "_id": id }, doc! { "$set": { "color": "red" } }, "widgets").await?;
//! let found = backend.find_one(doc! { "_id": id }, QueryOptions::new(), "widgets").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document, Uuid, spec::BinarySubtype};
use std::fmt::Debug;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    options::QueryOptions,
};

/// Name of the identifier field in every stored document.
pub const ID_FIELD: &str = "_id";

/// Result of an atomic update against a single document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Number of documents matched by the update filter.
    pub matched: u64,
    /// Number of documents actually changed.
    pub modified: u64,
}

/// Forward-only, single-pass handle over the documents matched by a query.
///
/// A cursor holds a store-side resource until it is exhausted, closed, or dropped.
#[async_trait]
pub trait DocumentCursor: Send {
    /// Fetches the next matching document, or `None` once the cursor is exhausted.
    async fn next_document(&mut self) -> DocumentStoreResult<Option<Document>>;

    /// Releases the cursor without reading the remaining documents.
    async fn close(self: Box<Self>) -> DocumentStoreResult<()>;
}

/// Abstract interface for document storage backends.
///
/// Every method is one round trip to the store. Implementations are required to
/// be thread-safe (`Send + Sync`) but the record layer never issues concurrent
/// calls on its own.
///
/// # Error Handling
///
/// Connection failures should be reported as
/// [`DocumentStoreError::StoreUnavailable`](crate::error::DocumentStoreError::StoreUnavailable),
/// everything else the store rejects as
/// [`DocumentStoreError::StoreOperationFailed`](crate::error::DocumentStoreError::StoreOperationFailed).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts a document and returns the identifier the store assigned to it.
    ///
    /// # Arguments
    ///
    /// * `document` - The document to insert; must not carry an `_id`
    /// * `collection` - The name of the collection to insert into. Created automatically if it doesn't exist.
    async fn insert_document(
        &self,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<Uuid>;

    /// Returns the first document matching `filter`, if any.
    ///
    /// Honours the `fields`, `skip`, `sort` and `hint` options. A projected document
    /// always keeps its `_id`.
    async fn find_one(
        &self,
        filter: Document,
        options: QueryOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Opens a cursor over every document matching `filter`.
    async fn find(
        &self,
        filter: Document,
        options: QueryOptions,
        collection: &str,
    ) -> DocumentStoreResult<Box<dyn DocumentCursor>>;

    /// Applies an operator document to the first document matching `filter`.
    ///
    /// Type mismatches between an operator and the stored field (for example
    /// `$push` on a string) are reported by the store, not checked up front.
    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Deletes the document with the given identifier. Returns whether a document was removed.
    async fn delete_document(&self, id: Uuid, collection: &str) -> DocumentStoreResult<bool>;

    /// Drops (deletes) a collection and all its documents.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn insert_document(
        &self,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<Uuid> {
        (*self)
            .insert_document(document, collection)
            .await
    }

    async fn find_one(
        &self,
        filter: Document,
        options: QueryOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        (*self)
            .find_one(filter, options, collection)
            .await
    }

    async fn find(
        &self,
        filter: Document,
        options: QueryOptions,
        collection: &str,
    ) -> DocumentStoreResult<Box<dyn DocumentCursor>> {
        (*self)
            .find(filter, options, collection)
            .await
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        (*self)
            .update_one(filter, update, collection)
            .await
    }

    async fn delete_document(&self, id: Uuid, collection: &str) -> DocumentStoreResult<bool> {
        (*self)
            .delete_document(id, collection)
            .await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (*self).drop_collection(name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        (*self).list_collections().await
    }
}

/// Factory trait for creating configured backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}

/// Reads the identifier of a stored document.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] if `_id` is missing or is not a UUID.
pub fn document_id(document: &Document) -> DocumentStoreResult<Uuid> {
    match document.get(ID_FIELD) {
        Some(Bson::Binary(binary)) if binary.subtype == BinarySubtype::Uuid => {
            <[u8; 16]>::try_from(binary.bytes.as_slice())
                .map(Uuid::from_bytes)
                .map_err(|_| {
                    DocumentStoreError::InvalidDocument("`_id` is not a 16-byte UUID".to_string())
                })
        }
        Some(other) => Err(DocumentStoreError::InvalidDocument(format!(
            "`_id` is not a UUID: {other}"
        ))),
        None => Err(DocumentStoreError::InvalidDocument(
            "document has no `_id`".to_string(),
        )),
    }
}
