//! A named collection bound to a storage backend.
//!
//! [`Collection`] is the explicit binding between records and the place their
//! documents live. Finders and records receive it at construction; nothing is
//! looked up from ambient state.

use bson::{Document, Uuid};
use std::fmt;

use crate::{
    backend::{DocumentCursor, StoreBackend, UpdateOutcome},
    error::DocumentStoreResult,
    finder::Finder,
    options::QueryOptions,
};

/// A collection name paired with a reference to a storage backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
/// * `B` - The storage backend type
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    /// Binds a collection name to a backend.
    pub fn new(name: impl Into<String>, backend: &'a B) -> Self {
        Self { name: name.into(), backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the backend this collection is bound to.
    pub fn backend(&self) -> &'a B {
        self.backend
    }

    /// Returns a finder over this collection.
    pub fn finder(&self) -> Finder<'a, B> {
        Finder::new(self.clone())
    }

    /// Inserts a document and returns its store-assigned identifier.
    pub async fn insert(&self, document: Document) -> DocumentStoreResult<Uuid> {
        self.backend
            .insert_document(document, &self.name)
            .await
    }

    /// Returns the first document matching `filter`.
    pub async fn find_one(
        &self,
        filter: Document,
        options: QueryOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        self.backend
            .find_one(filter, options, &self.name)
            .await
    }

    /// Opens a cursor over the documents matching `filter`.
    pub async fn find(
        &self,
        filter: Document,
        options: QueryOptions,
    ) -> DocumentStoreResult<Box<dyn DocumentCursor>> {
        self.backend
            .find(filter, options, &self.name)
            .await
    }

    /// Applies an operator document to the first document matching `filter`.
    pub async fn update(
        &self,
        filter: Document,
        update: Document,
    ) -> DocumentStoreResult<UpdateOutcome> {
        self.backend
            .update_one(filter, update, &self.name)
            .await
    }

    /// Deletes a document by identifier.
    pub async fn delete(&self, id: Uuid) -> DocumentStoreResult<bool> {
        self.backend
            .delete_document(id, &self.name)
            .await
    }
}

impl<B: StoreBackend> Clone for Collection<'_, B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            backend: self.backend,
        }
    }
}

impl<B: StoreBackend> fmt::Debug for Collection<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
