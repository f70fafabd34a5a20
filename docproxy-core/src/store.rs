//! Main entry point for working with records.
//!
//! [`DocumentStore`] owns a backend and hands out collection bindings and
//! finders over it.
//!
//! # Example
//!
//! ```ignore
//! use docproxy::store::DocumentStore;
//!
//! let store = DocumentStore::new(backend);
//! let widgets = store.finder("widgets");
//! let widget = widgets.create().await?;
//! ```

use crate::{
    backend::StoreBackend,
    collection::Collection,
    error::DocumentStoreResult,
    finder::Finder,
    model::Model,
};

/// A document store bound to a specific backend implementation.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the backend this store wraps.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Binds a collection by name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name, &self.backend)
    }

    /// Returns a finder over the named collection.
    pub fn finder<'a>(&'a self, name: &str) -> Finder<'a, B> {
        Finder::new(self.collection(name))
    }

    /// Returns a finder over the collection of model `M`.
    ///
    /// The collection name is determined by the model's `collection_name()` method.
    pub fn model_finder<'a, M: Model>(&'a self) -> Finder<'a, B> {
        self.finder(M::collection_name())
    }

    /// Drops (deletes) a collection with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection does not exist or deletion fails.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_collection(name).await
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Shuts down the store and releases backend resources.
    ///
    /// This consumes the store and should be called when no longer needed.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await?;

        Ok(())
    }
}
