//! Collection-level record lookups.
//!
//! A [`Finder`] locates identifiers in its collection and hands back [`Record`]s
//! bound to them. Lookups take a single conditions document; recognized option
//! keys (`fields`, `skip`, `limit`, `sort`, `hint`, `snapshot`, `timeout`) are
//! split off before the filter is sent to the store.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//!
//! let widgets = store.finder("widgets");
//!
//! let red = widgets.first(doc! { "color": "red" }).await?;
//!
//! let mut records = widgets.all(doc! { "count": { "$gt": 1 }, "limit": 10 }).await?;
//! while let Some(record) = records.next().await? {
//!     println!("{}", record.id());
//! }
//! ```

use std::fmt;

use bson::{Document, Uuid, doc};
use futures::Stream;
use tracing::debug;

use crate::{
    backend::{DocumentCursor, ID_FIELD, StoreBackend, document_id},
    codec::Value,
    collection::Collection,
    error::{DocumentStoreError, DocumentStoreResult},
    options::{QueryOptions, split_options},
    record::{Binding, Record},
};

/// Finds and creates records in one collection.
pub struct Finder<'a, B: StoreBackend> {
    collection: Collection<'a, B>,
}

impl<'a, B: StoreBackend> Finder<'a, B> {
    /// Creates a finder over the given collection.
    pub fn new(collection: Collection<'a, B>) -> Self {
        Self { collection }
    }

    /// Returns the collection this finder searches.
    pub fn collection(&self) -> &Collection<'a, B> {
        &self.collection
    }

    /// Creates a new, empty record. See [`Record::create`].
    pub async fn create(&self) -> DocumentStoreResult<Record<'a, B>> {
        Record::create(self.collection.clone()).await
    }

    /// Creates a new record with initial fields. See [`Record::create_with`].
    pub async fn create_with<I, K, V>(&self, fields: I) -> DocumentStoreResult<Record<'a, B>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Record::create_with(self.collection.clone(), fields).await
    }

    /// Returns the record with the given identifier, or `None` if no such document exists.
    pub async fn find(&self, id: Uuid) -> DocumentStoreResult<Option<Record<'a, B>>> {
        let found = self
            .collection
            .find_one(
                doc! { ID_FIELD: id },
                QueryOptions::new().with_fields([ID_FIELD]),
            )
            .await?;

        debug!(target: "docproxy::finder", collection = self.collection.name(), %id, found = found.is_some(), "Record lookup");

        match found {
            Some(_) => Ok(Some(
                Record::bind(self.collection.clone(), Binding::Known(id)).await?,
            )),
            None => Ok(None),
        }
    }

    /// Returns the first record matching `conditions`, or `None`.
    pub async fn first(&self, conditions: Document) -> DocumentStoreResult<Option<Record<'a, B>>> {
        let (filter, options) = split_options(conditions);

        match self.collection.find_one(filter, options).await? {
            Some(document) => self.find(document_id(&document)?).await,
            None => Ok(None),
        }
    }

    /// Returns a lazy, single-pass sequence of the records matching `conditions`.
    ///
    /// The sequence owns an open store cursor until it is exhausted, closed, or dropped.
    /// Calling `all` again opens a fresh cursor.
    pub async fn all(&self, conditions: Document) -> DocumentStoreResult<Records<'a, B>> {
        let (filter, options) = split_options(conditions);

        debug!(target: "docproxy::finder", collection = self.collection.name(), ?filter, "Opening cursor");

        let cursor = self.collection.find(filter, options).await?;

        Ok(Records {
            collection: self.collection.clone(),
            cursor: Some(cursor),
        })
    }
}

impl<B: StoreBackend> Clone for Finder<'_, B> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
        }
    }
}

impl<B: StoreBackend> fmt::Debug for Finder<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finder")
            .field("collection", &self.collection.name())
            .finish()
    }
}

/// A lazy sequence of records backed by a store cursor.
///
/// Records are produced one at a time as the cursor advances; the result set is
/// never collected in memory. The cursor is released when the sequence is
/// exhausted, when [`close`](Records::close) is called, or when it is dropped.
pub struct Records<'a, B: StoreBackend> {
    collection: Collection<'a, B>,
    cursor: Option<Box<dyn DocumentCursor>>,
}

impl<'a, B: StoreBackend> Records<'a, B> {
    /// Advances to the next record, or returns `None` once the sequence is exhausted.
    pub async fn next(&mut self) -> DocumentStoreResult<Option<Record<'a, B>>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        let next = cursor.next_document().await?;

        match next {
            Some(document) => Ok(Some(
                Record::bind(self.collection.clone(), Binding::Known(document_id(&document)?)).await?,
            )),
            None => {
                self.release().await?;
                Ok(None)
            }
        }
    }

    /// Returns whether the underlying cursor has been released.
    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_none()
    }

    /// Releases the underlying cursor without reading the remaining records.
    pub async fn close(mut self) -> DocumentStoreResult<()> {
        self.release().await
    }

    /// Converts the sequence into a [`Stream`] of records.
    pub fn into_stream(self) -> impl Stream<Item = DocumentStoreResult<Record<'a, B>>> + Send + 'a
    where
        B: 'a,
    {
        futures::stream::try_unfold(self, |mut records| async move {
            Ok::<_, DocumentStoreError>(records.next().await?.map(|record| (record, records)))
        })
    }

    async fn release(&mut self) -> DocumentStoreResult<()> {
        if let Some(cursor) = self.cursor.take() {
            debug!(target: "docproxy::finder", collection = self.collection.name(), "Releasing cursor");
            cursor.close().await?;
        }

        Ok(())
    }
}

impl<B: StoreBackend> fmt::Debug for Records<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Records")
            .field("collection", &self.collection.name())
            .field("exhausted", &self.is_exhausted())
            .finish()
    }
}
