//! In-memory storage implementation for record proxies.
//!
//! Documents are kept as BSON in insertion order, grouped by collection, behind
//! an async-aware read-write lock.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, Uuid, doc};
use tracing::debug;

use docproxy_core::{
    backend::{DocumentCursor, ID_FIELD, StoreBackend, StoreBackendBuilder, UpdateOutcome, document_id},
    error::{DocumentStoreError, DocumentStoreResult},
    options::{QueryOptions, SortDirection},
    query::Expr,
};

use crate::{
    evaluator::{DocumentEvaluator, sort_order},
    update::apply_update,
};

/// Documents of one collection keyed by identifier, in insertion order.
type CollectionMap = Document;
type StoreMap = HashMap<String, CollectionMap>;


/// Thread-safe in-memory document storage backend.
///
/// Identifiers are random UUIDs assigned on insert. Filters support the
/// comparison, membership, existence and logical operators; updates support
/// `$set`, `$unset`, `$push` and `$inc` on top-level fields.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Cursors
///
/// [`find`](StoreBackend::find) snapshots the identifiers that match and fetches
/// each document as the cursor advances, so documents deleted mid-iteration are
/// skipped. The number of cursors not yet released is available through
/// [`open_cursors`](InMemoryStore::open_cursors).
///
/// # Example
///
/// ```ignore
/// use docproxy_memory::InMemoryStore;
/// use docproxy_core::{backend::StoreBackend, options::QueryOptions};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let id = store.insert_document(doc! { "name": "Alice" }, "users").await?;
/// let found = store.find_one(doc! { "_id": id }, QueryOptions::new(), "users").await?;
/// assert!(found.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// The main storage map: collection_name -> (document_id -> document)
    store: Arc<RwLock<StoreMap>>,
    /// Cursors handed out by `find` and not yet released
    open_cursors: Arc<AtomicUsize>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns the number of cursors that have been opened and not yet released.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Returns the number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map(Document::len)
            .unwrap_or(0)
    }
}

/// Returns the matching documents in result order, with skip and limit applied.
fn select<'s>(
    collection_map: &'s CollectionMap,
    filter: &Document,
    options: &QueryOptions,
) -> DocumentStoreResult<Vec<&'s Document>> {
    let mut matched = match direct_lookup(filter) {
        Some(key) => collection_map
            .get_document(key)
            .ok()
            .into_iter()
            .collect::<Vec<_>>(),
        None => {
            let expr = Expr::parse(filter)?;
            let mut matched = Vec::new();

            for document in collection_map.values().filter_map(Bson::as_document) {
                if DocumentEvaluator::new(document).evaluate(&expr)? {
                    matched.push(document);
                }
            }

            matched
        }
    };

    let sort = options.sort()?;

    if !sort.is_empty() {
        matched.sort_by(|a, b| {
            sort.iter()
                .map(|(field, direction)| {
                    let ordering = sort_order(a.get(field), b.get(field));

                    match direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    let skip = options.skip()?.unwrap_or(0) as usize;
    let limit = match options.limit()? {
        Some(0) | None => usize::MAX,
        Some(limit) => limit.unsigned_abs() as usize,
    };

    Ok(matched.into_iter().skip(skip).take(limit).collect())
}

/// Recognizes filters of the form `{ "_id": <uuid> }` and returns the storage key.
fn direct_lookup(filter: &Document) -> Option<String> {
    if filter.len() != 1 {
        return None;
    }

    document_id(filter).ok().map(|id| id.to_string())
}

/// Storage key of a stored document.
fn key_of(document: &Document) -> DocumentStoreResult<String> {
    Ok(document_id(document)?.to_string())
}

/// Restricts a document to the requested fields. `_id` is always kept.
fn project(document: &Document, fields: &[String]) -> Document {
    if fields.is_empty() {
        return document.clone();
    }

    document
        .iter()
        .filter(|(key, _)| key.as_str() == ID_FIELD || fields.iter().any(|field| field == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_document(&self, document: Document, collection: &str) -> DocumentStoreResult<Uuid> {
        if document.contains_key(ID_FIELD) {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "inserted documents must not carry `{ID_FIELD}`; it is assigned by the store"
            )));
        }

        let id = Uuid::new();
        let mut stored = doc! { ID_FIELD: id };
        for (key, value) in document {
            stored.insert(key, value);
        }

        self.store
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), stored);

        debug!(target: "docproxy::memory", collection, %id, "Inserted document");

        Ok(id)
    }

    async fn find_one(
        &self,
        filter: Document,
        options: QueryOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(None);
        };

        let fields = options.fields()?;

        Ok(
            select(collection_map, &filter, &options.with_limit(1))?
                .first()
                .map(|document| project(document, &fields))
        )
    }

    async fn find(
        &self,
        filter: Document,
        options: QueryOptions,
        collection: &str,
    ) -> DocumentStoreResult<Box<dyn DocumentCursor>> {
        let ids = {
            let store = self.store.read().await;

            match store.get(collection) {
                Some(collection_map) => select(collection_map, &filter, &options)?
                    .into_iter()
                    .map(key_of)
                    .collect::<DocumentStoreResult<VecDeque<_>>>()?,
                None => VecDeque::new(),
            }
        };

        if options.hint()?.is_some() {
            debug!(target: "docproxy::memory", collection, "Ignoring index hint");
        }

        let fields = options.fields()?;

        debug!(target: "docproxy::memory", collection, matched = ids.len(), "Opened cursor");

        self.open_cursors.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryCursor {
            store: self.store.clone(),
            open_cursors: self.open_cursors.clone(),
            collection: collection.to_string(),
            fields,
            ids,
            released: false,
        }))
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        let Some(collection_map) = store.get_mut(collection) else {
            return Ok(UpdateOutcome::default());
        };

        let key = select(collection_map, &filter, &QueryOptions::new().with_limit(1))?
            .first()
            .copied()
            .map(key_of)
            .transpose()?;

        let Some(document) = key
            .as_deref()
            .and_then(|key| collection_map.get_document_mut(key).ok())
        else {
            return Ok(UpdateOutcome::default());
        };

        let modified = apply_update(document, &update)?;

        debug!(target: "docproxy::memory", collection, ?key, modified, "Updated document");

        Ok(UpdateOutcome {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn delete_document(&self, id: Uuid, collection: &str) -> DocumentStoreResult<bool> {
        let mut store = self.store.write().await;

        Ok(
            store
                .get_mut(collection)
                .and_then(|collection_map| collection_map.remove(id.to_string()))
                .is_some()
        )
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        if store.remove(name).is_none() {
            return Err(DocumentStoreError::StoreOperationFailed(format!(
                "collection {name} does not exist"
            )));
        }

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(
            self.store
                .read()
                .await
                .keys()
                .cloned()
                .collect()
        )
    }
}


/// Cursor over a snapshot of matching identifiers.
struct MemoryCursor {
    store: Arc<RwLock<StoreMap>>,
    open_cursors: Arc<AtomicUsize>,
    collection: String,
    fields: Vec<String>,
    ids: VecDeque<String>,
    released: bool,
}

impl MemoryCursor {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.ids.clear();
            self.open_cursors.fetch_sub(1, Ordering::SeqCst);

            debug!(target: "docproxy::memory", collection = %self.collection, "Released cursor");
        }
    }
}

#[async_trait]
impl DocumentCursor for MemoryCursor {
    async fn next_document(&mut self) -> DocumentStoreResult<Option<Document>> {
        if self.released {
            return Ok(None);
        }

        let next = {
            let store = self.store.read().await;
            let collection_map = store.get(&self.collection);
            let mut next = None;

            while let Some(key) = self.ids.pop_front() {
                if let Some(document) = collection_map.and_then(|map| map.get_document(&key).ok()) {
                    next = Some(project(document, &self.fields));
                    break;
                }
            }

            next
        };

        if next.is_none() {
            self.release();
        }

        Ok(next)
    }

    async fn close(mut self: Box<Self>) -> DocumentStoreResult<()> {
        self.release();

        Ok(())
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.release();
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docproxy_memory::InMemoryStore;
/// use docproxy_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
