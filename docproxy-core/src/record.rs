//! Record proxies and atomic update composition.
//!
//! A [`Record`] stands in for one stored document. It holds only the document's
//! identifier (plus the collection binding it was created with) and never caches
//! field values: every [`get`](Record::get) is a point lookup projected to one
//! field, and every write is a single atomic operator scoped to the record's
//! identifier.
//!
//! # Example
//!
//! ```ignore
//! let widget = store.finder("widgets").create().await?;
//!
//! widget.set("color", "red").await?;
//! widget.push("tags", ["a", "b"]).await?;
//! widget.inc("count").await?;
//!
//! assert_eq!(widget.get("color").await?, Some(Value::from("red")));
//! ```

use std::{fmt, marker::PhantomData, ops::Deref};

use bson::{Document, Uuid, doc};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    backend::{ID_FIELD, StoreBackend},
    codec::{Value, unwrap, wrap},
    collection::Collection,
    error::{DocumentStoreError, DocumentStoreResult},
    model::Model,
    options::QueryOptions,
};

/// How a record obtains its identifier at construction.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Binding {
    /// Insert an empty document and adopt the identifier the store assigns.
    Fresh,
    /// Adopt an identifier that is already known to exist.
    Known(Uuid),
}

/// A handle to one stored document.
pub struct Record<'a, B: StoreBackend> {
    id: Uuid,
    collection: Collection<'a, B>,
}

impl<'a, B: StoreBackend> Record<'a, B> {
    pub(crate) async fn bind(
        collection: Collection<'a, B>,
        binding: Binding,
    ) -> DocumentStoreResult<Self> {
        let id = match binding {
            Binding::Known(id) => id,
            Binding::Fresh => {
                let id = collection.insert(Document::new()).await?;
                debug!(target: "docproxy::record", collection = collection.name(), %id, "Record created");
                id
            }
        };

        Ok(Self { id, collection })
    }

    /// Creates a new, empty record in the collection.
    ///
    /// # Errors
    ///
    /// Returns whatever the store reports if the insert fails.
    pub async fn create(collection: Collection<'a, B>) -> DocumentStoreResult<Self> {
        Self::bind(collection, Binding::Fresh).await
    }

    /// Creates a new record and assigns the given fields to it.
    ///
    /// All values are wrapped before anything is written, so an unsupported value
    /// leaves no record behind. An empty field set creates an empty record.
    pub async fn create_with<I, K, V>(
        collection: Collection<'a, B>,
        fields: I,
    ) -> DocumentStoreResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let assignments = wrap_assignments(fields)?;
        let record = Self::create(collection).await?;

        record.apply_set(assignments).await?;

        Ok(record)
    }

    /// Returns the identifier this record is bound to.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the collection this record belongs to.
    pub fn collection(&self) -> &Collection<'a, B> {
        &self.collection
    }

    /// Reads one field from the stored document.
    ///
    /// Returns `Ok(None)` if the document exists but has no such field.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] for a dotted, empty or
    /// `$`-prefixed field name, and [`DocumentStoreError::RecordNotFound`] if the
    /// document itself is gone.
    pub async fn get(&self, field: &str) -> DocumentStoreResult<Option<Value>> {
        check_field(field)?;

        let mut document = self
            .collection
            .find_one(
                doc! { ID_FIELD: self.id },
                QueryOptions::new().with_fields([field]),
            )
            .await?
            .ok_or_else(|| self.not_found())?;

        debug!(target: "docproxy::record", collection = self.collection.name(), id = %self.id, field, "Field read");

        Ok(document.remove(field).map(unwrap))
    }

    /// Reads one field and deserializes it into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, field: &str) -> DocumentStoreResult<Option<T>> {
        self.get(field)
            .await?
            .map(Value::deserialize_into)
            .transpose()
    }

    /// Assigns one field using `$set`.
    pub async fn set(&self, field: impl Into<String>, value: impl Into<Value>) -> DocumentStoreResult<()> {
        self.set_fields([(field, value)]).await
    }

    /// Assigns one field from any serializable value using `$set`.
    pub async fn set_as<T: Serialize + ?Sized>(&self, field: &str, value: &T) -> DocumentStoreResult<()> {
        self.set(field, Value::from_serializable(value)?).await
    }

    /// Assigns several fields in one `$set`.
    ///
    /// Applying the same assignments twice leaves the document unchanged the second time.
    pub async fn set_fields<I, K, V>(&self, fields: I) -> DocumentStoreResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let assignments = wrap_assignments(fields)?;

        self.apply_set(assignments).await
    }

    /// Appends each value to an array field, one `$push` per value, in order.
    ///
    /// The field is not checked to be an array; the store decides what happens if it isn't.
    pub async fn push<I, V>(&self, field: &str, values: I) -> DocumentStoreResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        check_field(field)?;

        let values = values
            .into_iter()
            .map(|value| wrap(&value.into()))
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        for value in values {
            self.apply(doc! { "$push": { field: value } }).await?;
        }

        Ok(())
    }

    /// Increments a numeric field by one using `$inc`.
    pub async fn inc(&self, field: &str) -> DocumentStoreResult<()> {
        self.inc_by(field, 1).await
    }

    /// Increments a numeric field by `amount` using `$inc`.
    ///
    /// The field is not checked to be numeric; the store decides what happens if it isn't.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnsupportedValueKind`] if `amount` is not a number.
    pub async fn inc_by(&self, field: &str, amount: impl Into<Value>) -> DocumentStoreResult<()> {
        check_field(field)?;

        let amount = match amount.into() {
            amount @ (Value::Int(_) | Value::Float(_) | Value::Decimal(_)) => wrap(&amount)?,
            other => {
                return Err(DocumentStoreError::UnsupportedValueKind(format!(
                    "cannot increment by non-numeric value {other:?}"
                )));
            }
        };

        self.apply(doc! { "$inc": { field: amount } }).await
    }

    /// Views this record through a model's typed accessors.
    pub fn typed<M: Model>(self) -> TypedRecord<'a, B, M> {
        TypedRecord {
            record: self,
            _model: PhantomData,
        }
    }

    async fn apply_set(&self, assignments: Document) -> DocumentStoreResult<()> {
        if assignments.is_empty() {
            return Ok(());
        }

        self.apply(doc! { "$set": assignments }).await
    }

    async fn apply(&self, update: Document) -> DocumentStoreResult<()> {
        let operator = update.keys().next().cloned().unwrap_or_default();
        let outcome = self
            .collection
            .update(doc! { ID_FIELD: self.id }, update)
            .await?;

        if outcome.matched == 0 {
            return Err(self.not_found());
        }

        debug!(
            target: "docproxy::record",
            collection = self.collection.name(),
            id = %self.id,
            operator = %operator,
            modified = outcome.modified,
            "Update applied"
        );

        Ok(())
    }

    fn not_found(&self) -> DocumentStoreError {
        DocumentStoreError::RecordNotFound(self.id.to_string(), self.collection.name().to_string())
    }
}

impl<B: StoreBackend> Clone for Record<'_, B> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            collection: self.collection.clone(),
        }
    }
}

impl<B: StoreBackend> fmt::Debug for Record<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("collection", &self.collection.name())
            .field("id", &self.id)
            .finish()
    }
}

impl<B: StoreBackend> PartialEq for Record<'_, B> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.collection.name() == other.collection.name()
    }
}

/// A record viewed through a [`Model`].
///
/// Derived models implement their generated accessor trait for this type.
/// All untyped record operations remain available through `Deref`.
pub struct TypedRecord<'a, B: StoreBackend, M: Model> {
    record: Record<'a, B>,
    _model: PhantomData<fn() -> M>,
}

impl<'a, B: StoreBackend, M: Model> TypedRecord<'a, B, M> {
    /// Returns the untyped record.
    pub fn into_inner(self) -> Record<'a, B> {
        self.record
    }
}

impl<'a, B: StoreBackend, M: Model> Deref for TypedRecord<'a, B, M> {
    type Target = Record<'a, B>;

    fn deref(&self) -> &Self::Target {
        &self.record
    }
}

impl<B: StoreBackend, M: Model> Clone for TypedRecord<'_, B, M> {
    fn clone(&self) -> Self {
        Self {
            record: self.record.clone(),
            _model: PhantomData,
        }
    }
}

impl<B: StoreBackend, M: Model> fmt::Debug for TypedRecord<'_, B, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.record, f)
    }
}

fn wrap_assignments<I, K, V>(fields: I) -> DocumentStoreResult<Document>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    fields
        .into_iter()
        .map(|(field, value)| {
            let field = field.into();
            check_field(&field)?;
            Ok::<_, DocumentStoreError>((field, wrap(&value.into())?))
        })
        .collect()
}

/// A field name addresses one top-level field: no dots, no leading `$`.
fn check_field(field: &str) -> DocumentStoreResult<()> {
    if field.is_empty() || field.contains('.') || field.starts_with('$') || field.contains('\0') {
        return Err(DocumentStoreError::InvalidDocument(format!(
            "{field:?} is not a valid field name"
        )));
    }

    Ok(())
}
