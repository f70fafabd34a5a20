//! Error types and result types for record proxy operations.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`].
//! Store-reported failures are surfaced unchanged; nothing in the core retries.

use std::convert::Infallible;

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when working with records.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The value codec cannot represent the value in the store's native format.
    ///
    /// Raised before any store call is made, so no partial write occurs.
    #[error("Unsupported value kind: {0}")]
    UnsupportedValueKind(String),
    /// The identifier bound to a record no longer resolves to a document.
    /// The first argument is the record ID, the second is the collection name.
    #[error("Record {0} not found in collection {1}")]
    RecordNotFound(String, String),
    /// A document, filter or option value has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    /// The store rejected or failed the requested operation.
    #[error("Store operation failed: {0}")]
    StoreOperationFailed(String),
}

/// A specialized `Result` type for record proxy operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<Infallible> for DocumentStoreError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
