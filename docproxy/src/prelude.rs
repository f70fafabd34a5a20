//! Convenient re-exports of commonly used types from docproxy.
//!
//! ```ignore
//! use docproxy::prelude::*;
//! ```
//!
//! This provides access to:
//! - Records, typed records and finders
//! - Stores, collections and backends
//! - Values, query options and filter construction
//! - The `Model` trait and its derive
//! - Error types

pub use docproxy_core::{
    backend::{DocumentCursor, StoreBackend, StoreBackendBuilder, UpdateOutcome},
    codec::Value,
    collection::Collection,
    error::{DocumentStoreError, DocumentStoreResult},
    finder::{Finder, Records},
    model::Model,
    options::{QueryOptions, SortDirection, split_options},
    query::{Expr, FieldOp, Filter, QueryVisitor},
    record::{Record, TypedRecord},
    store::DocumentStore,
};

pub use docproxy_macros::Model;

pub use bson::{Uuid, doc};
