//! Main docproxy crate: dynamic record proxies over schemaless document collections.
//!
//! This crate is the primary entry point. It re-exports the core types from the
//! sub-crates and provides access to the storage backends.
//!
//! # Features
//!
//! - **Record proxies** - A record holds only its document's identifier; every field
//!   read is a point lookup and every write is a single atomic update operator
//! - **Finders** - Lookup by identifier, first match, and lazy cursor-backed sequences
//! - **Option splitting** - `fields`, `skip`, `limit`, `sort`, `hint`, `snapshot` and
//!   `timeout` can be given alongside filter conditions in one document
//! - **Typed models** - `#[derive(Model)]` binds a struct to a collection and generates
//!   typed field accessors
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docproxy::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let widgets = store.finder("widgets");
//!
//!     let widget = widgets.create().await?;
//!     widget.set("color", "red").await?;
//!     widget.push("tags", ["a", "b"]).await?;
//!     widget.inc("count").await?;
//!
//!     let red = widgets.first(doc! { "color": "red" }).await?;
//!     assert_eq!(red.map(|record| record.id()), Some(widget.id()));
//!
//!     let mut records = widgets.all(doc! { "count": { "$gte": 1 }, "limit": 10 }).await?;
//!     while let Some(record) = records.next().await? {
//!         println!("{} is {:?}", record.id(), record.get("color").await?);
//!     }
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Typed Models
//!
//! ```ignore
//! use docproxy::{prelude::*, memory::InMemoryStore};
//!
//! #[derive(Model)]
//! #[model(collection = "widgets")]
//! pub struct Widget {
//!     pub color: String,
//!     pub count: i64,
//! }
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! let widget = store.model_finder::<Widget>().create().await?.typed::<Widget>();
//!
//! widget.set_color("red".to_string()).await?;
//! assert_eq!(widget.color().await?, Some("red".to_string()));
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `mongodb` - MongoDB backend (requires the `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as docproxy;

pub mod prelude;

pub use docproxy_core::{backend, codec, collection, error, finder, model, options, query, record, store};

pub use docproxy_macros::Model;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docproxy_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docproxy_mongodb::{MongoDbConfig, MongoDbStore, MongoDbStoreBuilder};
}
