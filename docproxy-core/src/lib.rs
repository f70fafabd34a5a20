//! Dynamic record proxies over schemaless document collections.
//!
//! This crate is the core of the docproxy project and provides:
//!
//! - **Record proxies** ([`record`]) - Handles that hold only a document identifier and
//!   translate every field read into a point lookup and every write into an atomic operator
//! - **Finders** ([`finder`]) - Lookup by identifier, first match, and lazy cursor-backed sequences
//! - **Value codec** ([`codec`]) - Lossless conversion between host values and stored BSON
//! - **Query options** ([`options`]) - Separation of option keys from filter conditions
//! - **Filter expressions** ([`query`]) - Typed construction and parsing of filter documents
//! - **Store backend abstraction** ([`backend`]) - The driver surface records are built on
//! - **Collections and stores** ([`collection`], [`store`]) - Explicit backend/collection binding
//! - **Models** ([`model`]) - Binding host types to collections
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docproxy::prelude::*;
//! use docproxy::memory::InMemoryStore;
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! let widgets = store.finder("widgets");
//!
//! let widget = widgets.create().await?;
//! widget.set("color", "red").await?;
//! widget.push("tags", ["a", "b"]).await?;
//! widget.inc("count").await?;
//!
//! let found = widgets.find(widget.id()).await?.unwrap();
//! assert_eq!(found.get("color").await?, Some(Value::from("red")));
//! ```

#[allow(unused_extern_crates)]
extern crate self as docproxy_core;

pub mod backend;
pub mod codec;
pub mod collection;
pub mod error;
pub mod finder;
pub mod model;
pub mod options;
pub mod query;
pub mod record;
pub mod store;
