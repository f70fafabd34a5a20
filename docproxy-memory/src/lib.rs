//! In-memory document storage backend for docproxy.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development
//! and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Server-like filters** - Comparison, membership, existence and logical operators
//! - **Atomic updates** - `$set`, `$unset`, `$push` and `$inc`, applied all-or-nothing per document
//! - **Cursor accounting** - Open cursors are counted so release can be observed
//!
//! # Quick Start
//!
//! ```ignore
//! use docproxy::{store::DocumentStore, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::new());
//!     let widgets = store.finder("widgets");
//!
//!     let widget = widgets.create().await?;
//!     widget.set("color", "red").await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docproxy_memory;

pub mod store;
mod evaluator;
mod update;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
