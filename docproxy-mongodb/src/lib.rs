//! MongoDB backend implementation for docproxy.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//! Filters, projections, sorting and the `$set`/`$push`/`$inc` operators are all
//! executed by the server; query cursors are server-side cursors.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docproxy = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! The builder takes a connection string and database name, either directly or
//! from a [`MongoDbConfig`] (which can be read from the environment).
//!
//! # Example
//!
//! ```ignore
//! use docproxy::{backend::StoreBackendBuilder, mongodb::{MongoDbConfig, MongoDbStoreBuilder}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStoreBuilder::from_config(MongoDbConfig::from_env()?)
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docproxy_mongodb;

pub mod config;
pub mod store;
mod sanitizer;

pub use config::MongoDbConfig;
pub use store::{MongoDbStore, MongoDbStoreBuilder};
