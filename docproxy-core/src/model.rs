//! Binding of host types to collections.
//!
//! A [`Model`] names the collection its records live in. It carries no fields of
//! its own at runtime: records never cache document content, so a model type is
//! only a compile-time tag that selects a collection and, when derived, a set of
//! typed field accessors.
//!
//! # Example
//!
//! ```ignore
//! use docproxy::prelude::*;
//!
//! #[derive(Model)]
//! #[model(collection = "widgets")]
//! pub struct Widget {
//!     pub color: String,
//!     pub count: i64,
//! }
//!
//! let widgets = store.model_finder::<Widget>();
//! let widget = widgets.create().await?.typed::<Widget>();
//! widget.set_color("red".to_string()).await?;
//! assert_eq!(widget.color().await?, Some("red".to_string()));
//! ```

/// A type whose records are stored in a specific collection.
pub trait Model: Send + Sync + 'static {
    /// Returns the name of the collection this model's records belong to.
    fn collection_name() -> &'static str;
}
