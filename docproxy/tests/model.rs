//! Integration tests for derived models and typed field accessors.

use docproxy::{memory::InMemoryStore, prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[allow(dead_code)]
#[derive(Model)]
#[model(collection = "widgets")]
pub struct Widget {
    pub color: String,
    pub tags: Vec<String>,
    #[model(rename = "qty")]
    pub count: i64,
    pub dimensions: Dimensions,
    #[model(skip)]
    pub scratch: (),
}

#[allow(dead_code)]
#[derive(Model)]
pub struct StockItem {
    pub sku: String,
}

#[test]
fn test_collection_names() {
    assert_eq!(Widget::collection_name(), "widgets");
    assert_eq!(StockItem::collection_name(), "stock_item");
}

#[tokio::test]
async fn test_typed_accessors_read_and_write_fields() {
    let store = DocumentStore::new(InMemoryStore::new());
    let widget = store
        .model_finder::<Widget>()
        .create()
        .await
        .unwrap()
        .typed::<Widget>();

    assert_eq!(widget.color().await.unwrap(), None);

    widget.set_color("red".to_string()).await.unwrap();
    widget.set_count(4).await.unwrap();
    widget
        .set_dimensions(Dimensions { width: 2, height: 3 })
        .await
        .unwrap();
    widget.push("tags", ["a", "b"]).await.unwrap();

    assert_eq!(widget.color().await.unwrap(), Some("red".to_string()));
    assert_eq!(widget.count().await.unwrap(), Some(4));
    assert_eq!(widget.get("qty").await.unwrap(), Some(Value::Int(4)));
    assert_eq!(
        widget.dimensions().await.unwrap(),
        Some(Dimensions { width: 2, height: 3 })
    );
    assert_eq!(
        widget.tags().await.unwrap(),
        Some(vec!["a".to_string(), "b".to_string()])
    );
}

#[tokio::test]
async fn test_typed_record_shares_the_untyped_document() {
    let store = DocumentStore::new(InMemoryStore::new());
    let finder = store.model_finder::<Widget>();

    let record = finder.create().await.unwrap();
    let widget = record.clone().typed::<Widget>();

    record.inc_by("qty", 5).await.unwrap();

    assert_eq!(widget.count().await.unwrap(), Some(5));
    assert_eq!(finder.collection().name(), "widgets");
    assert_eq!(widget.into_inner(), record);
}

#[tokio::test]
async fn test_typed_getter_reports_mismatched_stored_type() {
    let store = DocumentStore::new(InMemoryStore::new());
    let widget = store
        .model_finder::<Widget>()
        .create()
        .await
        .unwrap()
        .typed::<Widget>();

    widget.set("qty", "lots").await.unwrap();

    assert!(widget.count().await.is_err());
}
