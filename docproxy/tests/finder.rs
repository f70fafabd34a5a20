//! Integration tests for finders and cursor-backed record sequences.

use std::collections::HashSet;

use docproxy::{memory::InMemoryStore, prelude::*};
use futures::TryStreamExt;
use proptest::prelude::*;

fn make_store() -> DocumentStore<InMemoryStore> {
    DocumentStore::new(InMemoryStore::new())
}

async fn seed(store: &DocumentStore<InMemoryStore>) -> Vec<Uuid> {
    let widgets = store.finder("widgets");
    let mut ids = Vec::new();

    for (color, count) in [("red", 3), ("blue", 1), ("red", 2), ("green", 5)] {
        let widget = widgets
            .create_with([("color", Value::from(color)), ("count", Value::from(count))])
            .await
            .unwrap();
        ids.push(widget.id());
    }

    ids
}

// =============================================================================
// find / first
// =============================================================================

#[tokio::test]
async fn test_find_unknown_id_is_none() {
    let store = make_store();
    seed(&store).await;

    assert!(store.finder("widgets").find(Uuid::new()).await.unwrap().is_none());
    assert!(store.finder("nothing").find(Uuid::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_find_returns_record_with_same_id() {
    let store = make_store();
    let ids = seed(&store).await;

    let found = store.finder("widgets").find(ids[2]).await.unwrap().unwrap();

    assert_eq!(found.id(), ids[2]);
    assert_eq!(found.get("count").await.unwrap(), Some(Value::Int(2)));
}

#[tokio::test]
async fn test_first_matches_conditions() {
    let store = make_store();
    let ids = seed(&store).await;
    let widgets = store.finder("widgets");

    let red = widgets.first(doc! { "color": "red" }).await.unwrap().unwrap();
    assert_eq!(red.id(), ids[0]);

    assert!(widgets.first(doc! { "color": "purple" }).await.unwrap().is_none());
}

#[tokio::test]
async fn test_first_honours_options_mixed_into_conditions() {
    let store = make_store();
    let ids = seed(&store).await;
    let widgets = store.finder("widgets");

    let largest_red = widgets
        .first(doc! { "color": "red", "sort": { "count": -1 }, "fields": ["count"] })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(largest_red.id(), ids[0]);

    let second = widgets
        .first(doc! { "sort": { "count": 1 }, "skip": 1 })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.id(), ids[2]);
}

#[tokio::test]
async fn test_first_with_empty_conditions_matches_anything() {
    let store = make_store();
    let ids = seed(&store).await;

    let any = store.finder("widgets").first(doc! {}).await.unwrap().unwrap();

    assert!(ids.contains(&any.id()));
}

#[tokio::test]
async fn test_invalid_option_value_is_rejected() {
    let store = make_store();
    seed(&store).await;

    assert!(matches!(
        store.finder("widgets").first(doc! { "skip": "many" }).await,
        Err(DocumentStoreError::InvalidDocument(_))
    ));
}

// =============================================================================
// all
// =============================================================================

#[tokio::test]
async fn test_all_yields_each_match_once() {
    let store = make_store();
    let ids = seed(&store).await;

    let mut records = store.finder("widgets").all(doc! { "color": "red" }).await.unwrap();
    let mut seen = Vec::new();
    while let Some(record) = records.next().await.unwrap() {
        seen.push(record.id());
    }

    assert_eq!(seen, vec![ids[0], ids[2]]);
    assert!(records.is_exhausted());
    assert_eq!(store.backend().open_cursors(), 0);
}

#[tokio::test]
async fn test_all_with_sort_skip_limit() {
    let store = make_store();
    let ids = seed(&store).await;

    let records = store
        .finder("widgets")
        .all(doc! { "sort": { "count": -1 }, "skip": 1, "limit": 2 })
        .await
        .unwrap();
    let seen = records
        .into_stream()
        .map_ok(|record| record.id())
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(seen, vec![ids[0], ids[2]]);
}

#[tokio::test]
async fn test_all_over_empty_collection_is_empty() {
    let store = make_store();

    let mut records = store.finder("widgets").all(doc! {}).await.unwrap();

    assert!(records.next().await.unwrap().is_none());
    assert_eq!(store.backend().open_cursors(), 0);
}

#[tokio::test]
async fn test_all_is_lazy_and_reiterable() {
    let store = make_store();
    let ids = seed(&store).await;
    let widgets = store.finder("widgets");

    let mut first_pass = widgets.all(doc! {}).await.unwrap();
    let head = first_pass.next().await.unwrap().unwrap();
    assert_eq!(head.id(), ids[0]);
    assert_eq!(store.backend().open_cursors(), 1);

    let second_pass = widgets
        .all(doc! {})
        .await
        .unwrap()
        .into_stream()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();
    assert_eq!(second_pass.len(), ids.len());
    assert_eq!(store.backend().open_cursors(), 1);

    first_pass.close().await.unwrap();
    assert_eq!(store.backend().open_cursors(), 0);
}

#[tokio::test]
async fn test_dropping_a_sequence_releases_its_cursor() {
    let store = make_store();
    seed(&store).await;

    {
        let mut records = store.finder("widgets").all(doc! {}).await.unwrap();
        records.next().await.unwrap();
        assert_eq!(store.backend().open_cursors(), 1);
    }

    assert_eq!(store.backend().open_cursors(), 0);
}

#[tokio::test]
async fn test_records_from_all_are_live_proxies() {
    let store = make_store();
    seed(&store).await;

    let mut records = store.finder("widgets").all(doc! { "color": "blue" }).await.unwrap();
    let blue = records.next().await.unwrap().unwrap();
    records.close().await.unwrap();

    blue.inc("count").await.unwrap();

    let refreshed = store.finder("widgets").first(doc! { "color": "blue" }).await.unwrap().unwrap();
    assert_eq!(refreshed.get("count").await.unwrap(), Some(Value::Int(2)));
}

#[tokio::test]
async fn test_filter_builder_conditions() {
    let store = make_store();
    let ids = seed(&store).await;

    let conditions: docproxy::bson::Document = Filter::gte("count", 2)
        .and(Filter::ne("color", "green"))
        .into();
    let seen = store
        .finder("widgets")
        .all(conditions)
        .await
        .unwrap()
        .into_stream()
        .map_ok(|record| record.id())
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(seen, vec![ids[0], ids[2]]);
}

#[tokio::test]
async fn test_lookups_never_insert() {
    let store = make_store();
    let ids = seed(&store).await;
    let widgets = store.finder("widgets");

    widgets.find(ids[1]).await.unwrap().unwrap();
    widgets.find(Uuid::new()).await.unwrap();
    widgets.first(doc! { "color": "red" }).await.unwrap().unwrap();
    widgets.first(doc! { "color": "purple" }).await.unwrap();
    widgets
        .all(doc! {})
        .await
        .unwrap()
        .into_stream()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(store.backend().count("widgets").await, ids.len());
}

// =============================================================================
// Property-Based Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_all_yields_every_record_exactly_once(count in 0usize..25) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = make_store();
            let widgets = store.finder("widgets");

            let mut created = HashSet::new();
            for _ in 0..count {
                created.insert(widgets.create().await.unwrap().id());
            }

            let mut records = widgets.all(doc! {}).await.unwrap();
            let mut seen = Vec::new();
            while let Some(record) = records.next().await.unwrap() {
                seen.push(record.id());
            }

            prop_assert_eq!(seen.len(), count);
            prop_assert_eq!(seen.into_iter().collect::<HashSet<_>>(), created);
            prop_assert_eq!(store.backend().open_cursors(), 0);
            Ok(())
        }).unwrap();
    }

    #[test]
    fn prop_find_round_trips_created_ids(count in 1usize..10, pick in any::<prop::sample::Index>()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = make_store();
            let widgets = store.finder("widgets");

            let mut ids = Vec::new();
            for _ in 0..count {
                ids.push(widgets.create().await.unwrap().id());
            }

            let id = ids[pick.index(ids.len())];
            let found = widgets.find(id).await.unwrap();
            let first = widgets.first(doc! { "_id": id }).await.unwrap();

            prop_assert_eq!(found.map(|record| record.id()), Some(id));
            prop_assert_eq!(first.map(|record| record.id()), Some(id));
            prop_assert_eq!(store.backend().count("widgets").await, count);
            Ok(())
        }).unwrap();
    }
}
