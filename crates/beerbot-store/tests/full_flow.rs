use std::path::Path;

use serde_json::{json, Value};
use tempfile::TempDir;

use beerbot_core::config::{StoreConfig, BEER_INDEX, BREWERY_INDEX, BREWERY_LOCATION_INDEX};
use beerbot_core::error::Error;
use beerbot_core::mutation::Mutation;
use beerbot_core::query;
use beerbot_core::traits::DocumentStore;
use beerbot_core::types::{
    BatchFetch, CompositeQuery, FetchOutcome, HighlightStyle, SearchOptions, SubQuery, TermFacet,
};
use beerbot_core::aggregate;
use beerbot_store::TantivyStore;

fn config_at(root: &Path, create: bool) -> StoreConfig {
    StoreConfig {
        url: format!("file://{}", root.display()),
        create_if_missing: create,
        ..StoreConfig::default()
    }
}

fn sample_docs() -> Vec<(String, Value)> {
    vec![
        ("b1".into(), json!({"type": "beer", "name": "Ale Pale Special", "category": "British Ale", "style": "Bitter"})),
        ("b2".into(), json!({"type": "beer", "name": "Pale Ale", "category": "North American Ale", "style": "American-Style Pale Ale"})),
        ("b3".into(), json!({"type": "beer", "name": "Brown Ale", "category": "British Ale", "style": "Brown Ale"})),
        ("b4".into(), json!({"type": "beer", "name": "Hazy Ale", "category": "North American Ale", "style": "New England IPA"})),
        ("b5".into(), json!({"type": "beer", "name": "Amber Ale", "category": "North American Ale", "style": "Amber"})),
        ("b6".into(), json!({"type": "beer", "name": "Stout", "category": "Irish Ale", "style": "Dry Stout"})),
        ("w1".into(), json!({"type": "brewery", "name": "Pale Ale Brewing", "description": "Small batch ales.", "city": "San Francisco", "state": "California", "country": "United States"})),
        ("w2".into(), json!({"type": "brewery", "name": "Harbor Works", "description": "Lagers by the water.", "city": "Portland", "state": "Oregon", "country": "United States"})),
    ]
}

fn seeded() -> (TempDir, TantivyStore) {
    let tmp = TempDir::new().unwrap();
    let store = TantivyStore::new(config_at(tmp.path(), true)).unwrap();
    assert_eq!(store.save_many(&sample_docs()).unwrap(), 8);
    (tmp, store)
}

fn ids(store: &TantivyStore, index: &str, query: &CompositeQuery, options: &SearchOptions) -> Vec<String> {
    store.search_full_text(index, query, options).unwrap().map(|h| h.id).collect()
}

#[test]
fn exact_phrase_ranks_first() {
    let (_tmp, store) = seeded();
    let q = query::build("Pale Ale", &["name"], true).unwrap();
    let found = ids(&store, BEER_INDEX, &q, &SearchOptions::default());
    assert_eq!(found[0], "b2");
    assert!(found.contains(&"b1".to_string()));
    // the brewery named "Pale Ale Brewing" is filtered out by type
    assert!(!found.contains(&"w1".to_string()));
}

#[test]
fn total_hits_reports_matches_beyond_limit() {
    let (_tmp, store) = seeded();
    let q = query::build("ale", &["name"], true).unwrap();
    let results = store.search_full_text(BEER_INDEX, &q, &SearchOptions::default().with_limit(2)).unwrap();
    assert_eq!(results.total_hits(), 5);
    assert_eq!(results.count(), 2);
}

#[test]
fn offset_pages_through_results() {
    let (_tmp, store) = seeded();
    let q = query::build("ale", &["name"], true).unwrap();
    let first = ids(&store, BEER_INDEX, &q, &SearchOptions::default().with_limit(2));
    let second = ids(&store, BEER_INDEX, &q, &SearchOptions::default().with_limit(2).with_offset(2));
    assert_eq!(second.len(), 2);
    assert!(second.iter().all(|id| !first.contains(id)));
}

#[test]
fn zero_limit_only_counts() {
    let (_tmp, store) = seeded();
    let q = query::build("ale", &["name"], true).unwrap();
    let results = store.search_full_text(BEER_INDEX, &q, &SearchOptions::default().with_limit(0)).unwrap();
    assert_eq!(results.total_hits(), 5);
    assert_eq!(results.count(), 0);
}

#[test]
fn stop_words_alone_match_nothing() {
    let (_tmp, store) = seeded();
    let q = query::build("the", &["name"], true).unwrap();
    let results = store.search_full_text(BEER_INDEX, &q, &SearchOptions::default()).unwrap();
    assert_eq!(results.total_hits(), 0);
}

#[test]
fn location_search_matches_any_field() {
    let (_tmp, store) = seeded();
    let by_city = query::any_field("San Francisco", &["city", "state"]).unwrap();
    assert_eq!(ids(&store, BREWERY_LOCATION_INDEX, &by_city, &SearchOptions::default()), vec!["w1"]);
    let by_state = query::any_field("oregon", &["city", "state"]).unwrap();
    assert_eq!(ids(&store, BREWERY_LOCATION_INDEX, &by_state, &SearchOptions::default()), vec!["w2"]);
}

#[test]
fn description_is_searchable_on_brewery_index() {
    let (_tmp, store) = seeded();
    let q = query::build("lagers", &["name", "description"], true).unwrap();
    assert_eq!(ids(&store, BREWERY_INDEX, &q, &SearchOptions::default()), vec!["w2"]);
}

#[test]
fn unknown_index_is_reported() {
    let (_tmp, store) = seeded();
    let q = query::build("ale", &["name"], true).unwrap();
    let err = store.search_full_text("fts_idx_nope", &q, &SearchOptions::default()).unwrap_err();
    assert!(matches!(err, Error::IndexNotFound(name) if name == "fts_idx_nope"));
}

#[test]
fn field_outside_index_is_malformed() {
    let (_tmp, store) = seeded();
    let q: CompositeQuery = std::iter::once(SubQuery::matching("portland", "city")).collect();
    let err = store.search_full_text(BEER_INDEX, &q, &SearchOptions::default()).unwrap_err();
    assert!(matches!(err, Error::MalformedQuery(_)));
}

#[test]
fn empty_query_is_rejected() {
    let (_tmp, store) = seeded();
    let err = store.search_full_text(BEER_INDEX, &CompositeQuery::new(), &SearchOptions::default()).unwrap_err();
    assert!(matches!(err, Error::EmptyQuery));
}

#[test]
fn highlights_and_projections() {
    let (_tmp, store) = seeded();
    let q = query::build("hazy", &["name"], true).unwrap();
    let options = SearchOptions::default()
        .with_fields(vec!["name".into(), "style".into()])
        .with_highlight(vec!["name".into()], HighlightStyle::Html);
    let hit = store.search_full_text(BEER_INDEX, &q, &options).unwrap().next().unwrap();
    assert_eq!(hit.id, "b4");
    assert_eq!(hit.fields.get("style").map(String::as_str), Some("New England IPA"));
    assert!(hit.fragments["name"][0].contains("<b>Hazy</b>"));
}

#[test]
fn category_facets_count_matches() {
    let (_tmp, store) = seeded();
    let q = query::build("ale", &["name"], true).unwrap();
    let options = SearchOptions::default().with_facets(vec![TermFacet::new("categories", "category", 5)]);
    let results = store.search_full_text(BEER_INDEX, &q, &options).unwrap();
    let facet = &results.facets()[0];
    assert_eq!(facet.name, "categories");
    assert_eq!(facet.terms[0].term, "North American Ale");
    assert_eq!(facet.terms[0].count, 3);
}

#[test]
fn unknown_facet_field_is_malformed() {
    let (_tmp, store) = seeded();
    let q = query::build("ale", &["name"], true).unwrap();
    let options = SearchOptions::default().with_facets(vec![TermFacet::new("x", "description", 5)]);
    let err = store.search_full_text(BEER_INDEX, &q, &options).unwrap_err();
    assert!(matches!(err, Error::MalformedQuery(_)));
}

#[test]
fn batch_fetch_is_partial() {
    let (_tmp, store) = seeded();
    let BatchFetch::Fetched(docs) = store.fetch_many(&["b1".into(), "missing".into(), "w2".into()]) else {
        panic!("store should be reachable");
    };
    assert_eq!(docs.len(), 2);
    assert_eq!(docs["w2"].fields().city, Some("Portland"));
    assert!(!docs.contains_key("missing"));
}

#[test]
fn missing_bucket_cannot_connect() {
    let tmp = TempDir::new().unwrap();
    let store = TantivyStore::new(config_at(tmp.path(), false)).unwrap();
    assert!(store.connect().unwrap_err().is_connection());
    assert!(matches!(store.fetch_one("b1"), FetchOutcome::Unavailable(_)));
    assert!(matches!(store.fetch_many(&["b1".into()]), BatchFetch::Unavailable(_)));
    assert!(!store.is_connected());
}

#[test]
fn unknown_index_field_is_invalid_config() {
    let mut config = StoreConfig::default();
    config.indexes[0].fields.push("abv".into());
    assert!(matches!(TantivyStore::new(config), Err(Error::InvalidConfig(_))));
}

#[test]
fn save_enforces_cas() {
    let tmp = TempDir::new().unwrap();
    let store = TantivyStore::new(config_at(tmp.path(), true)).unwrap();
    let doc = json!({"type": "beer", "name": "Kolsch"});
    assert_eq!(store.save("k1", &doc, None).unwrap(), 1);
    assert_eq!(store.save("k1", &doc, Some(1)).unwrap(), 2);
    let err = store.save("k1", &doc, Some(1)).unwrap_err();
    assert!(matches!(err, Error::CasMismatch { expected: 1, actual: 2, .. }));
    assert!(matches!(store.save("k2", &doc, Some(1)), Err(Error::NotFound(_))));
    assert_eq!(store.num_docs().unwrap(), 1);
}

#[test]
fn non_object_documents_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = TantivyStore::new(config_at(tmp.path(), true)).unwrap();
    assert!(store.save("x", &json!(["not", "an", "object"]), None).is_err());
    assert_eq!(store.num_docs().unwrap(), 0);
}

#[test]
fn delete_removes_documents() {
    let (_tmp, store) = seeded();
    store.delete("b6").unwrap();
    assert_eq!(store.fetch_one("b6"), FetchOutcome::NotFound);
    assert!(matches!(store.delete("b6"), Err(Error::NotFound(_))));
}

#[test]
fn mutations_update_stored_and_indexed_fields() {
    let (_tmp, store) = seeded();
    let cas = store
        .mutate(
            "b6",
            &[
                Mutation::Replace { path: "name".into(), value: json!("Oatmeal Stout") },
                Mutation::Counter { path: "reviews".into(), delta: 2 },
            ],
        )
        .unwrap();
    assert_eq!(cas, 2);
    let FetchOutcome::Found(doc) = store.fetch_one("b6") else { panic!("b6 should exist") };
    assert_eq!(doc.value()["reviews"], json!(2));
    let q = query::build("oatmeal", &["name"], true).unwrap();
    assert_eq!(ids(&store, BEER_INDEX, &q, &SearchOptions::default()), vec!["b6"]);
    assert!(matches!(store.mutate("nope", &[]), Err(Error::NotFound(_))));
}

#[test]
fn aggregate_joins_hits_with_documents() {
    let (_tmp, store) = seeded();
    let q = query::build("ale", &["name"], true).unwrap();
    let result = aggregate(&store, BEER_INDEX, &q, &SearchOptions::default().with_limit(3)).unwrap();
    assert_eq!(result.total_hits, 5);
    assert_eq!(result.len(), 3);
    for row in &result.rows {
        let doc = row.doc.as_ref().unwrap();
        assert_eq!(doc.value()["type"], json!("beer"));
    }
}

#[test]
fn reopening_sees_committed_documents() {
    let tmp = TempDir::new().unwrap();
    {
        let store = TantivyStore::new(config_at(tmp.path(), true)).unwrap();
        store.save_many(&sample_docs()).unwrap();
    }
    let store = TantivyStore::new(config_at(tmp.path(), false)).unwrap();
    store.connect().unwrap();
    assert_eq!(store.num_docs().unwrap(), 8);
}

#[test]
fn connection_is_reused_once_established() {
    let (tmp, store) = seeded();
    store.connect().unwrap();
    std::fs::remove_dir_all(tmp.path().join("beer-sample")).unwrap();

    store.connect().unwrap();
    let BatchFetch::Fetched(docs) = store.fetch_many(&["b1".into(), "w1".into()]) else {
        panic!("open connection should keep serving reads");
    };
    assert_eq!(docs.len(), 2);
}

#[test]
fn oversized_pages_are_clamped() {
    let (_tmp, store) = seeded();
    let q = query::build("ale", &["name"], true).unwrap();
    let results = store.search_full_text(BEER_INDEX, &q, &SearchOptions::default().with_limit(usize::MAX / 4)).unwrap();
    assert_eq!(results.total_hits(), 5);
    assert_eq!(results.count(), 5);

    let past_end = store
        .search_full_text(BEER_INDEX, &q, &SearchOptions::default().with_limit(10).with_offset(1_000))
        .unwrap();
    assert_eq!(past_end.total_hits(), 5);
    assert_eq!(past_end.count(), 0);
}

#[test]
fn overflowing_page_window_is_malformed() {
    let (_tmp, store) = seeded();
    let q = query::build("ale", &["name"], true).unwrap();
    let err = store
        .search_full_text(BEER_INDEX, &q, &SearchOptions::default().with_limit(10).with_offset(usize::MAX))
        .unwrap_err();
    assert!(matches!(err, Error::MalformedQuery(_)));
}
