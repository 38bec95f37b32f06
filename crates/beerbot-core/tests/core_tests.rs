use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::{json, Value};
use tempfile::TempDir;

use beerbot_core::aggregate;
use beerbot_core::data_processor::DataProcessor;
use beerbot_core::error::{Error, Result};
use beerbot_core::mutation::Mutation;
use beerbot_core::query;
use beerbot_core::traits::DocumentStore;
use beerbot_core::types::{
    BatchFetch, CompositeQuery, DocId, DocumentBody, FetchOutcome, Hit, SearchOptions, SearchResults,
};

/// Canned store: serves fixed hits and records how it is called.
struct FakeStore {
    total_hits: u64,
    hits: Vec<Hit>,
    docs: HashMap<DocId, Value>,
    unavailable: bool,
    search_error: bool,
    searches: AtomicUsize,
    batch_fetches: AtomicUsize,
    fetched_ids: Mutex<Vec<DocId>>,
}

impl FakeStore {
    fn new(total_hits: u64, ids: &[&str]) -> Self {
        Self {
            total_hits,
            hits: ids.iter().enumerate().map(|(i, id)| Hit::new(*id, 10.0 - i as f32)).collect(),
            docs: ids.iter().map(|id| ((*id).to_string(), json!({"name": format!("beer {id}")}))).collect(),
            unavailable: false,
            search_error: false,
            searches: AtomicUsize::new(0),
            batch_fetches: AtomicUsize::new(0),
            fetched_ids: Mutex::new(Vec::new()),
        }
    }

    fn without_doc(mut self, id: &str) -> Self {
        self.docs.remove(id);
        self
    }
}

impl DocumentStore for FakeStore {
    fn connect(&self) -> Result<()> {
        Ok(())
    }

    fn fetch_one(&self, id: &str) -> FetchOutcome {
        match self.docs.get(id) {
            Some(v) => FetchOutcome::Found(DocumentBody::new(v.clone(), 1)),
            None => FetchOutcome::NotFound,
        }
    }

    fn fetch_many(&self, ids: &[DocId]) -> BatchFetch {
        self.batch_fetches.fetch_add(1, Ordering::SeqCst);
        self.fetched_ids.lock().unwrap().extend(ids.iter().cloned());
        if self.unavailable {
            return BatchFetch::Unavailable("store offline".to_string());
        }
        BatchFetch::Fetched(
            ids.iter()
                .filter_map(|id| self.docs.get(id).map(|v| (id.clone(), DocumentBody::new(v.clone(), 1))))
                .collect(),
        )
    }

    fn search_full_text(&self, index_name: &str, _query: &CompositeQuery, _options: &SearchOptions) -> Result<SearchResults> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.search_error {
            return Err(Error::IndexNotFound(index_name.to_string()));
        }
        Ok(SearchResults::new(self.total_hits, self.hits.clone(), Vec::new()))
    }

    fn save(&self, _id: &str, _body: &Value, _cas: Option<u64>) -> Result<u64> {
        Err(Error::Operation("read-only".to_string()))
    }

    fn save_many(&self, _docs: &[(DocId, Value)]) -> Result<usize> {
        Err(Error::Operation("read-only".to_string()))
    }

    fn delete(&self, _id: &str) -> Result<()> {
        Err(Error::Operation("read-only".to_string()))
    }

    fn mutate(&self, _id: &str, _mutations: &[Mutation]) -> Result<u64> {
        Err(Error::Operation("read-only".to_string()))
    }
}

fn stout_query() -> CompositeQuery {
    query::build("imperial stout", &["name"], true).expect("query")
}

#[test]
fn rows_keep_hit_order() {
    let ids = ["h5", "h1", "h4", "h2", "h3"];
    let store = FakeStore::new(5, &ids);
    let result = aggregate(&store, "fts_idx_beers", &stout_query(), &SearchOptions::default()).expect("aggregate");
    assert_eq!(result.ids().collect::<Vec<_>>(), ids);
    assert!(result.rows.iter().all(|r| r.doc.is_some()));
}

#[test]
fn one_batch_fetch_regardless_of_hit_count() {
    let ids: Vec<String> = (0..40).map(|i| format!("beer-{i}")).collect();
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let store = FakeStore::new(40, &refs);
    aggregate(&store, "fts_idx_beers", &stout_query(), &SearchOptions::default()).expect("aggregate");
    assert_eq!(store.batch_fetches.load(Ordering::SeqCst), 1);
    assert_eq!(*store.fetched_ids.lock().unwrap(), ids);
}

#[test]
fn missing_document_only_affects_its_row() {
    let store = FakeStore::new(5, &["h1", "h2", "h3", "h4", "h5"]).without_doc("h3");
    let result = aggregate(&store, "fts_idx_beers", &stout_query(), &SearchOptions::default()).expect("aggregate");
    assert_eq!(result.len(), 5);
    for row in &result.rows {
        assert_eq!(row.doc.is_none(), row.id() == "h3", "row {}", row.id());
    }
    let h1 = result.get("h1").and_then(|r| r.doc.as_ref()).expect("h1 doc");
    assert_eq!(h1.fields().name, Some("beer h1"));
}

#[test]
fn each_row_carries_its_own_document() {
    let ids = ["h4", "h2", "h9", "h1"];
    let store = FakeStore::new(4, &ids);
    let result = aggregate(&store, "fts_idx_beers", &stout_query(), &SearchOptions::default()).expect("aggregate");
    for row in &result.rows {
        let doc = row.doc.as_ref().expect("fetched");
        assert_eq!(doc.fields().name.map(str::to_string), Some(format!("beer {}", row.id())));
    }
}

#[test]
fn unavailable_fetch_degrades_instead_of_failing() {
    let mut store = FakeStore::new(12, &["a", "b", "c"]);
    store.unavailable = true;
    let result = aggregate(&store, "fts_idx_beers", &stout_query(), &SearchOptions::default()).expect("aggregate");
    assert_eq!(result.total_hits, 12);
    assert_eq!(result.len(), 3);
    assert!(result.rows.iter().all(|r| r.doc.is_none()));
}

#[test]
fn total_hits_comes_from_the_engine() {
    let store = FakeStore::new(12, &["a", "b", "c", "d", "e"]);
    let result = aggregate(&store, "fts_idx_beers", &stout_query(), &SearchOptions::default().with_limit(5)).expect("aggregate");
    assert_eq!(result.total_hits, 12);
    assert_eq!(result.len(), 5);
}

#[test]
fn empty_query_never_reaches_the_store() {
    let store = FakeStore::new(1, &["a"]);
    let empty = query::build("   ", &["name"], true).expect("query");
    let err = aggregate(&store, "fts_idx_beers", &empty, &SearchOptions::default()).unwrap_err();
    assert!(matches!(err, Error::EmptyQuery));
    assert_eq!(store.searches.load(Ordering::SeqCst), 0);
    assert_eq!(store.batch_fetches.load(Ordering::SeqCst), 0);
}

#[test]
fn search_errors_propagate_without_fetching() {
    let mut store = FakeStore::new(1, &["a"]);
    store.search_error = true;
    let err = aggregate(&store, "fts_idx_missing", &stout_query(), &SearchOptions::default()).unwrap_err();
    assert!(err.is_search());
    assert_eq!(store.searches.load(Ordering::SeqCst), 1);
    assert_eq!(store.batch_fetches.load(Ordering::SeqCst), 0);
}

#[test]
fn no_hits_means_no_fetch() {
    let store = FakeStore::new(0, &[]);
    let result = aggregate(&store, "fts_idx_beers", &stout_query(), &SearchOptions::default()).expect("aggregate");
    assert!(result.is_empty());
    assert_eq!(result.total_hits, 0);
    assert_eq!(store.batch_fetches.load(Ordering::SeqCst), 0);
}

#[test]
fn load_directory_reads_json_objects_by_stem() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("docs")).unwrap();
    fs::write(dir.join("docs/anchor_brewing.json"), r#"{"type":"brewery","name":"Anchor Brewing"}"#).unwrap();
    fs::write(dir.join("docs/anchor_brewing-liberty_ale.json"), r#"{"type":"beer","name":"Liberty Ale"}"#).unwrap();
    fs::write(dir.join("docs/broken.json"), "{not json").unwrap();
    fs::write(dir.join("docs/list.json"), "[1, 2]").unwrap();
    fs::write(dir.join("docs/readme.txt"), "ignored").unwrap();

    let docs = DataProcessor::new().load_directory(dir).expect("load");
    let ids: Vec<&str> = docs.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, ["anchor_brewing-liberty_ale", "anchor_brewing"]);
    assert_eq!(docs[1].1["name"], "Anchor Brewing");
}

#[test]
fn load_directory_limited() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.json"), r#"{"name":"a"}"#).unwrap();
    fs::write(tmp.path().join("b.json"), r#"{"name":"b"}"#).unwrap();

    let docs = DataProcessor::with_limit(1).load_directory(tmp.path()).expect("load");
    assert_eq!(docs.len(), 1);
    assert!(DataProcessor::new().load_directory(&tmp.path().join("missing")).is_err());
}
