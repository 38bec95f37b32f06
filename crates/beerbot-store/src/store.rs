use std::sync::OnceLock;

use serde_json::Value;
use tracing::warn;

use beerbot_core::config::{SearchConfig, StoreConfig};
use beerbot_core::error::{Error, Result};
use beerbot_core::mutation::Mutation;
use beerbot_core::traits::DocumentStore;
use beerbot_core::types::{BatchFetch, CompositeQuery, DocId, FetchOutcome, SearchOptions, SearchResults};

use crate::connection::Connection;
use crate::tantivy_utils::TEXT_FIELDS;

/// Embedded document store: one tantivy index per bucket, holding the JSON
/// source of every document alongside its searchable fields.
///
/// The connection is opened on first use and kept for the lifetime of the
/// store.
pub struct TantivyStore {
    config: StoreConfig,
    default_limit: usize,
    conn: OnceLock<Connection>,
}

impl TantivyStore {
    pub fn new(config: StoreConfig) -> Result<Self> {
        Self::with_search_config(config, &SearchConfig::default())
    }

    pub fn with_search_config(config: StoreConfig, search: &SearchConfig) -> Result<Self> {
        for def in &config.indexes {
            if let Some(bad) = def.fields.iter().find(|f| !TEXT_FIELDS.contains(&f.as_str())) {
                return Err(Error::InvalidConfig(format!(
                    "index '{}' uses unknown field '{bad}' (known: {})",
                    def.name,
                    TEXT_FIELDS.join(", ")
                )));
            }
        }
        Ok(Self { config, default_limit: search.default_limit, conn: OnceLock::new() })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.conn.get().is_some()
    }

    /// Number of documents in the bucket.
    pub fn num_docs(&self) -> Result<u64> {
        Ok(self.connection()?.num_docs())
    }

    fn connection(&self) -> Result<&Connection> {
        if let Some(conn) = self.conn.get() {
            return Ok(conn);
        }
        let conn = Connection::open(&self.config)?;
        Ok(self.conn.get_or_init(|| conn))
    }
}

impl DocumentStore for TantivyStore {
    fn connect(&self) -> Result<()> {
        self.connection().map(|_| ())
    }

    fn fetch_one(&self, id: &str) -> FetchOutcome {
        match self.connection().and_then(|c| c.find(id)) {
            Ok(Some(doc)) => FetchOutcome::Found(doc),
            Ok(None) => FetchOutcome::NotFound,
            Err(e) => {
                warn!(id, error = %e, "fetch failed");
                FetchOutcome::Unavailable(e.to_string())
            }
        }
    }

    fn fetch_many(&self, ids: &[DocId]) -> BatchFetch {
        match self.connection().and_then(|c| c.find_many(ids)) {
            Ok(docs) => BatchFetch::Fetched(docs),
            Err(e) => {
                warn!(count = ids.len(), error = %e, "batch fetch failed");
                BatchFetch::Unavailable(e.to_string())
            }
        }
    }

    fn search_full_text(&self, index_name: &str, query: &CompositeQuery, options: &SearchOptions) -> Result<SearchResults> {
        let conn = self.connection()?;
        let def = self
            .config
            .index(index_name)
            .ok_or_else(|| Error::IndexNotFound(index_name.to_string()))?;
        let mut options = options.clone();
        if options.timeout.is_none() {
            options.timeout = self.config.timeout();
        }
        conn.search(def, query, &options, self.default_limit)
    }

    fn save(&self, id: &str, body: &Value, cas: Option<u64>) -> Result<u64> {
        self.connection()?.save(id, body, cas)
    }

    fn save_many(&self, docs: &[(DocId, Value)]) -> Result<usize> {
        self.connection()?.save_many(docs)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.connection()?.delete(id)
    }

    fn mutate(&self, id: &str, mutations: &[Mutation]) -> Result<u64> {
        self.connection()?.mutate(id, mutations)
    }
}
