use serde_json::Value;

use crate::error::Result;
use crate::mutation::Mutation;
use crate::types::{BatchFetch, CompositeQuery, DocId, FetchOutcome, SearchOptions, SearchResults};

/// Key/value document store with named full-text indexes.
///
/// Every operation connects lazily; once a connection is established it is
/// reused. Reads fail open (`FetchOutcome::Unavailable`,
/// `BatchFetch::Unavailable`), writes and searches propagate errors.
pub trait DocumentStore: Send + Sync {
    fn connect(&self) -> Result<()>;

    fn fetch_one(&self, id: &str) -> FetchOutcome;

    fn fetch_many(&self, ids: &[DocId]) -> BatchFetch;

    fn search_full_text(
        &self,
        index_name: &str,
        query: &CompositeQuery,
        options: &SearchOptions,
    ) -> Result<SearchResults>;

    /// Upsert `body` under `id`. With `cas`, the write only succeeds if the
    /// stored document still carries that CAS. Returns the new CAS.
    fn save(&self, id: &str, body: &Value, cas: Option<u64>) -> Result<u64>;

    fn save_many(&self, docs: &[(DocId, Value)]) -> Result<usize>;

    fn delete(&self, id: &str) -> Result<()>;

    fn mutate(&self, id: &str, mutations: &[Mutation]) -> Result<u64>;
}
