//! Runs a query and stitches hits together with their document bodies.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::traits::DocumentStore;
use crate::types::{AggregatedResult, BatchFetch, CompositeQuery, DocId, Row, SearchOptions};

/// Execute `query` against `index_name` and merge the hits with their
/// documents.
///
/// All hit ids are fetched with a single `fetch_many` call. If the store
/// cannot serve that fetch the rows are returned without documents rather
/// than failing the request.
pub fn aggregate<S>(store: &S, index_name: &str, query: &CompositeQuery, options: &SearchOptions) -> Result<AggregatedResult>
where
    S: DocumentStore + ?Sized,
{
    if query.is_empty() {
        return Err(Error::EmptyQuery);
    }

    let mut results = store.search_full_text(index_name, query, options)?;
    let total_hits = results.total_hits();
    let facets = results.take_facets();
    let mut rows: Vec<Row> = results.by_ref().map(|hit| Row { hit, doc: None }).collect();
    debug!(index = index_name, total_hits, streamed = rows.len(), "search complete");

    if rows.is_empty() {
        return Ok(AggregatedResult { total_hits, rows, facets });
    }

    let ids: Vec<DocId> = rows.iter().map(|r| r.hit.id.clone()).collect();
    match store.fetch_many(&ids) {
        BatchFetch::Fetched(mut docs) => {
            for row in &mut rows {
                row.doc = docs.remove(&row.hit.id);
            }
            let missing = rows.iter().filter(|r| r.doc.is_none()).count();
            if missing > 0 {
                debug!(index = index_name, missing, "hits without a stored document");
            }
        }
        BatchFetch::Unavailable(reason) => {
            warn!(index = index_name, %reason, "batch fetch unavailable, returning hits without documents");
        }
    }

    Ok(AggregatedResult { total_hits, rows, facets })
}
