use std::collections::BTreeMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tantivy::collector::{Count, FacetCollector, TopDocs};
use tantivy::query::Query;
use tantivy::schema::{Facet, Field, Value};
use tantivy::snippet::{Snippet, SnippetGenerator};
use tantivy::{Searcher, TantivyDocument};
use tracing::debug;

use beerbot_core::config::IndexDefinition;
use beerbot_core::error::{Error, Result};
use beerbot_core::types::{
    CompositeQuery, FacetCount, FacetResult, HighlightStyle, Hit, SearchOptions, SearchResults, TermFacet,
};

use crate::compile::compile;
use crate::connection::{op_err, Connection};
use crate::tantivy_utils::{facet_field_name, FACET_FIELDS};

/// Everything a search needs, owned, so it can run on a worker thread.
struct SearchPlan {
    query: Box<dyn Query>,
    limit: usize,
    offset: usize,
    id_field: Field,
    projections: Vec<(String, Field)>,
    highlights: Vec<(String, Field)>,
    style: HighlightStyle,
    facets: Vec<(TermFacet, String)>,
}

impl Connection {
    pub fn search(
        &self,
        def: &IndexDefinition,
        query: &CompositeQuery,
        options: &SearchOptions,
        default_limit: usize,
    ) -> Result<SearchResults> {
        let searcher = self.searcher();
        let (limit, offset) = page_window(
            options.limit.unwrap_or(default_limit),
            options.offset.unwrap_or(0),
            searcher.num_docs(),
        )?;
        let plan = SearchPlan {
            query: compile(&self.index, &self.fields, def, query)?,
            limit,
            offset,
            id_field: self.fields.id,
            projections: self.resolve_fields(def, options.fields.as_deref())?,
            highlights: self.resolve_fields(def, options.highlight_fields.as_deref())?,
            style: options.highlight_style,
            facets: resolve_facets(options.facets.as_deref())?,
        };
        debug!(index = %def.name, subqueries = query.len(), limit = plan.limit, offset = plan.offset, "full-text search");
        run_with_timeout(options.timeout, move || plan.run(&searcher))
    }

    fn resolve_fields(&self, def: &IndexDefinition, names: Option<&[String]>) -> Result<Vec<(String, Field)>> {
        let Some(names) = names else { return Ok(Vec::new()) };
        names
            .iter()
            .map(|name| {
                if !def.fields.contains(name) {
                    return Err(Error::MalformedQuery(format!("field '{name}' is not part of index '{}'", def.name)));
                }
                self.fields
                    .text_field(name)
                    .map(|f| (name.clone(), f))
                    .ok_or_else(|| Error::MalformedQuery(format!("field '{name}' is not stored")))
            })
            .collect()
    }
}

/// Clamp a page to the documents that exist. A window that cannot be
/// represented is rejected.
fn page_window(limit: usize, offset: usize, num_docs: u64) -> Result<(usize, usize)> {
    if limit.checked_add(offset).is_none() {
        return Err(Error::MalformedQuery(format!("limit {limit} plus offset {offset} overflows")));
    }
    let num_docs = usize::try_from(num_docs).unwrap_or(usize::MAX);
    let offset = offset.min(num_docs);
    Ok((limit.min(num_docs - offset), offset))
}

fn resolve_facets(facets: Option<&[TermFacet]>) -> Result<Vec<(TermFacet, String)>> {
    let Some(facets) = facets else { return Ok(Vec::new()) };
    facets
        .iter()
        .map(|facet| {
            if !FACET_FIELDS.contains(&facet.field.as_str()) {
                return Err(Error::MalformedQuery(format!("field '{}' cannot be faceted", facet.field)));
            }
            if facet.size == 0 {
                return Err(Error::MalformedQuery(format!("facet '{}' has size 0", facet.name)));
            }
            Ok((facet.clone(), facet_field_name(&facet.field)))
        })
        .collect()
}

impl SearchPlan {
    fn run(self, searcher: &Searcher) -> Result<SearchResults> {
        let query = &*self.query;
        let (top_docs, total) = if self.limit == 0 {
            (Vec::new(), searcher.search(query, &Count).map_err(op_err)?)
        } else {
            let top = TopDocs::with_limit(self.limit).and_offset(self.offset);
            searcher.search(query, &(top, Count)).map_err(op_err)?
        };

        let generators = self
            .highlights
            .iter()
            .map(|(name, field)| {
                SnippetGenerator::create(searcher, query, *field)
                    .map(|g| (name.as_str(), g))
                    .map_err(op_err)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr).map_err(op_err)?;
            let id = doc
                .get_first(self.id_field)
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::Operation("hit without id".to_string()))?;
            let mut hit = Hit::new(id, score);
            for (name, field) in &self.projections {
                if let Some(value) = doc.get_first(*field).and_then(|v| v.as_str()) {
                    hit.fields.insert(name.clone(), value.to_string());
                }
            }
            for (name, generator) in &generators {
                let snippet = generator.snippet_from_doc(&doc);
                if !snippet.is_empty() {
                    hit.fragments.insert((*name).to_string(), vec![render(&snippet, self.style)]);
                }
            }
            hits.push(hit);
        }

        let mut facets = Vec::with_capacity(self.facets.len());
        for (request, facet_field) in &self.facets {
            let mut collector = FacetCollector::for_field(facet_field);
            collector.add_facet(Facet::root());
            let counts = searcher.search(query, &collector).map_err(op_err)?;
            let terms = counts
                .top_k(Facet::root(), request.size)
                .into_iter()
                .map(|(facet, count)| FacetCount { term: facet_label(facet), count })
                .collect();
            facets.push(FacetResult { name: request.name.clone(), field: request.field.clone(), terms });
        }

        Ok(SearchResults::new(total as u64, hits, facets))
    }
}

fn facet_label(facet: &Facet) -> String {
    let path = facet.to_string();
    path.rsplit('/').next().unwrap_or_default().to_string()
}

fn render(snippet: &Snippet, style: HighlightStyle) -> String {
    match style {
        HighlightStyle::Html => snippet.to_html(),
        HighlightStyle::Ansi => {
            let fragment = snippet.fragment();
            let mut out = String::with_capacity(fragment.len() + 16);
            let mut cursor = 0;
            for range in snippet.highlighted() {
                out.push_str(&fragment[cursor..range.start]);
                out.push_str("\x1b[43m");
                out.push_str(&fragment[range.start..range.end]);
                out.push_str("\x1b[0m");
                cursor = range.end;
            }
            out.push_str(&fragment[cursor..]);
            out
        }
    }
}

/// Run `job` inline, or on a worker thread when a timeout is set. A job
/// that outlives its timeout is abandoned; its result is dropped.
fn run_with_timeout<T, F>(timeout: Option<Duration>, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let Some(timeout) = timeout else { return job() };
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("beerbot-search".to_string())
        .spawn(move || {
            let _ = tx.send(job());
        })
        .map_err(|e| Error::Operation(format!("spawn search worker: {e}")))?;
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(Error::Timeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(Error::Operation("search worker exited".to_string())),
    }
}
