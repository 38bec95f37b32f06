//! Domain types shared by the query builder, the store and the aggregator.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

pub type DocId = String;

/// Boost applied to plain term matches.
pub const MATCH_BOOST: f32 = 1.0;
/// Boost applied to whole-phrase matches so exact multi-word hits rank first.
pub const PHRASE_BOOST: f32 = 3.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Match,
    MatchPhrase,
}

/// One leaf of a [`CompositeQuery`].
///
/// `Match` analyzes `text` and matches any of its terms in `field`;
/// `MatchPhrase` requires the analyzed terms to appear in sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubQuery {
    pub kind: QueryKind,
    pub text: String,
    pub field: String,
    pub boost: f32,
}

impl SubQuery {
    pub fn matching(text: impl Into<String>, field: impl Into<String>) -> Self {
        Self { kind: QueryKind::Match, text: text.into(), field: field.into(), boost: MATCH_BOOST }
    }

    pub fn phrase(text: impl Into<String>, field: impl Into<String>) -> Self {
        Self { kind: QueryKind::MatchPhrase, text: text.into(), field: field.into(), boost: PHRASE_BOOST }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }
}

/// Ordered disjunction of sub-queries: a document matches if any sub-query
/// matches, and every matching sub-query contributes to its score.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompositeQuery {
    subqueries: Vec<SubQuery>,
}

impl CompositeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subquery: SubQuery) {
        self.subqueries.push(subquery);
    }

    pub fn is_empty(&self) -> bool {
        self.subqueries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subqueries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SubQuery> {
        self.subqueries.iter()
    }

    pub fn subqueries(&self) -> &[SubQuery] {
        &self.subqueries
    }
}

impl FromIterator<SubQuery> for CompositeQuery {
    fn from_iter<I: IntoIterator<Item = SubQuery>>(iter: I) -> Self {
        Self { subqueries: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a CompositeQuery {
    type Item = &'a SubQuery;
    type IntoIter = std::slice::Iter<'a, SubQuery>;

    fn into_iter(self) -> Self::IntoIter {
        self.subqueries.iter()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HighlightStyle {
    #[default]
    Html,
    Ansi,
}

/// Term facet request: count the most frequent values of `field`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TermFacet {
    pub name: String,
    pub field: String,
    pub size: usize,
}

impl TermFacet {
    pub fn new(name: impl Into<String>, field: impl Into<String>, size: usize) -> Self {
        Self { name: name.into(), field: field.into(), size }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacetCount {
    pub term: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacetResult {
    pub name: String,
    pub field: String,
    pub terms: Vec<FacetCount>,
}

/// Paging, projection, highlighting and faceting knobs for a full-text search.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub fields: Option<Vec<String>>,
    pub highlight_fields: Option<Vec<String>>,
    pub highlight_style: HighlightStyle,
    pub facets: Option<Vec<TermFacet>>,
    pub timeout: Option<Duration>,
}

impl SearchOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_highlight(mut self, fields: Vec<String>, style: HighlightStyle) -> Self {
        self.highlight_fields = Some(fields);
        self.highlight_style = style;
        self
    }

    pub fn with_facets(mut self, facets: Vec<TermFacet>) -> Self {
        self.facets = Some(facets);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A single search hit. Opaque beyond `id`; `score` is engine-specific
/// and higher is better.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Hit {
    pub id: DocId,
    pub score: f32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fragments: BTreeMap<String, Vec<String>>,
}

impl Hit {
    pub fn new(id: impl Into<DocId>, score: f32) -> Self {
        Self { id: id.into(), score, ..Self::default() }
    }
}

/// One-shot stream of hits in engine order, plus the engine-reported total.
///
/// `total_hits` may exceed the number of hits yielded when a limit applies.
#[derive(Debug)]
pub struct SearchResults {
    total_hits: u64,
    facets: Vec<FacetResult>,
    hits: std::vec::IntoIter<Hit>,
}

impl SearchResults {
    pub fn new(total_hits: u64, hits: Vec<Hit>, facets: Vec<FacetResult>) -> Self {
        Self { total_hits, facets, hits: hits.into_iter() }
    }

    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    pub fn facets(&self) -> &[FacetResult] {
        &self.facets
    }

    pub fn take_facets(&mut self) -> Vec<FacetResult> {
        std::mem::take(&mut self.facets)
    }
}

impl Iterator for SearchResults {
    type Item = Hit;

    fn next(&mut self) -> Option<Hit> {
        self.hits.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.hits.size_hint()
    }
}

/// A stored JSON document together with its CAS (compare-and-swap) value.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentBody {
    value: Value,
    cas: u64,
}

impl DocumentBody {
    pub fn new(value: Value, cas: u64) -> Self {
        Self { value, cas }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn cas(&self) -> u64 {
        self.cas
    }

    /// Typed view over the optional display fields.
    pub fn fields(&self) -> DocFields<'_> {
        DocFields::from_value(&self.value)
    }
}

/// Optional string fields the bot knows how to display. Missing keys,
/// non-string values and empty strings all read as `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocFields<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub category: Option<&'a str>,
    pub style: Option<&'a str>,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub country: Option<&'a str>,
}

impl<'a> DocFields<'a> {
    pub fn from_value(value: &'a Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());
        Self {
            name: text("name"),
            description: text("description"),
            category: text("category"),
            style: text("style"),
            city: text("city"),
            state: text("state"),
            country: text("country"),
        }
    }
}

/// Result of a single-key fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(DocumentBody),
    NotFound,
    Unavailable(String),
}

/// Result of a batch fetch. `Fetched` may be partial: ids without a
/// document are simply absent.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchFetch {
    Fetched(std::collections::HashMap<DocId, DocumentBody>),
    Unavailable(String),
}

/// A hit merged with its fetched document, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub hit: Hit,
    pub doc: Option<DocumentBody>,
}

impl Row {
    pub fn id(&self) -> &str {
        &self.hit.id
    }
}

/// Search hits in engine order, each paired with its document body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedResult {
    pub total_hits: u64,
    pub rows: Vec<Row>,
    pub facets: Vec<FacetResult>,
}

impl AggregatedResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(Row::id)
    }

    pub fn get(&self, id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.hit.id == id)
    }
}
