//! Lowering of [`CompositeQuery`] into tantivy queries.

use tantivy::query::{BooleanQuery, BoostQuery, EmptyQuery, Occur, PhraseQuery, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, Term};

use beerbot_core::config::IndexDefinition;
use beerbot_core::error::{Error, Result};
use beerbot_core::types::{CompositeQuery, QueryKind, SubQuery};

use crate::tantivy_utils::StoreFields;

/// OR of all sub-queries, restricted to the definition's document type.
/// The type restriction contributes nothing to the score.
pub(crate) fn compile(
    index: &Index,
    fields: &StoreFields,
    def: &IndexDefinition,
    query: &CompositeQuery,
) -> Result<Box<dyn Query>> {
    if query.is_empty() {
        return Err(Error::EmptyQuery);
    }
    let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(query.len());
    for sub in query {
        clauses.push((Occur::Should, compile_subquery(index, fields, def, sub)?));
    }
    let disjunction: Box<dyn Query> = Box::new(BooleanQuery::new(clauses));

    Ok(match &def.doc_type {
        Some(doc_type) => {
            let type_term = Term::from_field_text(fields.doc_type, doc_type);
            let filter: Box<dyn Query> = Box::new(BoostQuery::new(
                Box::new(TermQuery::new(type_term, IndexRecordOption::Basic)),
                0.0,
            ));
            Box::new(BooleanQuery::new(vec![(Occur::Must, disjunction), (Occur::Must, filter)]))
        }
        None => disjunction,
    })
}

fn compile_subquery(index: &Index, fields: &StoreFields, def: &IndexDefinition, sub: &SubQuery) -> Result<Box<dyn Query>> {
    if !def.fields.iter().any(|f| f == &sub.field) {
        return Err(Error::MalformedQuery(format!("field '{}' is not part of index '{}'", sub.field, def.name)));
    }
    if !sub.boost.is_finite() || sub.boost < 0.0 {
        return Err(Error::MalformedQuery(format!("invalid boost {} on field '{}'", sub.boost, sub.field)));
    }
    let field = fields
        .text_field(&sub.field)
        .ok_or_else(|| Error::MalformedQuery(format!("field '{}' is not searchable", sub.field)))?;

    let tokens = analyze(index, field, &sub.text)?;
    let term_query = |text: &str| -> Box<dyn Query> {
        Box::new(TermQuery::new(Term::from_field_text(field, text), IndexRecordOption::WithFreqs))
    };
    let query: Box<dyn Query> = match (sub.kind, tokens.as_slice()) {
        (_, []) => Box::new(EmptyQuery),
        (_, [(_, only)]) => term_query(only.as_str()),
        (QueryKind::Match, many) => {
            Box::new(BooleanQuery::new(many.iter().map(|(_, t)| (Occur::Should, term_query(t.as_str()))).collect()))
        }
        (QueryKind::MatchPhrase, many) => Box::new(PhraseQuery::new_with_offset(
            many.iter().map(|(pos, t)| (*pos, Term::from_field_text(field, t))).collect(),
        )),
    };
    Ok(Box::new(BoostQuery::new(query, sub.boost)))
}

/// Run `text` through the field's analyzer, keeping token positions so
/// phrases with dropped stop words still line up.
fn analyze(index: &Index, field: Field, text: &str) -> Result<Vec<(usize, String)>> {
    let mut analyzer = index
        .tokenizer_for_field(field)
        .map_err(|e| Error::MalformedQuery(e.to_string()))?;
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        let token = stream.token();
        tokens.push((token.position, token.text.clone()));
    }
    Ok(tokens)
}
