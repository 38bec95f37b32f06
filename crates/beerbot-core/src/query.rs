//! Turns free text into a disjunctive multi-field full-text query.

use crate::error::{Error, Result};
use crate::types::{CompositeQuery, SubQuery};

/// Build the name/description style query.
///
/// Multi-word input gets one boosted phrase sub-query per target field
/// over the whole text. Every token then gets a match sub-query on every
/// target field, or only on the first one when `match_all_fields` is false.
/// Empty or whitespace-only input yields an empty query, which callers must
/// reject before searching.
pub fn build<S: AsRef<str>>(terms: &str, target_fields: &[S], match_all_fields: bool) -> Result<CompositeQuery> {
    let Some(designated) = target_fields.first() else {
        return Err(Error::MalformedQuery("at least one target field is required".to_string()));
    };

    let tokens: Vec<&str> = terms.split_whitespace().collect();
    let mut query = CompositeQuery::new();

    if tokens.len() > 1 {
        let phrase = terms.trim();
        for field in target_fields {
            query.push(SubQuery::phrase(phrase, field.as_ref()));
        }
    }

    for token in &tokens {
        if match_all_fields {
            for field in target_fields {
                query.push(SubQuery::matching(*token, field.as_ref()));
            }
        } else {
            query.push(SubQuery::matching(*token, designated.as_ref()));
        }
    }

    Ok(query)
}

/// Build the location style query: the whole text matched against each
/// field, with no phrase tier.
pub fn any_field<S: AsRef<str>>(text: &str, fields: &[S]) -> Result<CompositeQuery> {
    if fields.is_empty() {
        return Err(Error::MalformedQuery("at least one target field is required".to_string()));
    }
    let text = text.trim();
    if text.is_empty() {
        return Ok(CompositeQuery::new());
    }
    Ok(fields.iter().map(|f| SubQuery::matching(text, f.as_ref())).collect())
}
