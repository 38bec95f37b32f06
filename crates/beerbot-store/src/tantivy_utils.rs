use std::collections::HashMap;

use tantivy::schema::{
    FacetOptions, Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

use beerbot_core::error::{Error, Result};

pub const ID_FIELD: &str = "id";
pub const TYPE_FIELD: &str = "type";
pub const SOURCE_FIELD: &str = "_source";
pub const CAS_FIELD: &str = "_cas";
pub const TOKENIZER: &str = "text_with_stopwords";

/// Document keys indexed for full-text search (and stored for projection
/// and highlighting).
pub const TEXT_FIELDS: &[&str] = &["name", "description", "city", "state", "country", "style", "category"];

/// Document keys that can be faceted on. Each is indexed into a
/// `<key>_facet` facet field.
pub const FACET_FIELDS: &[&str] = &["type", "category", "style", "state", "country"];

pub fn facet_field_name(key: &str) -> String {
    format!("{key}_facet")
}

pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field(ID_FIELD, STRING | STORED);
    schema_builder.add_text_field(TYPE_FIELD, STRING | STORED);
    schema_builder.add_text_field(SOURCE_FIELD, STORED);
    schema_builder.add_u64_field(CAS_FIELD, STORED);
    let text_field_indexing = TextFieldIndexing::default()
        .set_tokenizer(TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let text_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();
    for name in TEXT_FIELDS {
        schema_builder.add_text_field(name, text_options.clone());
    }
    for name in FACET_FIELDS {
        schema_builder.add_facet_field(&facet_field_name(name), FacetOptions::default());
    }
    schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
    let stop_words = [
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "is", "it", "its", "of", "on",
        "that", "the", "to", "was", "will", "with", "or", "but", "not",
    ];
    let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
        .build();
    index.tokenizers().register(TOKENIZER, tokenizer);
}

/// Field handles resolved once per connection.
#[derive(Debug, Clone)]
pub struct StoreFields {
    pub id: Field,
    pub doc_type: Field,
    pub source: Field,
    pub cas: Field,
    pub text: HashMap<&'static str, Field>,
    pub facets: HashMap<&'static str, Field>,
}

impl StoreFields {
    /// Resolve every field the store relies on; an index created with a
    /// different schema is rejected here.
    pub fn resolve(schema: &Schema) -> Result<Self> {
        let get = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| Error::Operation(format!("index schema is missing field '{name}'")))
        };
        let mut text = HashMap::new();
        for name in TEXT_FIELDS {
            text.insert(*name, get(name)?);
        }
        let mut facets = HashMap::new();
        for name in FACET_FIELDS {
            facets.insert(*name, get(&facet_field_name(name))?);
        }
        Ok(Self { id: get(ID_FIELD)?, doc_type: get(TYPE_FIELD)?, source: get(SOURCE_FIELD)?, cas: get(CAS_FIELD)?, text, facets })
    }

    pub fn text_field(&self, name: &str) -> Option<Field> {
        self.text.get(name).copied()
    }
}
