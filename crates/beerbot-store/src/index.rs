use std::collections::HashMap;

use serde_json::Value;
use tantivy::schema::{Facet, Value as _};
use tantivy::TantivyDocument;
use tracing::debug;

use beerbot_core::error::{Error, Result};
use beerbot_core::mutation::{self, Mutation};
use beerbot_core::types::{DocId, DocumentBody};

use crate::connection::{op_err, Connection};

impl Connection {
    /// Build the tantivy document for `body`: the raw JSON is stored as-is,
    /// known string keys are indexed for search and faceting.
    pub(crate) fn to_document(&self, id: &str, body: &Value, cas: u64) -> Result<TantivyDocument> {
        if !body.is_object() {
            return Err(Error::Operation(format!("document {id} must be a JSON object")));
        }
        let f = &self.fields;
        let mut doc = TantivyDocument::default();
        doc.add_text(f.id, id);
        doc.add_text(f.source, serde_json::to_string(body).map_err(|e| Error::Operation(e.to_string()))?);
        doc.add_u64(f.cas, cas);
        if let Some(kind) = string_value(body, "type") {
            doc.add_text(f.doc_type, kind);
        }
        for (key, field) in &f.text {
            if let Some(text) = string_value(body, key) {
                doc.add_text(*field, text);
            }
        }
        for (key, field) in &f.facets {
            if let Some(value) = string_value(body, key) {
                doc.add_facet(*field, Facet::from_path([value]));
            }
        }
        Ok(doc)
    }

    pub(crate) fn decode(&self, doc: &TantivyDocument) -> Result<(DocId, DocumentBody)> {
        let id = doc
            .get_first(self.fields.id)
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Operation("stored document has no id".to_string()))?
            .to_string();
        let source = doc
            .get_first(self.fields.source)
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Operation(format!("stored document {id} has no source")))?;
        let value: Value = serde_json::from_str(source).map_err(|e| Error::Operation(format!("document {id}: {e}")))?;
        let cas = doc.get_first(self.fields.cas).and_then(|v| v.as_u64()).unwrap_or(0);
        Ok((id, DocumentBody::new(value, cas)))
    }

    pub fn save(&self, id: &str, body: &Value, cas: Option<u64>) -> Result<u64> {
        self.write(|conn, writer| {
            let current = conn.find(id)?.map(|d| d.cas());
            let next = match (cas, current) {
                (Some(_), None) => return Err(Error::NotFound(id.to_string())),
                (Some(expected), Some(actual)) if expected != actual => {
                    return Err(Error::CasMismatch { id: id.to_string(), expected, actual })
                }
                (_, current) => current.unwrap_or(0) + 1,
            };
            let doc = conn.to_document(id, body, next)?;
            writer.delete_term(conn.id_term(id));
            writer.add_document(doc).map_err(op_err)?;
            Ok(next)
        })
    }

    pub fn save_many(&self, docs: &[(DocId, Value)]) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        self.write(|conn, writer| {
            let ids: Vec<DocId> = docs.iter().map(|(id, _)| id.clone()).collect();
            let current: HashMap<DocId, u64> =
                conn.find_many(&ids)?.into_iter().map(|(id, body)| (id, body.cas())).collect();
            for (id, body) in docs {
                let next = current.get(id).copied().unwrap_or(0) + 1;
                let doc = conn.to_document(id, body, next)?;
                writer.delete_term(conn.id_term(id));
                writer.add_document(doc).map_err(op_err)?;
            }
            debug!(count = docs.len(), "saved batch");
            Ok(docs.len())
        })
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.write(|conn, writer| {
            if conn.find(id)?.is_none() {
                return Err(Error::NotFound(id.to_string()));
            }
            writer.delete_term(conn.id_term(id));
            Ok(())
        })
    }

    pub fn mutate(&self, id: &str, mutations: &[Mutation]) -> Result<u64> {
        self.write(|conn, writer| {
            let current = conn.find(id)?.ok_or_else(|| Error::NotFound(id.to_string()))?;
            let next = current.cas() + 1;
            let mut value = current.into_value();
            mutation::apply_all(&mut value, mutations)?;
            let doc = conn.to_document(id, &value, next)?;
            writer.delete_term(conn.id_term(id));
            writer.add_document(doc).map_err(op_err)?;
            Ok(next)
        })
    }
}

fn string_value<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}
