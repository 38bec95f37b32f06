use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::Mutex;

use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{Index, IndexReader, IndexWriter, Searcher, TantivyDocument, Term};
use tracing::{debug, info};

use beerbot_core::config::StoreConfig;
use beerbot_core::error::{Error, Result};
use beerbot_core::types::{DocId, DocumentBody};

use crate::tantivy_utils::{build_schema, register_tokenizer, StoreFields};

pub(crate) fn op_err(e: tantivy::TantivyError) -> Error {
    Error::Operation(e.to_string())
}

/// An open bucket: the tantivy index, a reader, and a writer created on
/// the first write.
pub struct Connection {
    pub(crate) index: Index,
    pub(crate) reader: IndexReader,
    pub(crate) fields: StoreFields,
    writer: Mutex<Option<IndexWriter>>,
    writer_heap_bytes: usize,
}

impl Connection {
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let dir = config.bucket_dir();
        let fail = |reason: String| Error::Connection { url: config.url.clone(), reason };

        if !dir.is_dir() {
            if !config.create_if_missing {
                return Err(fail(format!("bucket '{}' not found at {}", config.bucket, dir.display())));
            }
            fs::create_dir_all(&dir).map_err(|e| fail(e.to_string()))?;
        }
        let directory = MmapDirectory::open(&dir).map_err(|e| fail(e.to_string()))?;
        let index = if config.create_if_missing {
            Index::open_or_create(directory, build_schema())
        } else {
            Index::open(directory)
        }
        .map_err(|e| fail(e.to_string()))?;
        register_tokenizer(&index);

        let fields = StoreFields::resolve(&index.schema()).map_err(|e| fail(e.to_string()))?;
        let reader = index.reader().map_err(|e| fail(e.to_string()))?;
        info!(bucket = %config.bucket, dir = %dir.display(), docs = reader.searcher().num_docs(), "connected to store");

        Ok(Self { index, reader, fields, writer: Mutex::new(None), writer_heap_bytes: config.writer_heap_bytes })
    }

    pub fn searcher(&self) -> Searcher {
        self.reader.searcher()
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub(crate) fn id_term(&self, id: &str) -> Term {
        Term::from_field_text(self.fields.id, id)
    }

    pub fn find(&self, id: &str) -> Result<Option<DocumentBody>> {
        let searcher = self.searcher();
        let query = TermQuery::new(self.id_term(id), IndexRecordOption::Basic);
        let top = searcher.search(&query, &TopDocs::with_limit(1)).map_err(op_err)?;
        match top.first() {
            Some((_, addr)) => {
                let doc: TantivyDocument = searcher.doc(*addr).map_err(op_err)?;
                Ok(Some(self.decode(&doc)?.1))
            }
            None => Ok(None),
        }
    }

    /// Look up all `ids` with one query. Unknown ids are absent from the map.
    pub fn find_many(&self, ids: &[DocId]) -> Result<HashMap<DocId, DocumentBody>> {
        let unique: HashSet<&str> = ids.iter().map(String::as_str).collect();
        if unique.is_empty() {
            return Ok(HashMap::new());
        }
        let clauses: Vec<(Occur, Box<dyn Query>)> = unique
            .iter()
            .map(|id| {
                let q: Box<dyn Query> = Box::new(TermQuery::new(self.id_term(id), IndexRecordOption::Basic));
                (Occur::Should, q)
            })
            .collect();
        let query = BooleanQuery::new(clauses);
        let searcher = self.searcher();
        let top = searcher.search(&query, &TopDocs::with_limit(unique.len())).map_err(op_err)?;

        let mut out = HashMap::with_capacity(top.len());
        for (_, addr) in top {
            let doc: TantivyDocument = searcher.doc(addr).map_err(op_err)?;
            let (id, body) = self.decode(&doc)?;
            out.insert(id, body);
        }
        debug!(requested = unique.len(), found = out.len(), "batch fetch");
        Ok(out)
    }

    /// Run `op` against the writer, then commit and refresh the reader. A
    /// failed `op` rolls back everything it staged.
    pub(crate) fn write<T>(&self, op: impl FnOnce(&Self, &IndexWriter) -> Result<T>) -> Result<T> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| Error::Operation("index writer lock poisoned".to_string()))?;
        if guard.is_none() {
            *guard = Some(self.index.writer_with_num_threads(1, self.writer_heap_bytes).map_err(op_err)?);
        }
        let writer = guard
            .as_mut()
            .ok_or_else(|| Error::Operation("index writer unavailable".to_string()))?;

        match op(self, writer) {
            Ok(out) => {
                writer.commit().map_err(op_err)?;
                self.reader.reload().map_err(op_err)?;
                Ok(out)
            }
            Err(e) => {
                writer.rollback().map_err(op_err)?;
                Err(e)
            }
        }
    }
}
