use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::DocId;

/// Loads JSON documents laid out one per file (`<id>.json`), the layout of
/// the beer-sample dataset.
#[derive(Default)]
pub struct DataProcessor {
    limit: Option<usize>,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_limit(limit: usize) -> Self { Self { limit: Some(limit) } }

    /// Every parseable JSON object under `data_dir`, keyed by file stem and
    /// ordered by path. Unreadable or non-object files are skipped.
    pub fn load_directory(&self, data_dir: &Path) -> Result<Vec<(DocId, Value)>> {
        if !data_dir.is_dir() {
            return Err(Error::NotFound(format!("data directory {}", data_dir.display())));
        }
        let mut files = self.list_json_files(data_dir);
        if let Some(limit) = self.limit {
            files.truncate(limit);
        }
        let mut docs = Vec::with_capacity(files.len());
        for path in &files {
            match self.read_document(path) {
                Ok(doc) => docs.push(doc),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping document"),
            }
        }
        info!(dir = %data_dir.display(), files = files.len(), loaded = docs.len(), "loaded documents");
        Ok(docs)
    }

    fn read_document(&self, path: &Path) -> Result<(DocId, Value)> {
        let id = self.extract_doc_id(path)?;
        let raw = fs::read_to_string(path).map_err(|e| Error::Operation(format!("read {}: {e}", path.display())))?;
        let value: Value = serde_json::from_str(&raw).map_err(|e| Error::Operation(format!("parse {}: {e}", path.display())))?;
        if !value.is_object() {
            return Err(Error::Operation(format!("{} is not a JSON object", path.display())));
        }
        Ok((id, value))
    }

    fn extract_doc_id(&self, path: &Path) -> Result<DocId> {
        path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| Error::Operation(format!("no file name in {}", path.display())))
    }

    fn list_json_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut json_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect();
        json_files.sort();
        json_files
    }
}
