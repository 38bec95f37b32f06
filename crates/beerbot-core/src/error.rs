use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot connect to store at {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("Full-text index not found: {0}")]
    IndexNotFound(String),

    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    #[error("Refusing to run an empty query")]
    EmptyQuery,

    #[error("Search timed out after {0:?}")]
    Timeout(Duration),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("CAS mismatch for {id}: expected {expected}, found {actual}")]
    CasMismatch { id: String, expected: u64, actual: u64 },

    #[error("Invalid document path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Message sink failed: {0}")]
    Sink(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// True for failures to reach the store at all.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// True for the search-side failures that end a request without retry.
    pub fn is_search(&self) -> bool {
        matches!(
            self,
            Error::IndexNotFound(_) | Error::MalformedQuery(_) | Error::EmptyQuery | Error::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
