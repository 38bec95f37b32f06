//! beerbot-core
//!
//! Domain types, configuration and the store-independent halves of the
//! search path: the query builder and the result aggregator.

pub mod aggregate;
pub mod config;
pub mod data_processor;
pub mod error;
pub mod mutation;
pub mod query;
pub mod traits;
pub mod types;

pub use aggregate::aggregate;
pub use error::{Error, Result};
pub use traits::DocumentStore;
