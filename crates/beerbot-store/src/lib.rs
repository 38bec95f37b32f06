//! beerbot-store
//!
//! Tantivy-backed document store: key/value fetches, writes with CAS and
//! sub-document mutations, and named full-text indexes over one bucket.

mod compile;
pub mod connection;
mod index;
mod search;
pub mod store;
pub mod tantivy_utils;

pub use connection::Connection;
pub use store::TantivyStore;
