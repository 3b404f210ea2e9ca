//! SQLite-backed namespaced response store.
//!
//! Each namespace is an isolated key to response map (one "cache" in browser
//! terms). Access is async via tokio-rusqlite. It supports:
//!
//! - Opening, enumerating and deleting whole namespaces
//! - Single-entry upserts (last write wins) and all-or-nothing batches
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::StoredResponse;
