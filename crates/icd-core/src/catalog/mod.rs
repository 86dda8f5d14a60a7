//! SQLite code catalog with FTS5 full-text search.
//!
//! This module provides:
//! - The `icd_codes` table and its weighted FTS5 index
//! - A bounded pool of read-only search connections
//! - SQL functions for regex matching and trigram similarity

mod functions;
mod pool;
mod schema;
mod store;

pub use pool::{CatalogPool, PoolOptions, PoolStatus, PooledConnection};
pub use schema::{IndexConfig, IndexStats, SchemaManager};
pub use store::{Catalog, CodeRecord};
