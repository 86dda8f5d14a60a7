//! # icd-search
//!
//! Full-text search over an ICD code catalog.
//!
//! The catalog is a SQLite database holding one row per code, indexed with
//! FTS5. The [`QueryEngine`] ranks matches, pulls in the top-level category
//! row of every matched child, and returns one row per code.
//!
//! ## Example
//!
//! ```rust,ignore
//! use icd_search::{Catalog, CodeRecord, EngineOptions, PoolOptions, QueryEngine};
//!
//! #[tokio::main]
//! async fn main() -> icd_search::Result<()> {
//!     let catalog = Catalog::open("icd_codes.db", PoolOptions::default())?;
//!     catalog.upsert(&CodeRecord::new("A00", "Cholera"))?;
//!
//!     let engine = QueryEngine::new(catalog.pool().clone(), EngineOptions::default())?;
//!     for result in engine.search("cholera").await? {
//!         println!("{} {} ({:.3})", result.formatted_code, result.description, result.rank);
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;

pub use catalog::{Catalog, CatalogPool, CodeRecord, PoolOptions, PoolStatus};
pub use config::{
    ColumnWeights, EngineOptions, MatchMode, PoolConfig, ResultOrder, SearchConfig, SimilarityMode,
};
pub use engine::{format_code, CodeSearch, QueryEngine, SearchResult};
pub use error::{CatalogError, Result};
