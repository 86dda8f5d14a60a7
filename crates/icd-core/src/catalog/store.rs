//! The code catalog: schema ownership, record loading and the read pool.

use crate::catalog::pool::{CatalogPool, PoolOptions};
use crate::catalog::schema::{IndexConfig, IndexStats, SchemaManager};
use crate::config::SearchConfig;
use crate::{CatalogError, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRecord {
    /// Canonical code without separator, e.g. `A100`.
    pub code: String,
    pub description: String,
    /// Code of the parent category, if any.
    pub category: Option<String>,
    pub sub_category: Option<String>,
}

impl CodeRecord {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            category: None,
            sub_category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_sub_category(mut self, sub_category: impl Into<String>) -> Self {
        self.sub_category = Some(sub_category.into());
        self
    }

    /// Check the record is loadable.
    pub fn validate(&self) -> Result<()> {
        if self.code.is_empty() {
            return Err(CatalogError::Validation {
                field: "code".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self
            .code
            .chars()
            .any(|c| c.is_whitespace() || c == SearchConfig::CODE_SEPARATOR)
        {
            return Err(CatalogError::Validation {
                field: "code".to_string(),
                message: format!("'{}' is not in canonical form", self.code),
            });
        }
        if self.description.trim().is_empty() {
            return Err(CatalogError::Validation {
                field: "description".to_string(),
                message: format!("missing for code {}", self.code),
            });
        }
        Ok(())
    }

    /// Read a record from a row of `code, description, category, sub_category`.
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get(0)?,
            description: row.get(1)?,
            category: row.get(2)?,
            sub_category: row.get(3)?,
        })
    }
}

/// SQLite code catalog with an FTS5 index.
///
/// Writes go through a single mutex-guarded connection. Searches use the
/// read pool returned by [`Catalog::pool`].
pub struct Catalog {
    db_path: PathBuf,
    writer: Arc<Mutex<Connection>>,
    pool: CatalogPool,
    index_config: IndexConfig,
}

impl Catalog {
    /// Create or open a catalog at the given path.
    pub fn open(db_path: impl Into<PathBuf>, pool_options: PoolOptions) -> Result<Self> {
        let db_path = db_path.into();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CatalogError::io_with_path(e, parent))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        Self::configure_connection(&conn, &pool_options)?;

        let index_config = IndexConfig::default();
        SchemaManager::new(&index_config).ensure_setup(&conn)?;

        let pool = CatalogPool::open(&db_path, pool_options)?;
        info!("Catalog ready at {}", db_path.display());

        Ok(Self {
            db_path,
            writer: Arc::new(Mutex::new(conn)),
            pool,
            index_config,
        })
    }

    fn configure_connection(conn: &Connection, options: &PoolOptions) -> Result<()> {
        conn.busy_timeout(options.busy_timeout)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            ",
        )?;
        Ok(())
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| CatalogError::database("Failed to acquire connection lock"))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// The read-only connection pool used by the query engine.
    pub fn pool(&self) -> &CatalogPool {
        &self.pool
    }

    /// Insert or update a record.
    pub fn upsert(&self, record: &CodeRecord) -> Result<()> {
        record.validate()?;
        let conn = self.writer()?;
        Self::upsert_with(&conn, record)?;
        debug!("Upserted code: {}", record.code);
        Ok(())
    }

    /// Insert or update many records in one transaction.
    pub fn upsert_batch(&self, records: &[CodeRecord]) -> Result<usize> {
        for record in records {
            record.validate()?;
        }

        let mut conn = self.writer()?;
        let tx = conn.transaction()?;
        for record in records {
            Self::upsert_with(&tx, record)?;
        }
        tx.commit()?;

        debug!("Upserted {} codes", records.len());
        Ok(records.len())
    }

    fn upsert_with(conn: &Connection, record: &CodeRecord) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO icd_codes (code, description, category, sub_category)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(code) DO UPDATE SET
                 description=excluded.description,
                 category=excluded.category,
                 sub_category=excluded.sub_category",
            params![
                record.code,
                record.description,
                record.category,
                record.sub_category,
            ],
        )
    }

    /// Get a record by code.
    pub fn get(&self, code: &str) -> Result<Option<CodeRecord>> {
        let conn = self.writer()?;
        let record = conn
            .query_row(
                "SELECT code, description, category, sub_category
                 FROM icd_codes WHERE code = ?1",
                params![code],
                CodeRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Number of records in the catalog.
    pub fn count(&self) -> Result<usize> {
        let conn = self.writer()?;
        let count: usize = conn.query_row("SELECT COUNT(*) FROM icd_codes", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Rebuild the search index from the codes table.
    pub fn rebuild_index(&self) -> Result<()> {
        let conn = self.writer()?;
        SchemaManager::new(&self.index_config).rebuild(&conn)
    }

    /// Merge search index segments.
    pub fn optimize_index(&self) -> Result<()> {
        let conn = self.writer()?;
        SchemaManager::new(&self.index_config).optimize(&conn)
    }

    pub fn index_stats(&self) -> Result<IndexStats> {
        let conn = self.writer()?;
        SchemaManager::new(&self.index_config).stats(&conn)
    }

    /// Close the read pool. Writes through this handle keep working.
    pub fn close(&self) {
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_catalog() -> (Catalog, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let catalog =
            Catalog::open(temp_dir.path().join("data").join("icd.db"), PoolOptions::default())
                .unwrap();
        (catalog, temp_dir)
    }

    #[test]
    fn test_upsert_and_get() {
        let (catalog, _temp) = create_test_catalog();

        let record = CodeRecord::new("A000", "Cholera due to Vibrio cholerae 01")
            .with_category("A00")
            .with_sub_category("biovar cholerae");
        catalog.upsert(&record).unwrap();

        let loaded = catalog.get("A000").unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(catalog.get("Z999").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let (catalog, _temp) = create_test_catalog();

        catalog.upsert(&CodeRecord::new("A00", "Cholera")).unwrap();
        catalog.upsert(&CodeRecord::new("A00", "Cholera, all")).unwrap();

        assert_eq!(catalog.count().unwrap(), 1);
        assert_eq!(catalog.get("A00").unwrap().unwrap().description, "Cholera, all");
    }

    #[test]
    fn test_upsert_batch() {
        let (catalog, _temp) = create_test_catalog();

        let records = vec![
            CodeRecord::new("A00", "Cholera"),
            CodeRecord::new("A000", "Cholera due to Vibrio cholerae").with_category("A00"),
            CodeRecord::new("A01", "Typhoid and paratyphoid fevers"),
        ];
        assert_eq!(catalog.upsert_batch(&records).unwrap(), 3);
        assert_eq!(catalog.count().unwrap(), 3);
        assert_eq!(catalog.index_stats().unwrap().row_count, 3);
    }

    #[test]
    fn test_batch_with_invalid_record_writes_nothing() {
        let (catalog, _temp) = create_test_catalog();

        let records = vec![
            CodeRecord::new("A00", "Cholera"),
            CodeRecord::new("A00.0", "Dotted code"),
        ];
        assert!(matches!(
            catalog.upsert_batch(&records),
            Err(CatalogError::Validation { .. })
        ));
        assert_eq!(catalog.count().unwrap(), 0);
    }

    #[test]
    fn test_record_validation() {
        assert!(CodeRecord::new("A00", "Cholera").validate().is_ok());
        assert!(CodeRecord::new("", "Empty").validate().is_err());
        assert!(CodeRecord::new("A 00", "Space").validate().is_err());
        assert!(CodeRecord::new("A00", "  ").validate().is_err());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("icd.db");

        {
            let catalog = Catalog::open(&db_path, PoolOptions::default()).unwrap();
            catalog.upsert(&CodeRecord::new("B20", "HIV disease")).unwrap();
        }

        let catalog = Catalog::open(&db_path, PoolOptions::default()).unwrap();
        assert_eq!(catalog.count().unwrap(), 1);
        catalog.rebuild_index().unwrap();
        assert_eq!(catalog.index_stats().unwrap().row_count, 1);
    }
}
