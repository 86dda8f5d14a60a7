//! Catalog table, FTS5 search index and the triggers that keep them in sync.

use crate::Result;
use rusqlite::Connection;
use tracing::{debug, info};

/// Configuration for the full-text index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Name of the FTS5 virtual table.
    pub table_name: String,
    /// Tokenizer configuration.
    pub tokenizer: String,
    /// Prefix index lengths, speeds up `term*` queries.
    pub prefix: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            table_name: "icd_search".to_string(),
            tokenizer: "unicode61 remove_diacritics 2".to_string(),
            prefix: "2 3".to_string(),
        }
    }
}

/// Manager for schema setup and index maintenance.
pub struct SchemaManager<'a> {
    config: &'a IndexConfig,
}

impl<'a> SchemaManager<'a> {
    pub fn new(config: &'a IndexConfig) -> Self {
        Self { config }
    }

    /// Create the `icd_codes` table and its indexes.
    pub fn ensure_codes_table(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS icd_codes (
                id INTEGER PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                category TEXT,
                sub_category TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_icd_codes_category ON icd_codes(category);
            ",
        )?;
        Ok(())
    }

    /// Check if the FTS5 table exists.
    pub fn index_exists(&self, conn: &Connection) -> Result<bool> {
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [&self.config.table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Check if the sync triggers exist.
    pub fn triggers_exist(&self, conn: &Connection) -> Result<bool> {
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='trigger' AND name IN (?1, ?2, ?3)",
            [
                format!("{}_ai", self.config.table_name),
                format!("{}_au", self.config.table_name),
                format!("{}_ad", self.config.table_name),
            ],
            |row| row.get(0),
        )?;
        Ok(count == 3)
    }

    /// Ensure the codes table, the index and its triggers all exist.
    pub fn ensure_setup(&self, conn: &Connection) -> Result<()> {
        self.ensure_codes_table(conn)?;

        if !self.index_exists(conn)? {
            self.create_index(conn)?;
            self.populate(conn)?;
        } else if !self.triggers_exist(conn)? {
            // Rows may have been written without triggers; resync
            self.populate(conn)?;
        }

        self.create_triggers(conn)?;
        Ok(())
    }

    /// Create the FTS5 external-content table over `code` and `description`.
    pub fn create_index(&self, conn: &Connection) -> Result<()> {
        let sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING fts5(
                code,
                description,
                content='icd_codes',
                content_rowid='id',
                tokenize='{}',
                prefix='{}'
            )",
            self.config.table_name, self.config.tokenizer, self.config.prefix
        );

        conn.execute(&sql, [])?;
        info!("Created FTS5 table: {}", self.config.table_name);
        Ok(())
    }

    /// Create triggers to keep the index in sync with `icd_codes`.
    pub fn create_triggers(&self, conn: &Connection) -> Result<()> {
        let table = &self.config.table_name;

        let sql = format!(
            "CREATE TRIGGER IF NOT EXISTS {table}_ai AFTER INSERT ON icd_codes BEGIN
                INSERT INTO {table}(rowid, code, description)
                VALUES (NEW.id, NEW.code, NEW.description);
            END;

            CREATE TRIGGER IF NOT EXISTS {table}_ad AFTER DELETE ON icd_codes BEGIN
                INSERT INTO {table}({table}, rowid, code, description)
                VALUES ('delete', OLD.id, OLD.code, OLD.description);
            END;

            CREATE TRIGGER IF NOT EXISTS {table}_au AFTER UPDATE ON icd_codes BEGIN
                INSERT INTO {table}({table}, rowid, code, description)
                VALUES ('delete', OLD.id, OLD.code, OLD.description);
                INSERT INTO {table}(rowid, code, description)
                VALUES (NEW.id, NEW.code, NEW.description);
            END;"
        );
        conn.execute_batch(&sql)?;

        debug!("Created FTS5 triggers for {}", table);
        Ok(())
    }

    /// Rebuild index content from `icd_codes`.
    pub fn populate(&self, conn: &Connection) -> Result<()> {
        let table = &self.config.table_name;
        conn.execute_batch(&format!("INSERT INTO {table}({table}) VALUES('rebuild');"))?;
        info!("Populated {} from icd_codes", table);
        Ok(())
    }

    /// Drop and recreate the index and triggers.
    pub fn rebuild(&self, conn: &Connection) -> Result<()> {
        let table = &self.config.table_name;
        conn.execute_batch(&format!(
            "DROP TRIGGER IF EXISTS {table}_ai;
             DROP TRIGGER IF EXISTS {table}_au;
             DROP TRIGGER IF EXISTS {table}_ad;
             DROP TABLE IF EXISTS {table};"
        ))?;

        self.create_index(conn)?;
        self.create_triggers(conn)?;
        self.populate(conn)?;

        info!("Rebuilt search index");
        Ok(())
    }

    /// Merge index segments.
    pub fn optimize(&self, conn: &Connection) -> Result<()> {
        let table = &self.config.table_name;
        conn.execute(&format!("INSERT INTO {table}({table}) VALUES('optimize')"), [])?;
        debug!("Optimized search index");
        Ok(())
    }

    /// Get statistics about the index.
    pub fn stats(&self, conn: &Connection) -> Result<IndexStats> {
        let row_count: usize = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.config.table_name),
            [],
            |row| row.get(0),
        )?;

        Ok(IndexStats {
            table_name: self.config.table_name.clone(),
            row_count,
            tokenizer: self.config.tokenizer.clone(),
        })
    }
}

/// Statistics about the search index.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub table_name: String,
    pub row_count: usize,
    pub tokenizer: String,
}
