//! Scalar SQL functions registered on every catalog connection.
//!
//! - `regexp(pattern, text)` backs SQLite's `text REGEXP pattern` operator.
//! - `casefold(text)` lowercases with full Unicode rules.
//! - `trigram_similarity(text, query)` scores approximate string closeness.

use crate::engine::similarity::{set_similarity, trigrams, Trigram};
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::collections::HashSet;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Register all catalog SQL functions on `conn`.
pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    register_regexp(conn)?;
    register_casefold(conn)?;
    register_trigram_similarity(conn)?;
    Ok(())
}

fn register_regexp(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            // Compiled once per statement and cached on the pattern argument
            let pattern: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> Result<_, BoxError> {
                Ok(Regex::new(vr.as_str()?)?)
            })?;
            let text: Option<String> = ctx.get(1)?;
            Ok(text.map(|t| pattern.is_match(&t)))
        },
    )
}

fn register_casefold(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

fn register_trigram_similarity(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "trigram_similarity",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            if matches!(ctx.get_raw(1), ValueRef::Null) {
                return Ok(None);
            }
            // The query side is constant per statement
            let query: Arc<HashSet<Trigram>> =
                ctx.get_or_create_aux(1, |vr| -> Result<_, BoxError> {
                    Ok(trigrams(vr.as_str()?))
                })?;
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| set_similarity(&trigrams(&t), &query)))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::similarity::trigram_similarity;

    fn connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();
        conn
    }

    #[test]
    fn test_regexp_operator() {
        let conn = connection();
        let matches = |code: &str| -> bool {
            conn.query_row(
                "SELECT ?1 REGEXP '^[A-Za-z][0-9]+$'",
                [code],
                |row| row.get(0),
            )
            .unwrap()
        };

        assert!(matches("A10"));
        assert!(matches("B2"));
        assert!(!matches("A10X"));
        assert!(!matches("10"));
        assert!(!matches("AB1"));
    }

    #[test]
    fn test_regexp_null_text() {
        let conn = connection();
        let result: Option<bool> = conn
            .query_row("SELECT NULL REGEXP 'x'", [], |row| row.get(0))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let conn = connection();
        let result: rusqlite::Result<bool> =
            conn.query_row("SELECT 'abc' REGEXP '('", [], |row| row.get(0));
        assert!(result.is_err());
    }

    #[test]
    fn test_trigram_similarity_function() {
        let conn = connection();
        let sim: f64 = conn
            .query_row(
                "SELECT trigram_similarity('Cholera', 'cholera')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(sim, 1.0);

        let sim: Option<f64> = conn
            .query_row("SELECT trigram_similarity(NULL, 'x')", [], |row| row.get(0))
            .unwrap();
        assert!(sim.is_none());

        let sim: Option<f64> = conn
            .query_row("SELECT trigram_similarity('x', NULL)", [], |row| row.get(0))
            .unwrap();
        assert!(sim.is_none());
    }

    #[test]
    fn test_trigram_similarity_over_rows() {
        let conn = connection();
        conn.execute_batch(
            "CREATE TABLE t (d TEXT);
             INSERT INTO t VALUES ('Iron deficiency anemia'), ('Cholera'), (NULL), ('anemia');",
        )
        .unwrap();

        let mut stmt = conn
            .prepare("SELECT d, trigram_similarity(d, ?1) FROM t ORDER BY rowid")
            .unwrap();
        let rows: Vec<(Option<String>, Option<f64>)> = stmt
            .query_map(["iron anemia"], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();

        assert_eq!(rows.len(), 4);
        for (text, sim) in rows {
            let expected = text.map(|t| trigram_similarity(&t, "iron anemia"));
            assert_eq!(sim, expected);
        }
    }

    #[test]
    fn test_casefold_is_unicode_aware() {
        let conn = connection();
        let folded: String = conn
            .query_row("SELECT casefold('Sample ÉMILE Ärger')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(folded, "sample émile ärger");

        let found: bool = conn
            .query_row(
                "SELECT instr(casefold('Sample \"quoted\" Émile child'), ?1) > 0",
                ["émile"],
                |row| row.get(0),
            )
            .unwrap();
        assert!(found);

        let folded: Option<String> = conn
            .query_row("SELECT casefold(NULL)", [], |row| row.get(0))
            .unwrap();
        assert!(folded.is_none());
    }
}
