//! Search statement construction and execution.
//!
//! One statement does the whole ranking pass:
//!
//! 1. `matched`: rows selected by the full-text or contains predicate, with
//!    rank and similarity
//! 2. `parents`: top-level category rows of matched children, rank 0
//! 3. `deduped`: union of both, one row per code, best rank first
//! 4. ordered and capped

use super::query::{code_needle, substring_needle, MatchExpression};
use super::types::SearchResult;
use crate::config::{EngineOptions, ResultOrder, SearchConfig, SimilarityMode};
use crate::Result;
use rusqlite::{Connection, ToSql};

/// Incrementally built SQL with positional parameters in textual order.
#[derive(Default)]
pub(crate) struct StatementBuilder {
    sql: String,
    params: Vec<Box<dyn ToSql>>,
}

impl StatementBuilder {
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    pub fn push_bind<T: ToSql + 'static>(&mut self, value: T) -> &mut Self {
        self.sql.push('?');
        self.params.push(Box::new(value));
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

/// How candidate rows are selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Matcher {
    /// Rendered FTS5 expression.
    FullText(String),
    /// Case-folded needles for description/code, and for the canonical code
    /// form.
    Substring {
        needle: String,
        code_needle: Option<String>,
    },
    /// Nothing searchable; matches no rows.
    Empty,
}

/// A fully resolved search, ready to run on a connection.
#[derive(Debug, Clone)]
pub(crate) struct SearchPlan {
    pub matcher: Matcher,
    pub text: String,
    options: EngineOptions,
}

impl SearchPlan {
    pub fn new(raw: &str, options: &EngineOptions) -> Self {
        // SQLite string functions stop at NUL
        let text: String = raw
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect::<String>()
            .trim()
            .to_string();

        let matcher = if text.is_empty() {
            Matcher::Empty
        } else {
            match MatchExpression::parse(&text, options.match_mode, options.prefix_last_term) {
                Some(expression) => Matcher::FullText(expression.render()),
                // Substring mode, or nothing left for the full-text parser
                None => Matcher::Substring {
                    needle: substring_needle(&text),
                    code_needle: code_needle(&text),
                },
            }
        };

        Self {
            matcher,
            text,
            options: options.clone(),
        }
    }

    fn push_similarity(&self, builder: &mut StatementBuilder) {
        builder
            .push("trigram_similarity(c.description, ")
            .push_bind(self.text.clone())
            .push(")");
    }

    fn push_rank(&self, builder: &mut StatementBuilder) {
        builder.push("(");
        match &self.matcher {
            Matcher::FullText(_) => {
                let weights = self.options.column_weights;
                builder
                    .push("-bm25(icd_search, ")
                    .push_bind(weights.code)
                    .push(", ")
                    .push_bind(weights.description)
                    .push(")");
            }
            Matcher::Substring { .. } | Matcher::Empty => {
                builder.push("0.0");
            }
        }
        builder.push(")");

        if self.options.similarity == SimilarityMode::Additive {
            builder
                .push(" + ")
                .push_bind(self.options.similarity_weight)
                .push(" * ");
            self.push_similarity(builder);
        }
    }

    fn push_matched(&self, builder: &mut StatementBuilder) {
        builder.push(
            "matched AS MATERIALIZED (
                SELECT c.code, c.description, c.category, c.sub_category, ",
        );
        self.push_rank(builder);
        builder.push(" AS rank, ");
        if self.options.similarity.is_enabled() {
            self.push_similarity(builder);
        } else {
            builder.push("NULL");
        }
        builder.push(" AS sim, 0 AS synthetic\n");

        match &self.matcher {
            Matcher::FullText(expression) => {
                builder
                    .push(
                        "FROM icd_search
                         JOIN icd_codes c ON c.id = icd_search.rowid
                         WHERE icd_search MATCH ",
                    )
                    .push_bind(expression.clone());
            }
            Matcher::Substring {
                needle,
                code_needle,
            } => {
                builder
                    .push("FROM icd_codes c WHERE (instr(casefold(c.code), ")
                    .push_bind(needle.clone())
                    .push(") > 0 OR instr(casefold(c.description), ")
                    .push_bind(needle.clone())
                    .push(") > 0");
                if let Some(code_needle) = code_needle {
                    builder
                        .push(" OR instr(casefold(c.code), ")
                        .push_bind(code_needle.clone())
                        .push(") > 0");
                }
                builder.push(")");
            }
            Matcher::Empty => {
                builder.push("FROM icd_codes c WHERE 0");
            }
        }
        builder.push("\n)");
    }

    fn push_parents(&self, builder: &mut StatementBuilder) {
        let parent_sim = if self.options.similarity.is_enabled() {
            "0.0"
        } else {
            "NULL"
        };

        builder
            .push(
                "parents AS (
                SELECT p.code, p.description, p.category, p.sub_category,
                       0.0 AS rank, ",
            )
            .push(parent_sim)
            .push(
                " AS sim, 1 AS synthetic
                FROM icd_codes p
                WHERE p.code IN (
                    SELECT m.category FROM matched m
                    WHERE m.category IS NOT NULL
                      AND m.category <> ''
                      AND m.category <> m.code
                )
                AND p.code REGEXP ",
            )
            .push_bind(SearchConfig::TOP_LEVEL_CODE_PATTERN)
            .push("\n)");
    }

    fn order_clause(&self) -> &'static str {
        match self.options.order {
            ResultOrder::RankFirst => "rank DESC, sim DESC, code ASC",
            ResultOrder::GroupedByCode => "code ASC, rank DESC",
        }
    }

    /// Assemble the complete statement.
    pub fn statement(&self) -> StatementBuilder {
        let mut builder = StatementBuilder::default();

        builder.push("WITH ");
        self.push_matched(&mut builder);
        builder.push(",\n");
        self.push_parents(&mut builder);
        builder.push(
            ",
            candidates AS (
                SELECT code, description, category, sub_category, rank, sim, synthetic FROM matched
                UNION ALL
                SELECT code, description, category, sub_category, rank, sim, synthetic FROM parents
            ),
            deduped AS (
                SELECT code, description, category, sub_category, rank, sim,
                       ROW_NUMBER() OVER (
                           PARTITION BY code
                           ORDER BY rank DESC, sim DESC, synthetic ASC
                       ) AS row_num
                FROM candidates
            )
            SELECT code, description, category, sub_category, rank, sim
            FROM deduped
            WHERE row_num = 1
            ORDER BY ",
        );
        builder.push(self.order_clause()).push(" LIMIT ");
        builder.push_bind(self.options.max_results as i64);

        builder
    }

    /// Run the statement and collect every row. Any row error fails the
    /// whole search.
    pub fn execute(&self, conn: &Connection) -> Result<Vec<SearchResult>> {
        if self.matcher == Matcher::Empty {
            return Ok(Vec::new());
        }

        let statement = self.statement();
        let mut stmt = conn.prepare(statement.sql())?;
        let rows = stmt.query_map(statement.params().as_slice(), SearchResult::from_row)?;
        let results = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(results)
    }
}
