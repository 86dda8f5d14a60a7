//! Search result types.

use super::format::format_code;
use serde::{Deserialize, Serialize};

/// One ranked match, or a synthetic parent row with rank 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub formatted_code: String,
    pub code: String,
    pub description: String,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub rank: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sim: Option<f64>,
}

impl SearchResult {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let code: String = row.get(0)?;
        Ok(Self {
            formatted_code: format_code(&code),
            code,
            description: row.get(1)?,
            category: row.get(2)?,
            sub_category: row.get(3)?,
            rank: row.get(4)?,
            sim: row.get(5)?,
        })
    }
}
