//! Centralized configuration for the ICD search library.
//!
//! Constants for search limits and pool sizing, plus the runtime options that
//! select how the query engine matches, scores and orders results.

use crate::error::{CatalogError, Result};
use std::str::FromStr;
use std::time::Duration;

/// Search limits and ranking defaults.
pub struct SearchConfig;

impl SearchConfig {
    pub const MAX_RESULTS: usize = 500;
    pub const MIN_QUERY_CHARS: usize = 3;
    pub const QUERY_TIMEOUT: Duration = Duration::from_secs(5);
    pub const CODE_WEIGHT: f64 = 2.0;
    pub const DESCRIPTION_WEIGHT: f64 = 1.0;
    pub const SIMILARITY_WEIGHT: f64 = 0.5;

    /// Codes of this shape may be surfaced as synthetic parent rows.
    pub const TOP_LEVEL_CODE_PATTERN: &'static str = "^[A-Za-z][0-9]+$";
    /// Separator inserted into display codes.
    pub const CODE_SEPARATOR: char = '.';
    /// Number of characters before the separator in display codes.
    pub const CODE_STEM_LEN: usize = 3;
}

/// Connection pool defaults.
pub struct PoolConfig;

impl PoolConfig {
    pub const MAX_CONNECTIONS: usize = 10;
    pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);
}

/// How raw query text is matched against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchMode {
    /// Case-insensitive contains match on code or description.
    Substring,
    /// All terms required, last term matched as a prefix.
    Prefix,
    /// Natural-language syntax: phrases, `or`, `-term`.
    #[default]
    WebSearch,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Substring => "substring",
            MatchMode::Prefix => "prefix",
            MatchMode::WebSearch => "websearch",
        }
    }
}

impl FromStr for MatchMode {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "substring" | "contains" => Ok(MatchMode::Substring),
            "prefix" => Ok(MatchMode::Prefix),
            "websearch" | "web" => Ok(MatchMode::WebSearch),
            other => Err(CatalogError::Config {
                message: format!("Unknown match mode: {}", other),
            }),
        }
    }
}

impl std::fmt::Display for MatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How trigram similarity contributes to ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SimilarityMode {
    /// Similarity is not computed.
    Off,
    /// Rank is primary; similarity orders ties.
    #[default]
    Tiebreak,
    /// Weighted similarity is added to rank.
    Additive,
}

impl SimilarityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMode::Off => "off",
            SimilarityMode::Tiebreak => "tiebreak",
            SimilarityMode::Additive => "additive",
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, SimilarityMode::Off)
    }
}

impl FromStr for SimilarityMode {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "off" | "none" => Ok(SimilarityMode::Off),
            "tiebreak" => Ok(SimilarityMode::Tiebreak),
            "additive" => Ok(SimilarityMode::Additive),
            other => Err(CatalogError::Config {
                message: format!("Unknown similarity mode: {}", other),
            }),
        }
    }
}

impl std::fmt::Display for SimilarityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Presentation order of the final result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResultOrder {
    /// Rank descending, then similarity descending, then code ascending.
    #[default]
    RankFirst,
    /// Code ascending, rank descending within a code.
    GroupedByCode,
}

impl ResultOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultOrder::RankFirst => "rank",
            ResultOrder::GroupedByCode => "code",
        }
    }
}

impl FromStr for ResultOrder {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "rank" | "rank-first" => Ok(ResultOrder::RankFirst),
            "code" | "grouped" => Ok(ResultOrder::GroupedByCode),
            other => Err(CatalogError::Config {
                message: format!("Unknown result order: {}", other),
            }),
        }
    }
}

impl std::fmt::Display for ResultOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// bm25 weights for the indexed columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnWeights {
    pub code: f64,
    pub description: f64,
}

impl Default for ColumnWeights {
    fn default() -> Self {
        Self {
            code: SearchConfig::CODE_WEIGHT,
            description: SearchConfig::DESCRIPTION_WEIGHT,
        }
    }
}

/// Runtime options for the query engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub match_mode: MatchMode,
    pub similarity: SimilarityMode,
    pub similarity_weight: f64,
    pub order: ResultOrder,
    pub max_results: usize,
    pub query_timeout: Duration,
    pub column_weights: ColumnWeights,
    /// Match the final bare word as a prefix in web search mode.
    pub prefix_last_term: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            match_mode: MatchMode::default(),
            similarity: SimilarityMode::default(),
            similarity_weight: SearchConfig::SIMILARITY_WEIGHT,
            order: ResultOrder::default(),
            max_results: SearchConfig::MAX_RESULTS,
            query_timeout: SearchConfig::QUERY_TIMEOUT,
            column_weights: ColumnWeights::default(),
            prefix_last_term: true,
        }
    }
}

impl EngineOptions {
    /// Reject option combinations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            return Err(CatalogError::Config {
                message: "max_results must be at least 1".to_string(),
            });
        }
        if self.query_timeout.is_zero() {
            return Err(CatalogError::Config {
                message: "query_timeout must be greater than zero".to_string(),
            });
        }
        if !self.similarity_weight.is_finite() || self.similarity_weight < 0.0 {
            return Err(CatalogError::Config {
                message: format!("Invalid similarity weight: {}", self.similarity_weight),
            });
        }
        let weights = self.column_weights;
        if !(weights.code.is_finite() && weights.description.is_finite())
            || weights.code < 0.0
            || weights.description < 0.0
        {
            return Err(CatalogError::Config {
                message: "Column weights must be finite and non-negative".to_string(),
            });
        }
        Ok(())
    }
}
