//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use icd_search::{CatalogError, SearchConfig};
use serde_json::json;
use tracing::error;

/// Failures a search request can end in.
#[derive(Debug)]
pub enum ApiError {
    /// Missing query, or shorter than the minimum after trimming.
    QueryTooShort,
    /// The engine failed. The cause is logged and never sent to the client.
    Search(CatalogError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::QueryTooShort => StatusCode::BAD_REQUEST,
            ApiError::Search(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::QueryTooShort => format!(
                "Query must be at least {} characters long",
                SearchConfig::MIN_QUERY_CHARS
            ),
            ApiError::Search(_) => "An error occurred while searching".to_string(),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Search(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Search(cause) = &self {
            error!("Search failed: {}", cause);
        }
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}
