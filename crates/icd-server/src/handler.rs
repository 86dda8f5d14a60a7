//! HTTP request handlers.

use crate::error::ApiError;
use crate::server::AppState;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use icd_search::{SearchConfig, SearchResult};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Health check endpoint.
pub async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "pool": state.pool.as_ref().map(|pool| pool.status()),
    }))
}

/// `GET /api/search?query=<text>`.
///
/// Only the first `query` parameter is used.
pub async fn handle_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<SearchResult>>, ApiError> {
    let text = params
        .iter()
        .find(|(key, _)| key == "query")
        .map(|(_, value)| value.trim())
        .unwrap_or_default();

    if text.chars().count() < SearchConfig::MIN_QUERY_CHARS {
        debug!("Rejected short query {:?}", text);
        return Err(ApiError::QueryTooShort);
    }

    let results = state.engine.search(text).await?;
    Ok(Json(results))
}

#[cfg(test)]
mod tests {
    use crate::server::{build_router, AppState};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use icd_search::{CatalogError, CodeSearch, SearchResult};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    enum Outcome {
        Results(Vec<SearchResult>),
        Fail,
    }

    struct MockSearch {
        outcome: Outcome,
        calls: AtomicUsize,
        last_text: Mutex<Option<String>>,
    }

    impl MockSearch {
        fn new(outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
                last_text: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CodeSearch for MockSearch {
        async fn search(&self, text: &str) -> icd_search::Result<Vec<SearchResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_text.lock().unwrap() = Some(text.to_string());
            match &self.outcome {
                Outcome::Results(results) => Ok(results.clone()),
                Outcome::Fail => Err(CatalogError::database("no such table: icd_search")),
            }
        }
    }

    fn sample_results() -> Vec<SearchResult> {
        vec![
            SearchResult {
                formatted_code: "A10.0".to_string(),
                code: "A100".to_string(),
                description: "Sample child".to_string(),
                category: Some("A10".to_string()),
                sub_category: None,
                rank: 0.61,
                sim: Some(0.4),
            },
            SearchResult {
                formatted_code: "A10".to_string(),
                code: "A10".to_string(),
                description: "Parent category".to_string(),
                category: None,
                sub_category: None,
                rank: 0.0,
                sim: Some(0.0),
            },
        ]
    }

    async fn get(mock: Arc<MockSearch>, uri: &str) -> (StatusCode, Value) {
        let state = AppState::new(mock);
        let response = build_router(Arc::new(state))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_short_queries_rejected() {
        let mock = MockSearch::new(Outcome::Results(sample_results()));

        for uri in [
            "/api/search?query=ab",
            "/api/search?query=",
            "/api/search?query=%20%20%20%20",
            "/api/search?query=%20ab%20",
            "/api/search",
            "/api/search?q=sample",
            "/api/search?query=ab&query=sample",
        ] {
            let (status, body) = get(Arc::clone(&mock), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(
                body,
                serde_json::json!({"error": "Query must be at least 3 characters long"})
            );
        }

        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_query_length_counts_characters() {
        let mock = MockSearch::new(Outcome::Results(Vec::new()));

        // Two characters, four bytes
        let (status, _) = get(Arc::clone(&mock), "/api/search?query=%C3%A9%C3%A9").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get(Arc::clone(&mock), "/api/search?query=%C3%A9%C3%A9e").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_search_returns_results() {
        let mock = MockSearch::new(Outcome::Results(sample_results()));

        let (status, body) = get(Arc::clone(&mock), "/api/search?query=%20sample%20").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mock.last_text.lock().unwrap().as_deref(), Some("sample"));

        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["formattedCode"], "A10.0");
        assert_eq!(rows[0]["subCategory"], Value::Null);
        assert_eq!(rows[1]["code"], "A10");
        assert_eq!(rows[1]["rank"], 0.0);
    }

    #[tokio::test]
    async fn test_engine_failure_hides_cause() {
        let mock = MockSearch::new(Outcome::Fail);

        let (status, body) = get(Arc::clone(&mock), "/api/search?query=sample").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            serde_json::json!({"error": "An error occurred while searching"})
        );
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_health() {
        let mock = MockSearch::new(Outcome::Results(Vec::new()));
        let (status, body) = get(mock, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let mock = MockSearch::new(Outcome::Results(Vec::new()));
        let response = build_router(Arc::new(AppState::new(mock)))
            .oneshot(
                Request::builder()
                    .uri("/api/search?query=sample")
                    .header("origin", "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}
