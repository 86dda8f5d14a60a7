//! HTTP server implementation using Axum.

use crate::handler::{handle_health, handle_search};
use axum::{routing::get, Router};
use icd_search::{CatalogPool, CodeSearch};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers.
pub struct AppState {
    /// Search backend
    pub engine: Arc<dyn CodeSearch>,
    /// Read pool, reported by the health check
    pub pool: Option<CatalogPool>,
}

impl AppState {
    pub fn new(engine: Arc<dyn CodeSearch>) -> Self {
        Self { engine, pool: None }
    }

    pub fn with_pool(mut self, pool: CatalogPool) -> Self {
        self.pool = Some(pool);
        self
    }
}

/// Build the router with CORS and request tracing.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/search", get(handle_search))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Bind and start serving in the background.
///
/// Returns the actual address the server is bound to (useful when port=0) and
/// a handle that completes once `shutdown` resolves and in-flight requests
/// have drained.
pub async fn start_server(
    state: AppState,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<(SocketAddr, JoinHandle<std::io::Result<()>>)> {
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    });

    Ok((actual_addr, handle))
}
