//! Query engine: ranked code search with category parent expansion.
//!
//! A search runs as a single statement on a pooled connection inside a
//! blocking task. One deadline covers both waiting for a connection and
//! running the statement. On expiry a still-running statement is
//! interrupted and the caller gets [`CatalogError::Timeout`].

mod format;
mod plan;
mod query;
pub mod similarity;
mod types;

pub use format::{canonical_code_term, format_code, is_top_level_code};
pub use query::{MatchExpression, Term};
pub use types::SearchResult;

use crate::catalog::CatalogPool;
use crate::config::EngineOptions;
use crate::error::{CatalogError, Result};
use async_trait::async_trait;
use plan::SearchPlan;
use rusqlite::InterruptHandle;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

/// Anything that can answer a code search.
#[async_trait]
pub trait CodeSearch: Send + Sync {
    async fn search(&self, text: &str) -> Result<Vec<SearchResult>>;
}

/// Interrupt access to a checked-out connection, valid only until its
/// statement finishes.
///
/// The blocking task calls [`finish`](Self::finish) before the connection
/// goes back to the pool, so a late timeout can never interrupt whatever the
/// next borrower runs.
struct StatementGuard {
    handle: InterruptHandle,
    finished: Mutex<bool>,
}

impl StatementGuard {
    fn new(handle: InterruptHandle) -> Arc<Self> {
        Arc::new(Self {
            handle,
            finished: Mutex::new(false),
        })
    }

    fn finish(&self) {
        let mut finished = self.finished.lock().unwrap_or_else(|e| e.into_inner());
        *finished = true;
    }

    /// Interrupt the statement unless it already finished. Returns whether
    /// an interrupt was sent.
    fn interrupt_if_running(&self) -> bool {
        let finished = self.finished.lock().unwrap_or_else(|e| e.into_inner());
        if *finished {
            return false;
        }
        self.handle.interrupt();
        true
    }
}

/// Search over the catalog's read pool.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    pool: CatalogPool,
    options: Arc<EngineOptions>,
}

impl QueryEngine {
    pub fn new(pool: CatalogPool, options: EngineOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            pool,
            options: Arc::new(options),
        })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn pool(&self) -> &CatalogPool {
        &self.pool
    }

    /// Run one search.
    ///
    /// Results are capped at `max_results` after parents are merged in. Any
    /// store failure fails the whole search; partial results are never
    /// returned.
    pub async fn search(&self, text: &str) -> Result<Vec<SearchResult>> {
        let start = Instant::now();
        let timeout = self.options.query_timeout;
        let deadline = tokio::time::Instant::now() + timeout;
        let plan = SearchPlan::new(text, &self.options);

        let mut conn = tokio::time::timeout_at(deadline, self.pool.acquire())
            .await
            .map_err(|_| {
                warn!("Timed out waiting for a catalog connection");
                CatalogError::Timeout(timeout)
            })??;
        let guard = StatementGuard::new(conn.get_interrupt_handle());
        let running = Arc::clone(&guard);

        let task = tokio::task::spawn_blocking(move || {
            let result = plan.execute(&conn);
            running.finish();
            if let Err(e) = &result {
                if e.is_connection_fault() {
                    conn.mark_broken();
                }
            }
            result
        });

        let results = match tokio::time::timeout_at(deadline, task).await {
            Ok(joined) => joined??,
            Err(_) => {
                if guard.interrupt_if_running() {
                    warn!("Search for {:?} interrupted after {:?}", text, timeout);
                } else {
                    warn!("Search for {:?} finished past its {:?} deadline", text, timeout);
                }
                return Err(CatalogError::Timeout(timeout));
            }
        };

        debug!(
            "Search for {:?} returned {} results in {:.1}ms",
            text,
            results.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(results)
    }
}

#[async_trait]
impl CodeSearch for QueryEngine {
    async fn search(&self, text: &str) -> Result<Vec<SearchResult>> {
        QueryEngine::search(self, text).await
    }
}
