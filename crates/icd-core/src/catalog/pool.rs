//! Bounded pool of read-only catalog connections.
//!
//! A semaphore caps the number of checked-out connections. Each
//! [`PooledConnection`] holds its permit and hands the connection back to the
//! idle list when dropped, or discards it if it was marked broken or the pool
//! has been closed.

use crate::catalog::functions;
use crate::config::PoolConfig;
use crate::error::{CatalogError, Result};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Pool sizing and per-connection settings.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_connections: usize,
    pub busy_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: PoolConfig::MAX_CONNECTIONS,
            busy_timeout: PoolConfig::BUSY_TIMEOUT,
        }
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    pub max_connections: usize,
    pub available: usize,
    pub idle: usize,
    pub closed: bool,
}

struct PoolInner {
    db_path: PathBuf,
    options: PoolOptions,
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
}

/// Shared handle to the connection pool. Cloning is cheap.
#[derive(Clone)]
pub struct CatalogPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for CatalogPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogPool")
            .field("db_path", &self.inner.db_path)
            .field("status", &self.status())
            .finish()
    }
}

impl CatalogPool {
    /// Open a pool over an existing catalog database.
    ///
    /// One connection is opened eagerly so a bad path fails at startup rather
    /// than on the first request.
    pub fn open(db_path: impl Into<PathBuf>, options: PoolOptions) -> Result<Self> {
        if options.max_connections == 0 {
            return Err(CatalogError::Config {
                message: "Pool needs at least one connection".to_string(),
            });
        }

        let db_path = db_path.into();
        let first = open_connection(&db_path, &options)?;

        info!(
            "Opened catalog pool for {} (max {} connections)",
            db_path.display(),
            options.max_connections
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                permits: Arc::new(Semaphore::new(options.max_connections)),
                idle: Mutex::new(vec![first]),
                db_path,
                options,
            }),
        })
    }

    /// Wait for a free slot and check out a connection.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| CatalogError::PoolClosed)?;

        let reused = self
            .inner
            .idle
            .lock()
            .map_err(|_| CatalogError::database("Failed to acquire pool lock"))?
            .pop();

        let conn = match reused {
            Some(conn) => conn,
            None => {
                debug!("Opening new catalog connection");
                open_connection(&self.inner.db_path, &self.inner.options)?
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            broken: false,
            _permit: permit,
        })
    }

    /// Stop handing out connections and drop the idle ones.
    ///
    /// Connections still checked out are discarded when they are dropped.
    pub fn close(&self) {
        self.inner.permits.close();
        if let Ok(mut idle) = self.inner.idle.lock() {
            idle.clear();
        }
        info!("Closed catalog pool");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.permits.is_closed()
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            max_connections: self.inner.options.max_connections,
            available: self.inner.permits.available_permits(),
            idle: self.inner.idle.lock().map(|idle| idle.len()).unwrap_or(0),
            closed: self.is_closed(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.inner.db_path
    }
}

/// A checked-out connection. Returned to the pool on drop.
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
    broken: bool,
    // Released after `Drop::drop` has put the connection back
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Discard this connection instead of returning it to the pool.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection is present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection is present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        if self.broken {
            warn!("Discarding broken catalog connection");
            return;
        }
        if self.pool.permits.is_closed() {
            return;
        }
        if let Ok(mut idle) = self.pool.idle.lock() {
            idle.push(conn);
        }
    }
}

/// Open and configure one read-only search connection.
fn open_connection(db_path: &Path, options: &PoolOptions) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| CatalogError::Database {
        message: format!("Failed to open catalog {}: {}", db_path.display(), e),
        source: Some(e),
    })?;

    conn.busy_timeout(options.busy_timeout)?;
    conn.execute_batch("PRAGMA query_only = ON;")?;
    functions::register(&conn)?;

    Ok(conn)
}
