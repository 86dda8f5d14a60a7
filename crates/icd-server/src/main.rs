//! ICD search server - HTTP front end for the code catalog.
//!
//! Serves `GET /api/search` over a read pool on the SQLite catalog.

mod error;
mod handler;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use icd_search::{
    Catalog, EngineOptions, MatchMode, PoolOptions, QueryEngine, ResultOrder, SearchConfig,
    SimilarityMode,
};
use server::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "icd-server")]
#[command(about = "HTTP search service for the ICD code catalog")]
struct Args {
    /// Host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Catalog database file
    #[arg(long, env = "ICD_DB_PATH", default_value = "icd_codes.db")]
    database: PathBuf,

    /// Maximum concurrent catalog connections
    #[arg(long, env = "DB_POOL_SIZE", default_value = "10")]
    pool_size: usize,

    /// Per-search time limit in milliseconds
    #[arg(long, env = "QUERY_TIMEOUT_MS", default_value = "5000")]
    query_timeout_ms: u64,

    /// Query syntax: substring, prefix or websearch
    #[arg(long, env = "MATCH_MODE", default_value = "websearch")]
    match_mode: MatchMode,

    /// Trigram similarity use: off, tiebreak or additive
    #[arg(long, env = "SIMILARITY", default_value = "tiebreak")]
    similarity: SimilarityMode,

    /// Weight of similarity in additive mode
    #[arg(long, env = "SIMILARITY_WEIGHT", default_value_t = SearchConfig::SIMILARITY_WEIGHT)]
    similarity_weight: f64,

    /// Result ordering: rank or code
    #[arg(long, env = "RESULT_ORDER", default_value = "rank")]
    order: ResultOrder,

    /// Result cap per search
    #[arg(long, env = "MAX_RESULTS", default_value_t = SearchConfig::MAX_RESULTS)]
    max_results: usize,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            match_mode: self.match_mode,
            similarity: self.similarity,
            similarity_weight: self.similarity_weight,
            order: self.order,
            max_results: self.max_results,
            query_timeout: Duration::from_millis(self.query_timeout_ms),
            ..EngineOptions::default()
        }
    }

    fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: self.pool_size,
            ..PoolOptions::default()
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining requests");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting ICD search server");

    let options = args.engine_options();
    options.validate().context("Invalid search options")?;

    let catalog = Catalog::open(&args.database, args.pool_options())
        .with_context(|| format!("Failed to open catalog {}", args.database.display()))?;

    let count = catalog.count()?;
    if count == 0 {
        warn!("Catalog {} is empty", args.database.display());
    } else {
        info!("Catalog holds {} codes", count);
    }
    info!(
        "Search mode {}, similarity {}, order {}, cap {}",
        options.match_mode, options.similarity, options.order, options.max_results
    );

    let engine = QueryEngine::new(catalog.pool().clone(), options)?;
    let state = AppState::new(Arc::new(engine)).with_pool(catalog.pool().clone());

    let (addr, server) = server::start_server(state, &args.host, args.port, shutdown_signal()).await?;

    // Read by the integration tests to find the auto-assigned port
    println!("SERVER_PORT={}", addr.port());

    info!("Search server running on {}", addr);

    server.await??;
    catalog.close();
    info!("Server stopped");

    Ok(())
}
