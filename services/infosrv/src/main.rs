//! Remote Info Service (infosrv)
//!
//! Keeps chat responder rules in sync with remote documents and answers
//! message evaluations over HTTP.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{error, info};

use infosrv::config::InfosrvConfig;
use infosrv::routes::{create_routes, AppState};
use remote_rules::{RemoteInfo, SqliteSourceStore, UrlFetcher};

#[derive(Parser, Debug)]
#[command(author, version, about = "Remote info service", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database path (overrides config)
    #[arg(long, env = "INFOSRV_DB_PATH")]
    db_path: Option<PathBuf>,

    /// API port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// API bind address (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = InfosrvConfig::load(args.config.as_deref())?;
    if let Some(path) = args.db_path {
        config.database.path = path;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(host) = args.host {
        config.api.host = host;
    }
    config.validate()?;

    common::init_with_config(&config.logging)?;
    info!("Starting Remote Info Service");

    // Source declarations
    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
    }
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database.url())
        .await
        .with_context(|| format!("Failed to open {}", config.database.path.display()))?;
    let store = SqliteSourceStore::new(pool);
    store.init_schema().await?;
    info!("Source store ready: {}", config.database.path.display());

    // Rule engine
    let fetcher = UrlFetcher::new(&config.refresh.fetch)?;
    let remote = Arc::new(RemoteInfo::new(
        Arc::new(store),
        Arc::new(fetcher),
        config.refresh.defaults.clone(),
    ));

    let scheduler = Arc::new(remote.scheduler(Duration::from_secs(config.refresh.tick_secs)));
    let scheduler_task = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.start().await })
    };

    // HTTP API
    let app = create_routes(AppState::new(Arc::clone(&remote), Arc::clone(&scheduler)));
    let addr = format!("{}:{}", config.api.host, config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Remote Info Service started on {}", addr);
    info!("API endpoints:");
    info!("  GET /health - Health check");
    info!("  GET/POST/DELETE /api/sources - Source management");
    info!("  POST /api/sources/reload - Out-of-cycle refresh");
    info!("  POST /api/evaluate - Evaluate a message");
    info!("  GET /api/scheduler/status - Scheduler status");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(common::wait_for_shutdown())
        .await
    {
        error!("Server error: {}", e);
    }

    info!("Shutting down");
    scheduler.stop();
    if let Err(e) = scheduler_task.await {
        error!("Scheduler task failed: {}", e);
    }
    let aborted = remote.shutdown();
    if aborted > 0 {
        info!("Aborted {} in-flight refreshes", aborted);
    }

    info!("Remote Info Service stopped");
    Ok(())
}
