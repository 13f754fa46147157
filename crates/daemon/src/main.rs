//! Batchtx Daemon - Main Entry Point
//!
//! Composition root: builds the one worker pool, the SQLite adapters and the
//! batch save service, then serves them over JSON-RPC until Ctrl+C.

mod config;
mod telemetry;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

// Import workspace crates
use batchtx_api_rpc::{RpcServer, RpcServerConfig};
use batchtx_core::application::{BatchSaveService, WorkerPool};
use batchtx_core::port::id_provider::UuidProvider;
use batchtx_core::port::time_provider::SystemTimeProvider;
use batchtx_infra_sqlite::{create_pool, run_migrations, SqliteUserRepository};
use config::DaemonConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let config = DaemonConfig::from_env()?;

    // 2. Initialize logging
    let _log_guard = telemetry::init_logging(config.log_format)?;
    info!("Batchtx daemon v{} starting...", VERSION);

    // 3. Initialize database
    info!(db_path = %config.db_path, "Initializing database...");
    if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db_pool = create_pool(&config.database_url())
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let user_repo = Arc::new(SqliteUserRepository::new(db_pool.clone(), time_provider));

    let pool_config = config.pool_config();
    let worker_pool = Arc::new(WorkerPool::new(pool_config));
    info!(
        workers = pool_config.workers,
        backlog = pool_config.backlog,
        chunk_size = config.chunk_size,
        clear_before_insert = config.clear_before_insert,
        "Worker pool ready"
    );

    let service = Arc::new(BatchSaveService::new(
        user_repo.clone(),
        worker_pool.clone(),
        Arc::new(UuidProvider),
        config.batch_config(),
    ));

    // 5. Start JSON-RPC server
    let rpc_config = RpcServerConfig {
        port: config.rpc_port,
        ..Default::default()
    };
    let (addr, rpc_handle) = RpcServer::new(rpc_config, service, user_repo)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(%addr, "System ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown: stop taking requests, close admission, drain jobs
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    worker_pool.shutdown();

    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while worker_pool.stats().in_flight > 0 {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    })
    .await;
    if drained.is_err() {
        warn!(
            in_flight = worker_pool.stats().in_flight,
            "Jobs still running at shutdown"
        );
    }

    db_pool.close().await;
    telemetry::shutdown_telemetry();
    info!("Shutdown complete.");

    Ok(())
}
