//! worldfleet world manager
//!
//! Keeps the fleet's world sessions in line with the configured worlds and
//! admits players into them. Serves the world listing and join API and runs
//! the reconciliation controller on a timer.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use worldfleet_manager::{
    admission::AdmissionService,
    api,
    config::Config,
    controller::{ControllerWorker, WorldController},
    db,
    desired::{ConfigProvider, MemoryConfigProvider, PgConfigProvider},
    host::{HostClient, HttpHostClient, MockHost},
    models::WorldConfig,
    registry::{MemoryRegistry, PgRegistry, Registry},
    state::AppState,
};

/// Boot time of simulated sessions in dev mode.
const DEV_BOOT_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to WORLDFLEET_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting worldfleet world manager");
    info!(
        listen_addr = %config.listen_addr,
        fleet_alias = %config.controller.fleet_alias,
        dev_mode = config.dev_mode,
        "Configuration loaded"
    );

    let (registry, configs, host): (
        Arc<dyn Registry>,
        Arc<dyn ConfigProvider>,
        Arc<dyn HostClient>,
    ) = if config.dev_mode {
        let worlds = match &config.dev_configs_path {
            Some(path) => load_dev_configs(path)?,
            None => Vec::new(),
        };
        info!(worlds = worlds.len(), "Using in-memory registry and simulated host (dev mode)");
        (
            Arc::new(MemoryRegistry::new()),
            Arc::new(MemoryConfigProvider::new(worlds)),
            Arc::new(MockHost::auto_activating(DEV_BOOT_DELAY)),
        )
    } else {
        let pool = match db::connect(&config.database).await {
            Ok(pool) => pool,
            Err(e) => {
                error!(error = %e, "Failed to open database");
                return Err(e.into());
            }
        };

        let host = HttpHostClient::new(config.host_api_url.clone(), config.host_timeout)?;
        (
            Arc::new(PgRegistry::new(pool.clone())),
            Arc::new(PgConfigProvider::new(pool)),
            Arc::new(host),
        )
    };

    let controller = Arc::new(WorldController::new(
        registry.clone(),
        host.clone(),
        configs,
        config.controller.clone(),
    ));
    let admission = AdmissionService::new(registry.clone(), host);

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start controller worker in background
    let worker = ControllerWorker::new(controller.clone(), config.reconcile_interval);
    let worker_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            worker.run(shutdown_rx).await;
        }
    });

    let state = AppState::new(registry, admission, controller, config.controller.page_size);
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    // Spawn the server with graceful shutdown
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    // Wait for shutdown signal (Ctrl+C)
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    // Signal shutdown to the worker
    let _ = shutdown_tx.send(true);

    // A pass in flight is allowed to finish
    info!("Waiting for controller worker to shut down...");
    if tokio::time::timeout(Duration::from_secs(30), worker_handle)
        .await
        .is_err()
    {
        warn!("Controller worker did not shut down in time");
    }

    info!("World manager shutdown complete");
    Ok(())
}

fn load_dev_configs(path: &Path) -> Result<Vec<WorldConfig>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid world configs in {}", path.display()))
}
