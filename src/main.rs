//! Felicity event engine
//!
//! Main application entry point: connects storage, wires the engine and runs
//! the stale-order sweeper until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info};

use felicity::{
    config::Settings,
    database::{create_pool, health_check, run_migrations, DatabaseConfig, DatabaseService},
    services::{Engine, NotificationService, SystemClock},
    utils::logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("failed to load configuration")?;
    settings.validate()?;

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", felicity::info());

    // Initialize database connection
    info!("Connecting to database...");
    let db_pool = create_pool(&DatabaseConfig::from(&settings.database)).await?;
    run_migrations(&db_pool).await?;

    // Initialize services
    let store = Arc::new(DatabaseService::new(db_pool.clone()));
    let notifier = Arc::new(NotificationService::new(settings.notifications.clone())?);
    let engine = Engine::new(store, notifier, Arc::new(SystemClock));

    let mut sweep = tokio::time::interval(Duration::from_secs(settings.scheduler.stale_order_sweep_seconds));
    info!(
        interval_seconds = settings.scheduler.stale_order_sweep_seconds,
        "Engine ready, stale order sweeper running"
    );

    loop {
        tokio::select! {
            _ = sweep.tick() => {
                if let Err(e) = health_check(&db_pool).await {
                    error!(error = %e, "Database health check failed; skipping sweep");
                    continue;
                }
                match engine.orders.sweep_stale_orders().await {
                    Ok(0) => {}
                    Ok(rejected) => info!(rejected = rejected, "Stale order sweep finished"),
                    Err(e) => error!(error = %e, severity = %e.severity(), "Stale order sweep failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    db_pool.close().await;
    info!("Felicity stopped");
    Ok(())
}
