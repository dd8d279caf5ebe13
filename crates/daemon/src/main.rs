//! Tenantq - Main Entry Point
//! Queue service with the interval resource invoker

mod settings;
mod wiring;

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use settings::ServiceSettings;
use tenantq_core::application::{IntervalInvoker, QueueService, ResourceInvocationEngine};
use tenantq_core::port::id_provider::UuidProvider;
use tenantq_core::port::time_provider::SystemTimeProvider;
use tenantq_core::port::{QueueRepository, TimeProvider};
use tenantq_infra_sqlite::{SqliteQueueLock, SqliteQueueRepository};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format = std::env::var("TENANTQ_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tenantq=info"));

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Tenantq v{} starting...", VERSION);

    // 2. Load configuration
    let settings = ServiceSettings::load()
        .map_err(|e| anyhow::anyhow!("Configuration load failed: {}", e))?;

    info!(
        database_url = %settings.database_url,
        orid_provider = %settings.orid_provider_key,
        poll_interval_ms = settings.poll_interval_ms,
        "Configuration loaded"
    );

    // 3. Setup dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let sqlite_repo = Arc::new(SqliteQueueRepository::new(
        settings.database_url.clone(),
        Arc::new(UuidProvider),
        time_provider.clone(),
    ));
    let queue_repo: Arc<dyn QueueRepository> = sqlite_repo.clone();

    let queue_service = QueueService::new(queue_repo.clone(), settings.orid_provider_key.clone())
        .with_health_check_timeout(settings.health_check_timeout());

    // 4. Startup health check (also opens and migrates storage)
    match queue_service.health_checks().await {
        Ok(report) if report.is_healthy() => info!(
            storage = %report.storage_status,
            queues = %report.queue_status,
            "Health check passed"
        ),
        Ok(report) => warn!(
            storage = %report.storage_status,
            queues = %report.queue_status,
            "Health check degraded"
        ),
        Err(e) => error!(error = ?e, "Health check failed"),
    }

    // 5. Resource invocation engine
    let handlers = wiring::build_handlers(&settings)?;
    let mut engine = ResourceInvocationEngine::new(queue_repo, handlers);

    if settings.queue_lock_enabled {
        let pool = sqlite_repo
            .pool()
            .await
            .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?
            .clone();
        let owner = SqliteQueueLock::host_owner(&wiring::hostname());
        info!(owner = %owner, ttl_secs = settings.queue_lock_ttl_secs, "Queue locking enabled");

        let lock = Arc::new(SqliteQueueLock::new(pool, owner, time_provider));
        engine = engine.with_queue_lock(lock, settings.queue_lock_ttl());
    }

    // 6. Start the interval invoker
    info!("Starting interval invoker...");
    let invoker = IntervalInvoker::new(Arc::new(engine), settings.poll_interval());
    invoker.start();

    info!("System ready. Polling queues...");
    info!("Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown: finish the in-flight pass, then release storage
    invoker.stop_and_wait().await;
    sqlite_repo.close(settings.shutdown_grace()).await;

    info!("Shutdown complete.");

    Ok(())
}
