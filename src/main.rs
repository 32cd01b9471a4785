use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use room_status_service::{
    config::Config,
    db,
    sensor_cache::SensorCache,
    sensors::SensorService,
    status::RoomStatusManager,
    thingworx::ThingWorxClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env()?;

    // Connect to DB and run migrations
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;
    info!("Database ready");

    // Shared in-memory cache of the latest reading per (room, thing)
    let cache = SensorCache::new(config.cache_ttl());
    let thingworx = ThingWorxClient::new(&config)?;

    // Request-path entry point; the HTTP layer holds a clone of this.
    let status = RoomStatusManager::new(pool.clone(), cache.clone());
    {
        let mut tx = status.begin(None).await?;
        let (names, groups) = tx.all_rooms_info().await?;
        tx.commit().await?;
        info!(rooms = names.len(), buildings = groups.len(), "Room directory loaded");
    }

    // Spawn the refresh loop
    let cancel = CancellationToken::new();
    let refresher = {
        let service = SensorService::new(pool, thingworx, cache, &config);
        tokio::spawn(service.run(cancel.clone()))
    };

    shutdown_signal().await;

    // Let the current cycle finish before exiting
    cancel.cancel();
    refresher.await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
