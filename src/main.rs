use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use heaterbuddy_service::{
    api::{self, auth::ApiAuth, AppState},
    config::{Config, TransportKind},
    db,
    device::{DeviceTransport, NetworkTransport, SerialTransport},
    heater::HeaterService,
    store::HeaterStateStore,
    sync::SyncService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent — env vars may be set externally)
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env()?;

    // Connect to DB and run migrations
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database ready");

    // Physical link to the heater
    let transport: Arc<dyn DeviceTransport> = match config.transport {
        TransportKind::Serial => Arc::new(SerialTransport::open(
            &config.serial_port,
            config.serial_baud,
        )?),
        TransportKind::Network => {
            let base_url = config
                .device_base_url
                .as_deref()
                .context("DEVICE_BASE_URL is required when DEVICE_TRANSPORT=network")?;
            Arc::new(NetworkTransport::new(
                base_url,
                Duration::from_secs(config.device_timeout_secs),
            )?)
        }
    };

    let store = HeaterStateStore::new(pool);
    let service = HeaterService::new(store, transport.clone());

    // Spawn the device sync loop — one per process
    {
        let sync = SyncService::new(
            service.clone(),
            transport,
            Duration::from_millis(config.poll_interval_ms),
        );
        tokio::spawn(sync.run());
    }

    let state = AppState {
        service,
        auth: ApiAuth::new(&config.api_token),
    };

    // Start HTTP server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

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
