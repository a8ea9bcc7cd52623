//! Catalog API server entry point

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_api::config::Config;
use catalog_api::db::Database;
use catalog_api::services::{EventBus, TokenService, TransportServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting Catalog API");

    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        database_url = %config.database_url,
        subscription_buffer = config.subscription_buffer,
        "Configuration loaded"
    );

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;
    tracing::info!("Database migrations applied");

    let bus = EventBus::new(config.subscription_buffer);
    let tokens = Arc::new(TokenService::new(
        &config.jwt_secret,
        config.token_lifetime_secs,
    ));

    let server = TransportServer::new(db.clone(), bus, tokens);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    server.start(addr).await?;
    tracing::info!("GraphQL playground: http://localhost:{}/", config.port);

    shutdown_signal().await;

    server.shutdown().await?;
    db.close().await;
    tracing::info!("Catalog API stopped");

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
