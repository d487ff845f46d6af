use axum::{routing::get, Router};
use collector::config::Config;
use collector::db::{self, PgEntryStore};
use collector::geocode::{GeoLookup, GeocodeResolver};
use collector::ipinfo::IpInfoClient;
use collector::logging::init_logging;
use collector::metrics;
use collector::rest::{self, AppState};
use collector::store::{EntryStore, MemoryEntryStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let log_guard = init_logging(config.log_format);

    info!("Starting device telemetry collector");
    info!("HTTP server: {}", config.http_addr);
    info!("Geolocation API: {}", config.geoip_api_url);
    if config.geoip_token.is_none() {
        warn!("IPINFO_TOKEN is not set, geolocation requests are unauthenticated");
    }
    if config.backfill_on_read {
        info!("Range queries write missing locations back to the store");
    }

    if let Err(e) = metrics::init_metrics() {
        error!("Failed to register metrics: {}", e);
    }

    let store: Arc<dyn EntryStore> = match config.database_url.as_deref() {
        Some(database_url) => {
            info!("Database: {}", database_url.rsplit('@').next().unwrap_or("***"));
            match db::make_pool(database_url, config.db_max_connections).await {
                Ok(pool) => Arc::new(PgEntryStore::new(pool)),
                Err(e) => {
                    error!("Failed to connect to database: {}", e);
                    drop(log_guard);
                    std::process::exit(1);
                }
            }
        }
        None => {
            warn!("DATABASE_URL is not set, entries are kept in memory only");
            Arc::new(MemoryEntryStore::new())
        }
    };

    let lookup: Arc<dyn GeoLookup> = Arc::new(IpInfoClient::new(
        &config.geoip_api_url,
        config.geoip_token.clone(),
    ));
    let resolver = GeocodeResolver::new(Arc::clone(&store), lookup);
    let state = AppState::new(store, resolver, config.backfill_on_read);

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(state));

    let listener = match tokio::net::TcpListener::bind(&config.http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", config.http_addr, e);
            drop(log_guard);
            std::process::exit(1);
        }
    };

    info!("HTTP server listening on {}", config.http_addr);

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!("HTTP server error: {}", e);
    }

    info!("Shutting down");
    // Flushes buffered log lines
    drop(log_guard);
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}

/// Resolves on Ctrl-C locally or SIGTERM from the container runtime.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Caught signal SIGINT"),
        _ = terminate => info!("Caught signal SIGTERM"),
    }
}
