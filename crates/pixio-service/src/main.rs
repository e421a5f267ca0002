//! Pixio Service - HTTP API for the Pixio image tool suite
//!
//! This is the main entry point for the pixio service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pixio_service::{create_router, AppState, ServiceConfig};
use pixio_store::Store;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info,pixio_service=debug,pixio_store=debug";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Pixio Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env()?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        razorpay_configured = %config.razorpay_key_id.is_some(),
        clipdrop_configured = %config.clipdrop_api_key.is_some(),
        mail_relay_configured = %config.mail_api_url.is_some(),
        daily_purchase_limit = ?config.purchase_policy.max_settled_per_day,
        "Service configuration loaded"
    );

    let store = open_store(&config)?;

    // Build app state
    let state = AppState::new(store, config.clone());

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "rocksdb-backend")]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    Ok(Arc::new(pixio_store::RocksStore::open(&config.data_dir)?))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_store(_config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::warn!("Built without RocksDB - using an in-memory store, data is not persisted");
    Ok(Arc::new(pixio_store::MemoryStore::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_targets_service_crate() {
        let target = concat!(env!("CARGO_CRATE_NAME"), "=debug");
        assert!(DEFAULT_LOG_FILTER.split(',').any(|d| d == target));
        assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }
}
