//! Shopdesk HTTP server
//!
//! Serves the shop editor API against a local mirror of the remote file tree.
//!
//! # Configuration
//!
//! Same sources as the CLI: `~/.config/shopdesk/config.yaml` (or
//! `SHOPDESK_CONFIG`), overridden by environment variables:
//! - `SHOPDESK_PORT`: Port to listen on (default: 3000)
//! - `SHOPDESK_MIRROR_ROOT`: Directory mirroring the remote hosts
//! - `SERVER_<n>_{ID,NAME,HOST,PORT,BASE_PATH}`: Server profiles
//! - `CURRENCY_<n>_{ID,NAME,ECONOMY}`: Currencies
//!
//! # Endpoints
//!
//! All under `/api`; see `shopdesk::server`.

use shopdesk::config::Config;
use shopdesk::server::{router, AppState};
use shopdesk_core::{LocalMirror, ShopStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "shopdesk=info,shopdesk_server=info,shopdesk_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(None)?;

    let mirror_root = config.mirror_root.value.clone();
    std::fs::create_dir_all(&mirror_root)?;

    tracing::info!("Mirror root: {}", mirror_root.display());
    match &config.config_file {
        Some(path) => tracing::info!("Config file: {}", path.display()),
        None => tracing::info!("No config file, using defaults and environment"),
    }
    tracing::info!(
        "Loaded {} server(s), {} currency(ies)",
        config.servers.value.len(),
        config.currencies.value.len()
    );
    if config.servers.value.is_empty() {
        tracing::warn!("No servers configured - every shop request will fail");
    }

    let store = ShopStore::new(
        Arc::new(config.catalog()),
        Arc::new(LocalMirror::new(mirror_root)),
        config.credentials(),
    );
    let app = router(AppState::new(store));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port.value));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
