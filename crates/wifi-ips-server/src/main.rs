//! `wifi-ips-server` binary: REST estimation service.
//!
//! Loads the position and floor artifact sets, then serves:
//!
//! ```text
//! POST /estimator/estimate-position
//! GET  /users/user-positions
//! GET  /users/clear-user-positions   (also POST)
//! GET  /datetime/current-date
//! GET  /  and  /health
//! ```
//!
//! Exits with status 1 before binding if either model cannot be loaded.
//!
//! Usage:
//!   cargo run -p wifi-ips-server -- --config server.json --models-dir models

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::HeaderValue;
use clap::Parser;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use wifi_ips_core::MemoryEstimateStore;
use wifi_ips_server::{create_router, AppState, PositionEstimator, ServerConfig};

#[derive(Parser, Debug)]
#[command(
    name = "wifi-ips-server",
    version,
    about = "WiFi fingerprint positioning: estimation service"
)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long)]
    host: Option<String>,

    /// HTTP port
    #[arg(long)]
    port: Option<u16>,

    /// Directory holding the model artifacts
    #[arg(long, value_name = "DIR")]
    models_dir: Option<PathBuf>,
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Ignoring CORS origin {o:?}: {e}");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match args.config.as_deref() {
        Some(path) => match ServerConfig::from_json(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("Failed to load configuration: {e}");
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = args.models_dir {
        config.models_dir = dir;
    }
    let addr = match config.validate().and_then(|()| config.bind_addr()) {
        Ok(addr) => addr,
        Err(e) => {
            error!("Configuration validation failed: {e}");
            std::process::exit(1);
        }
    };

    let loaded =
        PositionEstimator::load(&config.models_dir, &config.position_prefix, &config.floor_prefix);
    let estimator = match loaded {
        Ok(est) => est,
        Err(e) => {
            error!("Model unavailable: {e}");
            std::process::exit(1);
        }
    };
    info!("Position model: {:?}", estimator.position_summary());
    info!("Floor model: {:?}", estimator.floor_summary());

    let state = AppState::new(&config, estimator, Arc::new(MemoryEstimateStore::new()));
    state.warm_tracker();

    let app = create_router(state)
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    info!("WiFi IPS server v{} listening on {addr}", wifi_ips_server::VERSION);

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install CTRL+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    });

    if let Err(e) = server.await {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}
