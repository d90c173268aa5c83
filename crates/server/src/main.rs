use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use launchpad_core::{
    load_config, validate_config, Collaborators, HttpGateway, TimelineSink, TimelineStore,
    TokenIssuer,
};
use launchpad_server::api::{create_router, WsBroadcaster};
use launchpad_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long shutdown waits for a cancelled run to record its outcome.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting launchpad v{}", VERSION);

    // Determine config path
    let config_path = std::env::var("LAUNCHPAD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!(
        "Chain network: {}, explorer: {}",
        config.chain.network, config.chain.explorer_url
    );
    info!(
        "Gateway: {} (proving: {})",
        config.gateway.url,
        if config.issuance.cloud_proving { "cloud" } else { "local" }
    );

    // Collaborators
    let gateway = HttpGateway::new(&config.gateway).context("Failed to create gateway client")?;
    let collaborators = Collaborators::from_gateway(Arc::new(gateway));

    // Timeline and issuer
    let timeline = Arc::new(TimelineStore::new());
    let issuer = TokenIssuer::new(
        config.issuance.clone(),
        config.chain.clone(),
        config.metadata.clone(),
        collaborators,
        Arc::clone(&timeline) as Arc<dyn TimelineSink>,
    );

    // Live timeline for WebSocket clients
    let ws_broadcaster = WsBroadcaster::default();
    ws_broadcaster.forward_timeline(timeline.subscribe());

    let addr = SocketAddr::new(config.server.host, config.server.port);

    let state = Arc::new(AppState::new(
        config,
        issuer.clone(),
        timeline,
        ws_broadcaster,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if issuer.cancel() {
        info!("Cancelling active issuance run...");
        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        while issuer.is_running() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if issuer.is_running() {
            warn!("Issuance run still active at shutdown");
        } else {
            info!("Issuance run cancelled");
        }
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
