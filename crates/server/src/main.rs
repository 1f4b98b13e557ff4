use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelpipe_core::{
    create_authenticator, load_config, validate_config, Authenticator, CommandTranscriber,
    FfmpegEncoder, IngestCoordinator, MediaEncoder, OrphanSweeper, SqliteVideoCatalog,
    StorageLayout, TrendingScorer, VideoCatalog,
};
use reelpipe_server::api::{create_router, WsBroadcaster};
use reelpipe_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

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

    info!("reelpipe {} starting", VERSION);

    let config_path = std::env::var("REELPIPE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {:?}", config.auth.method);
    info!("Database path: {:?}", config.database.path);
    info!("Storage root: {:?}", config.storage.root);

    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    let storage = StorageLayout::new(&config.storage.root);
    storage
        .ensure()
        .await
        .with_context(|| format!("Failed to prepare storage root {:?}", config.storage.root))?;

    let catalog: Arc<dyn VideoCatalog> = Arc::new(
        SqliteVideoCatalog::new(&config.database.path).context("Failed to open video catalog")?,
    );
    info!("Video catalog initialized");

    let encoder: Arc<dyn MediaEncoder> = Arc::new(FfmpegEncoder::new(config.encoder.clone()));
    match encoder.validate().await {
        Ok(()) => info!("Encoder backend ready: {}", encoder.name()),
        // Keep serving the catalog and existing streams; uploads will fail per job.
        Err(e) => warn!("Encoder backend unavailable: {}", e),
    }

    let ws_broadcaster = WsBroadcaster::default();

    let mut coordinator = IngestCoordinator::new(
        Arc::clone(&encoder),
        Arc::clone(&catalog),
        storage.clone(),
        config.ladder.clone(),
        config.encoder.max_parallel_encodes,
    )
    .with_keep_sources(config.storage.keep_sources)
    .with_observer(ws_broadcaster.observer());

    if config.transcript.enabled {
        info!("Transcripts enabled using {:?}", config.transcript.command);
        coordinator = coordinator.with_transcriber(Arc::new(CommandTranscriber::new(
            config.transcript.clone(),
            Arc::clone(&encoder),
        )));
    }
    let coordinator = Arc::new(coordinator);
    info!(
        tiers = config.ladder.len(),
        max_parallel_encodes = config.encoder.max_parallel_encodes,
        "Ingest coordinator ready"
    );

    // Background maintenance
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut background = Vec::new();

    if config.trending.enabled {
        let scorer = Arc::new(TrendingScorer::new(
            config.trending.clone(),
            Arc::clone(&catalog),
        ));
        background.push(scorer.spawn(shutdown_tx.subscribe()));
    } else {
        info!("Trending scorer disabled in config");
    }

    if config.sweeper.enabled {
        let sweeper = Arc::new(OrphanSweeper::new(
            config.sweeper.clone(),
            storage,
            Arc::clone(&catalog),
            Arc::clone(&coordinator),
        ));
        background.push(sweeper.spawn(shutdown_tx.subscribe()));
    } else {
        info!("Orphan sweeper disabled in config");
    }

    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        catalog,
        coordinator,
        ws_broadcaster,
    ));

    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutting down...");
    let _ = shutdown_tx.send(());
    for handle in background {
        if let Err(e) = handle.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }
    info!("Shutdown complete");

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
