mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harrier_core::{
    load_config, validate_config, ArtifactAssembler, AutomationEngine, CapSolverClient,
    CaptchaSolver, EgressPool, EgressProvider, HostedAssembler, HttpEgressProvider, RemoteEngine,
    RoundScheduler,
};

use api::create_router;
use state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
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

    // Determine config path
    let config_path = std::env::var("HARRIER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Engine URL: {}", config.engine.url);
    info!(
        "Race: {} workers/round, {} rounds, {} concurrent sessions",
        config.race.workers_per_round, config.race.max_rounds, config.race.max_concurrent_sessions
    );

    // Log config hash so deployments are identifiable in the logs
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Config hash: {}", &config_hash[..16]);

    // Create the automation engine client
    let engine: Arc<dyn AutomationEngine> = Arc::new(RemoteEngine::new(config.engine.clone()));
    info!("Automation engine client initialized");

    // Create the CAPTCHA solver if configured
    let captcha: Option<Arc<dyn CaptchaSolver>> = match &config.captcha {
        Some(captcha_config) => {
            if captcha_config.api_key.is_empty() {
                info!("CAPTCHA solver configured without API key, solving disabled");
            } else {
                info!("CAPTCHA solver initialized");
            }
            Some(Arc::new(CapSolverClient::new(captcha_config.clone())))
        }
        None => {
            info!("No CAPTCHA solver configured");
            None
        }
    };

    // Create the artifact assembler if configured
    let assembler: Option<Arc<dyn ArtifactAssembler>> = match &config.artifact {
        Some(artifact_config) => {
            info!("Artifact assembler initialized: {}", artifact_config.upload_url);
            Some(Arc::new(HostedAssembler::new(artifact_config.clone())))
        }
        None => {
            info!("No artifact assembler configured");
            None
        }
    };

    // Create the egress pool (static list + optional provider refresh)
    let provider: Option<Arc<dyn EgressProvider>> = config
        .egress
        .provider
        .as_ref()
        .map(|provider_config| {
            info!("Egress provider initialized: {}", provider_config.url);
            Arc::new(HttpEgressProvider::new(provider_config.clone())) as Arc<dyn EgressProvider>
        });
    let pool = Arc::new(EgressPool::new(&config.egress, provider));
    pool.start().await;
    info!("Egress pool ready ({} descriptors)", pool.len().await);

    // Create the round scheduler
    let scheduler = Arc::new(RoundScheduler::new(
        &config,
        engine,
        captcha,
        assembler,
        Arc::clone(&pool),
    ));

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        scheduler,
        Arc::clone(&pool),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
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
    pool.stop();

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
