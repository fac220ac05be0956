use grant_server::cache;
use grant_server::cleanup::CleanupCoordinator;
use grant_server::config::Settings;
use grant_server::state::AppState;
use grant_server::store::MemoryDirectory;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use sweeper::{PeriodicTimer, PeriodicTimerOptions};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Load configuration
    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let cache = match cache::create_cache(&settings).await {
        Ok(cache) => cache,
        Err(e) => {
            error!("Failed to initialize cache: {}", e);
            std::process::exit(1);
        }
    };

    let interval = Duration::from_secs(settings.cleanup.interval_secs());
    let state = match AppState::with_existing_cache(
        settings,
        cache,
        Arc::new(MemoryDirectory::new()),
        Default::default(),
        Default::default(),
    ) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            std::process::exit(1);
        }
    };
    if !state.health_check().await {
        warn!("Cache is not healthy, continuing without it");
    }

    let timer = PeriodicTimer::start_with_opt(
        CleanupCoordinator::new(state),
        PeriodicTimerOptions::every(interval),
    );
    info!(
        "Grant server running, cleanup every {:?}, press Ctrl+C to stop",
        interval
    );

    shutdown_signal().await;

    // Dropping the timer stops further cleanup runs
    drop(timer);
    info!("Grant server shutdown complete");
}

// Simple signal handler that works on all platforms
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
