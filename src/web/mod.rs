mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::config::Config;
use crate::fetch::{FetchOrchestrator, NetworkFamily, YtDlpEngine};
use handlers::ProgressSnapshot;

pub struct AppState {
    orchestrator: FetchOrchestrator,
    preferred_family: NetworkFamily,
    /// One fetch in flight at a time; a second request is turned away.
    fetch_guard: Mutex<()>,
    progress_tx: watch::Sender<ProgressSnapshot>,
    progress_rx: watch::Receiver<ProgressSnapshot>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/fetch", post(handlers::fetch))
        .route("/api/progress", get(handlers::progress))
        .with_state(state)
}

pub async fn serve(config: Config) -> Result<()> {
    let engine = YtDlpEngine::new(&config.engine_binary);
    if !engine.test_availability().await {
        warn!(
            "{} is not available; fetches will fail until it is installed",
            config.engine_binary
        );
    }

    let orchestrator = FetchOrchestrator::new(Box::new(engine), config.engine.clone());
    let (progress_tx, progress_rx) = watch::channel(ProgressSnapshot::idle());
    let state = Arc::new(AppState {
        orchestrator,
        preferred_family: config.preferred_family,
        fetch_guard: Mutex::new(()),
        progress_tx,
        progress_rx,
    });

    let app = router(state);
    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Listening on http://{}", config.bind);

    axum::serve(listener, app).await.context("Server terminated")?;
    Ok(())
}
