//! Codecenter - Claude Code usage dashboard backend

mod commands;
pub mod usage;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use log::info;
use tower_http::cors::{Any, CorsLayer};

use commands::{
    get_overrides, get_project_stats, get_stats, health_check, refresh_stats, remove_override,
    set_override,
};
use usage::{SessionStore, StorePaths};

/// Default API port
pub const DEFAULT_PORT: u16 = 3737;

/// Application state shared by every request
pub struct AppState {
    pub store: SessionStore,
}

impl AppState {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }
}

/// Port from `CODECENTER_PORT`, falling back to [`DEFAULT_PORT`]
pub fn server_port() -> u16 {
    std::env::var("CODECENTER_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// API routes over the shared session store
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/stats", get(get_stats))
        .route("/api/stats/refresh", post(refresh_stats))
        .route(
            "/api/stats/overrides",
            get(get_overrides).post(set_override).delete(remove_override),
        )
        .route("/api/stats/:project", get(get_project_stats))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on localhost until Ctrl-C
pub async fn run(port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = Arc::new(AppState::new(SessionStore::new(StorePaths::from_env(None))));
    info!(
        "Reading sessions from {}",
        state.store.paths().projects_dir.display()
    );

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving usage API on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
