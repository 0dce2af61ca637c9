//! HTTP API exposing proxy verification.
//!
//! Provides one endpoint:
//! - `POST /api/check-proxy` - verify a single proxy, see [`request`] for the payload
//!
//! An optional static directory is served for every other path.

mod handlers;
pub mod request;

use crate::proxy::ProxyChecker;
use crate::Config;
use axum::routing::post;
use axum::Router;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use handlers::check_proxy_handler;
pub use request::{parse_check_request, RequestError};

/// Shared state for the API server
#[derive(Clone)]
pub struct AppState {
    pub checker: Arc<ProxyChecker>,
}

impl AppState {
    pub fn new(checker: ProxyChecker) -> Self {
        Self {
            checker: Arc::new(checker),
        }
    }
}

/// Build the API router
pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route("/api/check-proxy", post(check_proxy_handler))
        .with_state(state);

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve the API until the process is stopped
pub async fn serve(config: &Config) -> crate::Result<()> {
    let checker = ProxyChecker::with_config(config.checker.clone())?;
    let app = router(AppState::new(checker), config.static_dir.as_deref());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind server to {}: {}", addr, e))?;

    info!("Starting server on http://{}", listener.local_addr()?);
    if let Some(dir) = &config.static_dir {
        info!("Serving static files from {}", dir.display());
    }

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
