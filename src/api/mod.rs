//! HTTP API.
//!
//! Every route is served both at the root and under `/api`.

pub mod analytics;
pub mod error;
pub mod health;

pub use error::ApiError;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};

use crate::analytics::{QueryHistory, QueryOrchestrator};
use crate::config::ServerConfig;
use crate::db::DatabaseClient;
use crate::error::{Result, ServiceError};

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: QueryOrchestrator,
    pub history: Arc<QueryHistory>,
    pub database: Arc<dyn DatabaseClient>,
}

impl AppState {
    pub fn new(
        orchestrator: QueryOrchestrator,
        history: Arc<QueryHistory>,
        database: Arc<dyn DatabaseClient>,
    ) -> Self {
        Self {
            orchestrator,
            history,
            database,
        }
    }
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/", get(health::health_check))
        .route("/analytics/query", post(analytics::execute_query))
        .route("/analytics/history", get(analytics::query_history))
        .route("/analytics/feedback", post(analytics::submit_feedback))
}

/// Creates the API router.
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(health::root))
        .merge(routes())
        .nest("/api", routes())
        .layer(cors_layer(&config.allowed_origins))
        .with_state(state)
}

/// Builds the CORS layer. `"*"` allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Serves the API until Ctrl-C.
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<()> {
    let app = create_router(state, config);
    let address = config.bind_address();

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::config(format!("Cannot bind to {}: {}", address, e)))?;

    info!(address = %address, "Samarth API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServiceError::internal(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}
