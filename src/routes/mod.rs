//! API Routes
//!
//! - `/api/health` - Health check
//! - `/api/sessions` - Session lifecycle, selection and navigation
//! - `/api/sessions/{id}/datasets` - Upload batches and registry listing
//! - `/api/sessions/{id}/query` - Questions to the query agent
//! - `/api/sessions/{id}/visualization`, `/geo` - Sub-view data

pub mod chat;
pub mod datasets;
pub mod health;
pub mod sessions;
pub mod views;

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agents::AgentFactory;
use crate::models::AppState;
use crate::session::View;
use crate::types::{AppError, AppResult};

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .merge(health::router(state.clone()))
        .merge(sessions::router(state.clone()))
        .merge(datasets::router(state.clone()))
        .merge(chat::router(state.clone()))
        .merge(views::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| o.parse::<HeaderValue>().ok())
        .collect();
    layer.allow_origin(origins)
}

/// The agent factory, or `MissingCredential` when the server started without
/// an API key.
pub(crate) fn agent_factory(state: &AppState) -> AppResult<Arc<AgentFactory>> {
    state
        .agent_factory
        .clone()
        .ok_or_else(|| AppError::MissingCredential(state.config.llm.provider.to_string()))
}

/// Sub-view endpoints only answer while the session shows that view.
pub(crate) fn require_view(current: View, expected: View) -> AppResult<()> {
    if current == expected {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            from: current.to_string(),
            to: expected.to_string(),
        })
    }
}
