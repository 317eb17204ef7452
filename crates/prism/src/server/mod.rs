//! HTTP API over the enrichment engine.

mod error;
mod handlers;

pub use error::{ApiError, ApiResult};

use axum::{
    routing::{get, post},
    Router,
};
use prism_core::{Database, Prism};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub prism: Arc<Prism>,
    pub db: Arc<Database>,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/tasks", get(handlers::list_tasks))
        .route("/enrich-item", post(handlers::enrich_item))
        .route("/evaluate", post(handlers::evaluate))
        .route("/feedback", post(handlers::feedback))
        .route("/analytics/scores", get(handlers::scores))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
