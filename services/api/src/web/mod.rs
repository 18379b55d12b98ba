pub mod rest;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use rest::{
    create_draft_handler, create_submission_handler, environment_handler, health_handler,
};
use state::AppState;

/// Builds the API routes over the shared state.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/environment", get(environment_handler))
        .route("/drafts", post(create_draft_handler))
        .route("/submissions", post(create_submission_handler))
        .with_state(app_state)
}
