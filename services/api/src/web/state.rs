//! services/api/src/web/state.rs
//!
//! Defines the application's shared state. There is no per-user state on the
//! server: the current draft travels with each request.

use crate::config::Config;
use feedback_core::FeedbackFlow;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub flow: FeedbackFlow,
}
