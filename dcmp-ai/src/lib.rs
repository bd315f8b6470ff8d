//! dcmp-ai library interface
//!
//! Exposes the generation pipeline and the HTTP command surface for the
//! binary and for integration testing.

pub mod api;
pub mod client;
pub mod composer;
pub mod error;
pub mod extract;
pub mod preview;
pub mod prompt;
pub mod revision;
pub mod validate;

pub use crate::composer::{Composer, ComposerSettings};
pub use crate::error::{ApiError, ApiResult, GenerationError};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Generation pipeline
    pub composer: Arc<Composer>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(composer: Composer) -> Self {
        Self {
            composer: Arc::new(composer),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::command_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
