//! Authenticating, content-addressed caching proxy in front of a local Ollama server.
//!
//! `POST /v1/chat/completions` requests are keyed by a SHA-256 digest of their
//! canonical `{model, messages}` payload. The first successful answer for a key
//! is stored and replayed for every later identical request.

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hasher;
pub mod metrics;
pub mod models;
pub mod ollama;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{chat_completions_handler, health_handler, metrics_handler};
use crate::state::AppState;

/// Router without CORS, handy for tests and embedding.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/chat/completions", post(chat_completions_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

pub fn app(state: Arc<AppState>, cors: CorsLayer) -> Router {
    router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
