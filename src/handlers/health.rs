use axum::{Json, extract::State};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::error::GatewayError;
use crate::state::AppState;

pub const HEALTHY_MESSAGE: &str = "Ollama server is reachable and models are available.";

// health handler, checks Ollama instead of reporting on the gateway itself
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Result<Json<Value>, GatewayError> {
    match state.ollama.check_health().await {
        Ok(()) => Ok(Json(json!({ "message": HEALTHY_MESSAGE }))),
        Err(e) => {
            tracing::error!(error = ?e, ollama = state.ollama.base_url(), "health check failed");
            // Any failure here, even an HTTP status from Ollama, means unreachable
            Err(GatewayError::OllamaUnreachable(e.to_string()))
        }
    }
}
