use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use lazy_static::lazy_static;
use prometheus::{Counter, Histogram, register_counter, register_histogram};
use serde_json::value::RawValue;
use std::sync::Arc;
use std::time::Instant;

use crate::error::GatewayError;
use crate::hasher::make_cache_key;
use crate::metrics::record_cache_size;
use crate::models::ChatRequest;
use crate::ollama::DownstreamError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

lazy_static! {
    static ref REQUEST_TOTAL: Counter =
        register_counter!("gateway_requests_total", "Total number of chat completion requests").unwrap();
    static ref CACHE_HITS: Counter =
        register_counter!("gateway_cache_hits_total", "Total cache hits").unwrap();
    static ref CACHE_MISSES: Counter =
        register_counter!("gateway_cache_misses_total", "Total cache misses").unwrap();
    static ref AUTH_FAILURES: Counter =
        register_counter!("gateway_auth_failures_total", "Requests rejected for a bad API key").unwrap();
    static ref DOWNSTREAM_ERRORS: Counter =
        register_counter!("gateway_downstream_errors_total", "Failed calls to the Ollama server").unwrap();
    static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "gateway_request_latency_seconds",
        "Chat completion latency in seconds"
    )
    .unwrap();
}

// Exact byte comparison, a missing header never matches
fn is_authorized(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(API_KEY_HEADER)
        .is_some_and(|value| value.as_bytes() == expected.as_bytes())
}

// The body goes out exactly as Ollama produced it; serializing a RawValue copies its text.
pub async fn chat_completions_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<Box<RawValue>>, GatewayError> {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();

    let result = serve_chat(&state, &headers, payload).await;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    result.map(Json)
}

async fn serve_chat(
    state: &AppState,
    headers: &HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Box<RawValue>, GatewayError> {
    // Credentials first: an unauthenticated caller learns nothing about the body
    if !is_authorized(headers, &state.api_key) {
        AUTH_FAILURES.inc();
        tracing::warn!("rejected chat request with missing or invalid API key");
        return Err(GatewayError::Unauthorized);
    }

    let Json(payload) = payload.map_err(|rejection| GatewayError::InvalidRequest {
        status: rejection.status(),
        message: rejection.body_text(),
    })?;

    let cache_key = make_cache_key(&payload).map_err(|e| {
        tracing::error!(error = ?e, "failed to serialize payload for hashing");
        GatewayError::Internal(format!("cannot derive cache key: {e}"))
    })?;
    tracing::info!(key = %cache_key, model = %payload.model, "request payload hashed");

    match state.cache.get(&cache_key).await {
        Ok(Some(cached)) => {
            CACHE_HITS.inc();
            tracing::info!(key = %cache_key, "serving response from cache");
            return Ok(cached);
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(key = %cache_key, error = ?e, "cache read failed, forwarding instead");
        }
    }
    CACHE_MISSES.inc();

    let response = state
        .ollama
        .chat_completions(&payload)
        .await
        .map_err(|e| {
            DOWNSTREAM_ERRORS.inc();
            match &e {
                DownstreamError::Status { status, body } => {
                    tracing::error!(%status, %body, "Ollama HTTP error");
                }
                _ => tracing::error!(error = ?e, "error contacting Ollama"),
            }
            GatewayError::from(e)
        })?;

    tracing::info!(key = %cache_key, "response received from Ollama, caching it");
    if let Err(e) = state.cache.put(&cache_key, &payload.model, &response).await {
        tracing::warn!(key = %cache_key, error = ?e, "failed to store response in cache");
    }
    record_cache_size(state.cache.as_ref());

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    #[test]
    fn api_key_must_match_exactly() {
        let mut headers = HeaderMap::new();
        assert!(!is_authorized(&headers, "secret"));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("Secret"));
        assert!(!is_authorized(&headers, "secret"));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret "));
        assert!(!is_authorized(&headers, "secret"));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));
        assert!(is_authorized(&headers, "secret"));
    }

    #[test]
    fn header_name_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_bytes(b"X-API-KEY").unwrap(),
            HeaderValue::from_static("secret"),
        );
        assert!(is_authorized(&headers, "secret"));
    }
}
