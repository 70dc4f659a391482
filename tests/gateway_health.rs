use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use ollama_cache_gateway::cache::MemoryCache;
use ollama_cache_gateway::handlers::HEALTHY_MESSAGE;
use ollama_cache_gateway::ollama::OllamaClient;
use ollama_cache_gateway::router;
use ollama_cache_gateway::state::AppState;
use serde_json::{Value, json};
use tower::util::ServiceExt;

fn gateway(upstream: &str) -> Router {
    let ollama = OllamaClient::new(reqwest::Client::new(), upstream);
    router(Arc::new(AppState::new("secret", ollama, Arc::new(MemoryCache::new()))))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn health_reports_reachable_ollama_without_api_key() {
    let upstream = MockServer::start();
    let mock = upstream.mock(|when, then| {
        when.method(GET).path("/api/tags");
        then.status(200).json_body(json!({"models": [{"name": "llama3"}]}));
    });

    let (status, body) = get(&gateway(&upstream.base_url()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"message": HEALTHY_MESSAGE}));
    mock.assert();
}

#[tokio::test]
async fn health_maps_upstream_error_status_to_bad_gateway() {
    let upstream = MockServer::start();
    upstream.mock(|when, then| {
        when.method(GET).path("/api/tags");
        then.status(500).body("down");
    });

    let (status, body) = get(&gateway(&upstream.base_url()), "/health").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Failed to reach Ollama server: "));
}

#[tokio::test]
async fn health_reports_unreachable_ollama() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let (status, body) = get(&gateway(&format!("http://{addr}")), "/health").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["detail"].as_str().unwrap().starts_with("Failed to reach Ollama server: "));
}

#[tokio::test]
async fn slow_health_check_times_out_as_bad_gateway() {
    let upstream = MockServer::start();
    upstream.mock(|when, then| {
        when.method(GET).path("/api/tags");
        then.status(200)
            .delay(Duration::from_secs(2))
            .json_body(json!({"models": []}));
    });

    let ollama = OllamaClient::new(reqwest::Client::new(), &upstream.base_url())
        .with_timeouts(Duration::from_millis(200), Duration::from_millis(200));
    let app = router(Arc::new(AppState::new("secret", ollama, Arc::new(MemoryCache::new()))));

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Failed to reach Ollama server: "));
}

#[tokio::test]
async fn metrics_expose_cache_counters() {
    let upstream = MockServer::start();
    upstream.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200).json_body(json!({"id": "x"}));
    });
    let app = gateway(&upstream.base_url());

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .header("x-api-key", "secret")
        .body(Body::from(
            json!({"model": "llama3", "messages": [{"role": "user", "content": "metrics"}]}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("gateway_requests_total"));
    assert!(text.contains("gateway_cache_misses_total"));
    assert!(text.contains("gateway_cache_size"));
}
