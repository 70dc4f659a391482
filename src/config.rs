use axum::http::{HeaderName, HeaderValue, Method, header};
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use std::path::PathBuf;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid CORS origin {origin:?}: {reason}")]
    InvalidOrigin { origin: String, reason: String },
}

// CLI argument structure, every option can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "ollama-cache-gateway")]
#[command(about = "Authenticating, caching proxy for a local Ollama server")]
pub struct Args {
    // Interface to bind
    #[arg(long, env = "GATEWAY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    // Ollama server url, scheme optional
    #[arg(short, long, env = "OLLAMA_URL", default_value = "http://localhost:11434")]
    pub ollama_url: String,

    // Directory holding cached responses
    #[arg(short, long, env = "CACHE_DIR", default_value = ".llm_cache")]
    pub cache_dir: PathBuf,

    // Keep responses in memory only, nothing is written to cache_dir
    #[arg(long)]
    pub memory_cache: bool,

    // Secret expected in the x-api-key header, must not be empty
    #[arg(long, env = "API_KEY", hide_env_values = true, value_parser = NonEmptyStringValueParser::new())]
    pub api_key: String,

    // Comma-separated allowed origins, "*" allows any
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "*")]
    pub allowed_origins: String,

    // Health check timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub health_timeout: u64,

    // Chat completion timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub request_timeout: u64,
}

impl Args {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn cors_layer(&self) -> Result<CorsLayer, ConfigError> {
        build_cors_layer(&self.allowed_origins)
    }
}

/// `None` means any origin.
pub fn parse_origins(raw: &str) -> Result<Option<Vec<HeaderValue>>, ConfigError> {
    let origins: Vec<&str> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if origins.is_empty() || origins.contains(&"*") {
        return Ok(None);
    }

    origins
        .into_iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|e| ConfigError::InvalidOrigin {
                origin: origin.to_string(),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

// Wildcard origins cannot be combined with credentials, so credentials are
// only allowed for an explicit origin list.
pub fn build_cors_layer(raw: &str) -> Result<CorsLayer, ConfigError> {
    let layer = match parse_origins(raw)? {
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        Some(origins) => CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                HeaderName::from_static("x-api-key"),
            ]),
    };
    Ok(layer)
}
