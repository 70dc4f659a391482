use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::ollama::OllamaClient;

// app's shared state, built once at startup and never mutated
pub struct AppState {
    pub api_key: String,
    pub ollama: OllamaClient,
    pub cache: Arc<dyn ResponseCache>,
}

impl AppState {
    pub fn new(api_key: impl Into<String>, ollama: OllamaClient, cache: Arc<dyn ResponseCache>) -> Self {
        Self {
            api_key: api_key.into(),
            ollama,
            cache,
        }
    }
}
