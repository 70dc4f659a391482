use anyhow::Context;
use clap::Parser; // for cli
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ollama_cache_gateway::{
    app,
    cache::{DiskCache, MemoryCache, ResponseCache},
    config::Args,
    metrics::record_cache_size,
    ollama::OllamaClient,
    state::AppState,
};

// this is main async function with tokio
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ollama_cache_gateway=info,tower_http=info")),
        )
        .init();

    // parse cli arguments
    let args = Args::parse();

    let cache: Arc<dyn ResponseCache> = if args.memory_cache {
        tracing::info!("Cache: in-memory, entries are lost on restart");
        Arc::new(MemoryCache::new())
    } else {
        let disk = DiskCache::open(&args.cache_dir)
            .await
            .with_context(|| format!("opening cache directory {}", args.cache_dir.display()))?;
        tracing::info!(dir = %disk.dir().display(), entries = disk.len(), "Cache: on disk");
        Arc::new(disk)
    };
    record_cache_size(cache.as_ref());

    let ollama = OllamaClient::new(reqwest::Client::new(), &args.ollama_url)
        .with_timeouts(args.health_timeout(), args.request_timeout());
    let cors = args.cors_layer().context("building CORS policy")?;

    match ollama.check_health().await {
        Ok(()) => tracing::info!(ollama = ollama.base_url(), "Ollama is reachable"),
        Err(e) => tracing::warn!(ollama = ollama.base_url(), error = %e, "Ollama is not reachable yet"),
    }

    // creating shared state
    let state = Arc::new(AppState::new(args.api_key.clone(), ollama.clone(), cache));
    let router = app(state, cors);

    let addr = args.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!("Gateway running on http://{}", addr);
    tracing::info!("Forwarding to Ollama at {}", ollama.base_url());
    tracing::info!("Allowed origins: {}", args.allowed_origins);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}
