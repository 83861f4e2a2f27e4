//! MindVideo Proxy Server - Main entry point
//!
//! Loads configuration from the environment, builds the upstream client and
//! serves the OpenAI-compatible API until Ctrl-C.

use anyhow::{Context, Result};
use mindvideo_proxy::{
    api::{build_router, AppState},
    core::{init_metrics, init_tracing, AppConfig},
    services::{task_tracker::TrackerSettings, UpstreamClient, VideoService},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    // Load .env file if present (before reading any environment variables)
    dotenvy::dotenv().ok();

    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
        .unwrap_or(1);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    init_tracing();
    init_metrics();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    tracing::info!(
        credentials = config.upstream.auth_tokens.len(),
        models = config.model_mapping.len(),
        default_model = %config.default_model,
        base_url = %config.upstream.base_url,
        auth_enabled = config.effective_master_key().is_some(),
        "Configuration loaded"
    );
    if !config.upstream.verify_ssl {
        tracing::warn!("Upstream TLS certificate verification is disabled");
    }

    let http_client = create_http_client(&config)?;
    let upstream = UpstreamClient::new(http_client, &config)?;
    let video_service = VideoService::new(
        Arc::new(upstream),
        TrackerSettings::from(&config.polling),
        config.default_model.clone(),
    );

    let host = config.server.host.clone();
    let port = config.server.port;
    let state = Arc::new(AppState::new(config, video_service));
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", host, port))?;
    tracing::info!("Starting MindVideo proxy on {}", addr);
    tracing::info!("OpenAI API: /v1/images/generations, /v1/chat/completions, /v1/models");
    tracing::info!("Task progress: /v1/tasks/{{task_id}}/stream");
    tracing::info!("Swagger UI: /swagger-ui");
    tracing::info!("Metrics endpoint: /metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn create_http_client(config: &AppConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(!config.upstream.verify_ssl)
        .timeout(Duration::from_secs(config.upstream.request_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .context("Failed to build HTTP client")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
