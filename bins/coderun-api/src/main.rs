mod handlers;
mod metrics;
mod routes;

use anyhow::Context;
use coderun_common::{Config, Language};
use coderun_runner::{ExecutionEngine, Executor, ProcessRunner};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::info;

/// Shared state for every handler
pub struct AppState {
    pub executor: Executor<Arc<dyn ExecutionEngine>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: Arc<dyn ExecutionEngine>, config: Config) -> Self {
        Self {
            executor: Executor::new(engine, config),
            start_time: Instant::now(),
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();
    info!("coderun API booting...");

    metrics::init_metrics();
    info!("Metrics registry initialized");

    let config = Config::from_env();
    let languages: Vec<String> = Language::all_variants()
        .iter()
        .map(|l| l.to_string())
        .collect();
    info!(
        temp_root = %config.temp_root.display(),
        max_concurrent = config.max_concurrent,
        default_timeout_ms = config.default_timeout_ms,
        max_timeout_ms = config.max_timeout_ms,
        "Loaded configuration: languages = {:?}",
        languages
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState::new(Arc::new(ProcessRunner::new()), config));
    let app = routes::router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("coderun API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining in-flight requests");
}
