//! reqmetrics server
//!
//! - Demo endpoints `/hello`, `/world` behind qps/latency/errcode middleware
//! - `/metrics` pull endpoint, `/healthz`
//! - Background push to a Pushgateway, flushed once more on shutdown

use tracing_subscriber::{fmt, EnvFilter};

use reqmetrics_core::error::{MetricsError, Result};
use reqmetrics_server::{app_state, config, router};

const CONFIG_ENV: &str = "REQMETRICS_CONFIG";
const DEFAULT_CONFIG: &str = "reqmetrics.yaml";

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(kind = e.kind().as_str(), error = %e, "reqmetrics-server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());

    let cfg = config::load_from_file(&path)?;
    let listen = cfg.server.listen_addr()?;

    let state = app_state::AppState::new(cfg)?;
    let reporter = state.reporter()?.map(|r| r.spawn());
    let app = router::build_router(state);

    tracing::info!(
        %listen,
        config = %path,
        push = reporter.is_some(),
        "reqmetrics-server starting"
    );
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| MetricsError::Internal(format!("bind {listen} failed: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| MetricsError::Internal(format!("server failed: {e}")))?;

    if let Some(reporter) = reporter {
        reporter.shutdown().await?;
    }

    tracing::info!("reqmetrics-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl_c listener failed, shutting down");
    }
}
