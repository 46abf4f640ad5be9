use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fujion_server::{build_router, telemetry::Telemetry, Application, Cli, ServerConfig};
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = Telemetry::init()?;

    let cli = Cli::parse();
    let config = ServerConfig::try_from(cli)?;
    info!(
        listen_addr = %config.listen_addr,
        web_root = %config.web_root.display(),
        precompile = config.precompile.len(),
        "starting fujion server"
    );

    let app = Arc::new(Application::new(config.clone())?.with_metrics(telemetry.metrics_handle()));
    app.ready();
    let reaper_handle = app.spawn_page_reaper();

    let router = build_router(Arc::clone(&app));
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context("failed to bind listener")?;
    info!("fujion server listening on {}", config.listen_addr);

    let graceful = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());
    graceful.await.context("server shutdown with error")?;

    info!(
        grace_seconds = config.shutdown_grace.as_secs(),
        "shutdown signal received; sleeping for graceful period"
    );
    reaper_handle.abort();
    app.shutdown();
    tokio::time::sleep(config.shutdown_grace).await;
    info!("graceful shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}
