use std::future::IntoFuture;
use std::time::Duration;

use anyhow::Result;
use propuesta_core::config::{AppConfig, LoadOptions};
use propuesta_server::bootstrap::bootstrap_with_config;
use propuesta_server::telemetry::init_logging;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging depends on the loaded config, so load it first.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "propuesta-server listening"
    );

    let server = axum::serve(listener, app.router()).with_graceful_shutdown(shutdown_signal()).into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        _ = drain_deadline(grace) => {
            warn!(
                event_name = "system.server.drain_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "in-flight requests did not finish before the shutdown deadline"
            );
        }
    }

    info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "propuesta-server stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for ctrl-c, shutting down");
    }
    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "shutdown signal received, draining requests"
    );
}

/// Resolves `grace` after the shutdown signal, bounding the drain.
async fn drain_deadline(grace: Duration) {
    let _ = tokio::signal::ctrl_c().await;
    tokio::time::sleep(grace).await;
}
