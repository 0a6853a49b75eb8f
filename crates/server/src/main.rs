mod bootstrap;
mod health;
mod http;
mod shutdown;
mod signing;

use std::time::Duration;

use anyhow::Result;
use permbot_core::config::{AppConfig, LoadOptions, TransportMode};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::bootstrap::Application;
use crate::shutdown::wait_for_shutdown;

fn init_logging(config: &AppConfig) {
    use permbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging reads its level and format from config, so config loads first.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        transport = app.config.server.transport.as_str(),
        "permbot-server started"
    );

    match app.config.server.transport {
        TransportMode::Http => serve_http(&app).await?,
        TransportMode::Socket => run_socket_mode(&app).await?,
    }

    info!(event_name = "system.server.stopped", correlation_id = "shutdown", "permbot-server stopped");
    Ok(())
}

async fn serve_http(app: &Application) -> Result<()> {
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    let routes = http::router(app.http_state()).merge(health::router(app.health_state()));

    info!(
        event_name = "system.http.listening",
        correlation_id = "bootstrap",
        bind_address = %address,
        "slack http endpoints listening"
    );

    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, routes)
            .with_graceful_shutdown(async move {
                let _ = stopped.await;
            })
            .await
    });

    wait_for_shutdown().await;
    let _ = stop.send(());

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined??,
        Err(_) => warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "in-flight requests did not finish before the grace period"
        ),
    }
    Ok(())
}

async fn run_socket_mode(app: &Application) -> Result<()> {
    health::spawn(&app.config.server.bind_address, app.config.server.port, app.health_state())
        .await?;

    let runner = app.socket_runner();
    let mut socket = tokio::spawn(async move { runner.start().await });

    tokio::select! {
        joined = &mut socket => {
            // The runner returns once reconnects are exhausted; keep serving /health.
            if let Err(error) = joined? {
                error!(event_name = "system.socket.error", correlation_id = "socket", error = %error, "socket mode runner failed");
            }
            wait_for_shutdown().await;
        }
        _ = wait_for_shutdown() => {
            socket.abort();
        }
    }
    Ok(())
}
