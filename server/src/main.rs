mod command;
mod config;
mod devices;
mod http;
mod session;

use clap::Parser;
use command::MethodDispatcher;
use config::HubConfig;
use session::SessionManager;
use std::sync::Arc;
use tokio::net::TcpListener;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = HubConfig::parse();
    let credentials = config::load_credentials(&config.credentials)?;
    info!("Loaded {} access policies", credentials.len());

    let sessions = Arc::new(SessionManager::new());
    let dispatcher = Arc::new(MethodDispatcher::new(sessions.clone()));

    let device_listener = TcpListener::bind(&config.device_listen).await?;
    info!("Device port listening on {}", config.device_listen);
    let device_task = tokio::spawn(devices::serve_devices(
        device_listener,
        sessions.clone(),
        dispatcher.clone(),
    ));

    let app = http::router(http::HttpState {
        sessions,
        dispatcher,
        credentials: Arc::new(credentials),
    });
    let http_listener = TcpListener::bind(&config.http_listen).await?;
    info!("Direct methods on http://{}", config.http_listen);

    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutting down");
        })
        .await?;

    device_task.abort();
    Ok(())
}
