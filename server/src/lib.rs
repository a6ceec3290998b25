//! HTTP prediction service for the California Housing model.

pub mod api;
pub mod config;
pub mod error;
pub mod handlers;
pub mod schema;
pub mod state;

use std::{future, sync::Arc};

use anyhow::Context;
use log::{info, warn};
use tokio::{net::TcpListener, signal};

pub use api::create_router;
pub use config::ServerConfig;
pub use error::{ApiError, StartupError};
pub use state::AppState;

/// Loads the artifact and serves until Ctrl-C.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::load(&config)?);
    let app = create_router(state);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!("listening at {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl-C, shutting down"),
        Err(e) => {
            warn!("cannot listen for Ctrl-C: {e}");
            future::pending::<()>().await;
        }
    }
}
