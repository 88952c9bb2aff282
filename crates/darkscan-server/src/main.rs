use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use darkscan_server::{AppState, Config, router};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    tracing::info!("darkscan v{}", env!("CARGO_PKG_VERSION"));

    // Model loading blocks for a while; do it before accepting connections.
    let load_config = config.clone();
    let state = tokio::task::spawn_blocking(move || AppState::from_config(&load_config))
        .await
        .context("model loader panicked")??;
    tracing::info!(
        labels = state.classifier.labels().len(),
        label_set = %state.classifier.labels().version(),
        "classifier ready"
    );

    let app = router(Arc::new(state));

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
