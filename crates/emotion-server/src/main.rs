//! Emotion Server
//!
//! Classifies the emotion of a single sentence (FEAR, ANGER, SAD, JOY) with a
//! fine-tuned BERT model and serves the result over HTTP.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tracing::{info, warn};

use emotion_server::telemetry::{describe_metrics, init_tracing, shutdown_signal};
use emotion_server::{create_router, AppState, Cli, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    info!("Starting emotion server");

    let config = ServerConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!("Model source: {:?}", config.model.source);
    info!("Device: {:?}", config.model.device);

    let metrics_handle = init_metrics()?;

    // Loading validates the whole pipeline; any failure here is fatal.
    let model_spec = config.model.clone();
    let service =
        tokio::task::spawn_blocking(move || emotion_classifier::build_service(&model_spec))
            .await??;

    let addr: SocketAddr = config.bind_address().parse()?;
    let state = AppState::new(service, config, metrics_handle);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown = async {
        let signal = shutdown_signal().await;
        warn!("Received {}, stopping server...", signal);
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Install the Prometheus recorder and describe the server's metrics
fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    describe_metrics();

    info!("Metrics exporter initialized");
    Ok(handle)
}
