//! Shared application state

use crate::config::ServerConfig;
use emotion_classifier::InferenceService;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// State handed to every request handler
#[derive(Clone)]
pub struct AppState {
    /// Loaded model pipeline
    pub service: Arc<InferenceService>,

    /// Loaded configuration
    pub config: Arc<ServerConfig>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(
        service: InferenceService,
        config: ServerConfig,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
            metrics_handle,
        }
    }
}
