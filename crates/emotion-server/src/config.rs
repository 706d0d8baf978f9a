//! Server configuration

use crate::cli::Cli;
use emotion_classifier::{DeviceSpec, ModelSource, ModelSpec};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request inference deadline in milliseconds; 0 disables it
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Model artifact and inference settings
    #[serde(default)]
    pub model: ModelSpec,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &Cli) -> anyhow::Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        config.apply_overrides(cli)?;
        Ok(config)
    }

    /// Apply command-line overrides on top of file values
    pub fn apply_overrides(&mut self, cli: &Cli) -> anyhow::Result<()> {
        if let Some(dir) = &cli.model_dir {
            self.model.source = ModelSource::Local { path: dir.clone() };
        }

        if let Some(repo) = &cli.hf_repo {
            self.model.source = ModelSource::huggingface(repo.clone());
        }

        if let Some(device) = &cli.device {
            self.model.device = device.parse::<DeviceSpec>()?;
        }

        if let Some(listen) = &cli.listen {
            self.listen = listen.clone();
        }

        if let Some(port) = cli.port {
            self.port = port;
        }

        Ok(())
    }

    /// Inference deadline, if any
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
            model: ModelSpec::default(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}
