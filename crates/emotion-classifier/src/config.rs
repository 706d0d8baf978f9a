//! Model configuration

use emotion_core::{Error, LabelTable, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Everything needed to load the classifier and build the inference service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Where the model artifact lives
    #[serde(default)]
    pub source: ModelSource,

    /// Compute device
    #[serde(default)]
    pub device: DeviceSpec,

    /// Class-index to emotion mapping
    #[serde(default)]
    pub labels: LabelTable,

    /// Sequence length cap, boundary markers included
    #[serde(default = "default_max_len")]
    pub max_len: usize,

    /// Longest accepted input, in characters
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Padding id; resolved from the vocabulary when unset
    #[serde(default)]
    pub pad_token_id: Option<u32>,

    /// Expected encoder width, checked against the artifact when set
    #[serde(default)]
    pub hidden_size: Option<usize>,

    /// Run forward passes one at a time
    #[serde(default)]
    pub serialize_inference: bool,
}

fn default_max_len() -> usize {
    100
}

fn default_max_chars() -> usize {
    10_000
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            source: ModelSource::default(),
            device: DeviceSpec::default(),
            labels: LabelTable::default(),
            max_len: default_max_len(),
            max_chars: default_max_chars(),
            pad_token_id: None,
            hidden_size: None,
            serialize_inference: false,
        }
    }
}

impl ModelSpec {
    /// Parse a model spec from a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse model config: {}", e)))
    }

    /// Load a model spec from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!(
                "Failed to read model config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }
}

/// Model artifact location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSource {
    /// Directory on the local filesystem
    Local { path: PathBuf },

    /// Repository on the Hugging Face Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
    },
}

fn default_revision() -> String {
    "main".to_string()
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::Local {
            path: PathBuf::from("models/emotion-bert"),
        }
    }
}

impl ModelSource {
    pub fn huggingface(repo: impl Into<String>) -> Self {
        Self::HuggingFace {
            repo: repo.into(),
            revision: default_revision(),
        }
    }
}

/// Compute device selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda {
        #[serde(default)]
        index: Option<usize>,
    },
    Metal {
        #[serde(default)]
        index: Option<usize>,
    },
}

impl FromStr for DeviceSpec {
    type Err = Error;

    /// Accepts `cpu`, `cuda`, `cuda:N`, `metal`, `metal:N` and `mps`
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        let (kind, index) = match lower.split_once(':') {
            Some((kind, index)) => {
                let index = index
                    .parse::<usize>()
                    .map_err(|_| Error::config(format!("invalid device index in '{}'", s)))?;
                (kind.to_string(), Some(index))
            }
            None => (lower, None),
        };

        match (kind.as_str(), index) {
            ("cpu", None) => Ok(Self::Cpu),
            ("cuda", index) => Ok(Self::Cuda { index }),
            ("metal" | "mps", index) => Ok(Self::Metal { index }),
            _ => Err(Error::config(format!("unknown device '{}'", s))),
        }
    }
}
