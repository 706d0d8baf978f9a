//! Error types for the emotion classification pipeline

/// Result type alias using the pipeline's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for encoding, batching, inference and scoring
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Empty, oversized or otherwise unencodable input text
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Examples with inconsistent shapes reached the batch assembler
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Batch or weight shapes disagree with the loaded classifier
    #[error("model input error: {0}")]
    ModelInput(String),

    /// No classes to normalize over
    #[error("empty distribution: classifier has no output classes")]
    EmptyDistribution,

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Model artifact could not be loaded
    #[error("model load error: {0}")]
    ModelLoad(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Timeout errors
    #[error("operation timed out")]
    Timeout,

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new encoding error
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Create a new shape mismatch error
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Create a new model input error
    pub fn model_input(msg: impl Into<String>) -> Self {
        Self::ModelInput(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new model load error
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error was caused by the caller's input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Encoding(_))
    }

    /// Short stable name used for metric labels and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Encoding(_) => "encoding",
            Self::ShapeMismatch(_) => "shape_mismatch",
            Self::ModelInput(_) => "model_input",
            Self::EmptyDistribution => "empty_distribution",
            Self::Config(_) => "config",
            Self::ModelLoad(_) => "model_load",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Timeout => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}
