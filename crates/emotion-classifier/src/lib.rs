//! Emotion Classifier
//!
//! Inference pipeline for single-sentence emotion classification.
//!
//! Data flows strictly forward through the pipeline stages:
//! - [`encoder`]: raw text to fixed-length token id arrays with boundary markers
//! - [`batch`]: encoded examples to aligned tensors plus an attention mask
//! - [`classifier`]: pooled transformer representation to per-class logits
//! - [`postprocess`]: logits to percentage probabilities and a label
//! - [`service`]: orchestration of the above for one sentence
//!
//! Model weights are loaded once by [`loader`] and shared read-only afterwards.

pub mod batch;
pub mod bert;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod loader;
pub mod postprocess;
pub mod service;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use batch::{Batch, BatchAssembler};
pub use bert::BertPooledEncoder;
pub use classifier::{Logits, PooledEncoder, SequenceClassifier};
pub use config::{DeviceSpec, ModelSource, ModelSpec};
pub use encoder::{EncodedExample, SentenceEncoder, SpecialTokens, SPECIAL_TOKEN_OVERHEAD};
pub use loader::build_service;
pub use postprocess::ScorePostProcessor;
pub use service::InferenceService;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{PooledEncoder, SequenceClassifier};
    pub use crate::config::ModelSpec;
    pub use crate::service::InferenceService;
    pub use emotion_core::{Emotion, LabelTable, Prediction};
}
