//! Emotion Core
//!
//! Core types and error handling shared across the emotion classification crates.
//!
//! This crate provides:
//! - The closed emotion label set and the ordered label table used to decode logits
//! - Prediction and probability types returned by the inference pipeline
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ClassProbabilities, Emotion, LabelTable, Prediction, RawExample};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ClassProbabilities, Emotion, LabelTable, Prediction};
}
