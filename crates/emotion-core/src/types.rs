//! Core types for emotion classification

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of emotions the classifier can predict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Emotion {
    Fear,
    Anger,
    Sad,
    Joy,
}

impl Emotion {
    /// Every emotion, in the order the reference model was trained with
    pub const ALL: [Emotion; 4] = [Emotion::Fear, Emotion::Anger, Emotion::Sad, Emotion::Joy];

    /// Upper-case wire name (`FEAR`, `ANGER`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fear => "FEAR",
            Self::Anger => "ANGER",
            Self::Sad => "SAD",
            Self::Joy => "JOY",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::config(format!("unknown emotion label '{}'", s)))
    }
}

/// Ordered table mapping class index to emotion.
///
/// Index `i` names the class scored by logit `i`. The table is never empty and holds
/// each emotion at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Emotion>", into = "Vec<Emotion>")]
pub struct LabelTable {
    labels: Vec<Emotion>,
}

impl LabelTable {
    /// Build a table from labels in class-index order
    pub fn new(labels: Vec<Emotion>) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::EmptyDistribution);
        }

        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(Error::config(format!(
                    "label table lists {} more than once",
                    label
                )));
            }
        }

        Ok(Self { labels })
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label for a class index
    pub fn get(&self, index: usize) -> Option<Emotion> {
        self.labels.get(index).copied()
    }

    /// Class index of a label
    pub fn index_of(&self, emotion: Emotion) -> Option<usize> {
        self.labels.iter().position(|e| *e == emotion)
    }

    /// Labels in class-index order
    pub fn as_slice(&self) -> &[Emotion] {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = Emotion> + '_ {
        self.labels.iter().copied()
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self {
            labels: Emotion::ALL.to_vec(),
        }
    }
}

impl TryFrom<Vec<Emotion>> for LabelTable {
    type Error = Error;

    fn try_from(labels: Vec<Emotion>) -> Result<Self> {
        Self::new(labels)
    }
}

impl From<LabelTable> for Vec<Emotion> {
    fn from(table: LabelTable) -> Self {
        table.labels
    }
}

/// Percentage-scaled class probabilities, rounded to three decimals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassProbabilities(Vec<f64>);

impl ClassProbabilities {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    /// Sum of all entries; 100 up to rounding
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }
}

/// A labeled prediction for one input sentence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted emotion
    pub label: Emotion,

    /// Probability of every class, in label-table order
    pub probabilities: ClassProbabilities,

    /// Table the probabilities are indexed by
    pub labels: LabelTable,
}

impl Prediction {
    /// Probability (percent) of a specific emotion
    pub fn probability(&self, emotion: Emotion) -> Option<f64> {
        self.labels
            .index_of(emotion)
            .and_then(|i| self.probabilities.get(i))
    }

    /// Probability (percent) of the predicted label
    pub fn confidence(&self) -> f64 {
        self.probability(self.label).unwrap_or(0.0)
    }

    /// `(label, probability)` pairs in label-table order
    pub fn scores(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        self.labels
            .iter()
            .zip(self.probabilities.as_slice().iter().copied())
    }
}

/// An input sentence with an optional gold label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExample {
    pub text: String,

    /// Absent at inference time
    #[serde(default)]
    pub label: Option<Emotion>,
}

impl RawExample {
    /// Create an unlabeled example for inference
    pub fn unlabeled(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: None,
        }
    }
}
