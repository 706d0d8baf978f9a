//! Score post-processing: logits to percentage probabilities and a label

use crate::classifier::Logits;
use emotion_core::{ClassProbabilities, Error, LabelTable, Prediction, Result};

/// Decimal places kept in reported probabilities
pub const PROBABILITY_DECIMALS: i32 = 3;

/// Converts raw logits into a [`Prediction`] against a fixed label table
#[derive(Debug, Clone)]
pub struct ScorePostProcessor {
    labels: LabelTable,
}

impl ScorePostProcessor {
    pub fn new(labels: LabelTable) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Score one logits row.
    ///
    /// The label is the argmax of the raw logits, so rounding of the reported
    /// probabilities never changes it.
    pub fn postprocess(&self, logits: &[f32]) -> Result<Prediction> {
        if logits.is_empty() {
            return Err(Error::EmptyDistribution);
        }

        if logits.len() != self.labels.len() {
            return Err(Error::model_input(format!(
                "got {} logits for {} labels",
                logits.len(),
                self.labels.len()
            )));
        }

        if let Some(bad) = logits.iter().find(|v| !v.is_finite()) {
            return Err(Error::model_input(format!("non-finite logit {}", bad)));
        }

        let index = argmax(logits).ok_or(Error::EmptyDistribution)?;
        let label = self
            .labels
            .get(index)
            .ok_or_else(|| Error::internal(format!("no label for class {}", index)))?;

        Ok(Prediction {
            label,
            probabilities: ClassProbabilities::new(percent_softmax(logits)),
            labels: self.labels.clone(),
        })
    }

    /// Score every row, keeping batch order
    pub fn postprocess_batch(&self, logits: &Logits) -> Result<Vec<Prediction>> {
        logits
            .rows()
            .iter()
            .map(|row| self.postprocess(row))
            .collect()
    }
}

/// Numerically stable softmax scaled to percentages and rounded to
/// [`PROBABILITY_DECIMALS`] places.
pub fn percent_softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits
        .iter()
        .map(|v| f64::from(*v))
        .fold(f64::NEG_INFINITY, f64::max);

    let exps: Vec<f64> = logits.iter().map(|v| (f64::from(*v) - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    let scale = 10f64.powi(PROBABILITY_DECIMALS);

    exps.iter()
        .map(|e| (e / total * 100.0 * scale).round() / scale)
        .collect()
}

/// Index of the largest value; the first one wins ties
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, v) in values.iter().copied().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
