//! Sequence classifier: pretrained encoder plus a linear classification head

use crate::batch::Batch;
use candle_core::{DType, Tensor};
use candle_nn::{Dropout, Linear, Module, ModuleT};
use emotion_core::{Error, Result};

/// A pretrained transformer encoder that summarizes each sequence into one vector
pub trait PooledEncoder: Send + Sync {
    /// Width of the pooled representation
    fn hidden_size(&self) -> usize;

    /// Longest sequence the position embeddings cover
    fn max_positions(&self) -> usize;

    /// Pool a batch into a `(batch_size, hidden_size)` tensor
    fn forward(
        &self,
        token_ids: &Tensor,
        segment_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor>;

    /// Encoder name for logs
    fn name(&self) -> &str {
        "encoder"
    }
}

/// Unnormalized class scores, one row per batch member in batch order
#[derive(Debug, Clone, PartialEq)]
pub struct Logits {
    rows: Vec<Vec<f32>>,
}

impl Logits {
    pub fn new(rows: Vec<Vec<f32>>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<f32>> {
        self.rows
    }
}

/// Encoder, dropout and linear head.
///
/// Weights are immutable after construction; the classifier is shared across requests
/// behind an `Arc`. Dropout always runs in inference mode, where it is the identity.
pub struct SequenceClassifier {
    encoder: Box<dyn PooledEncoder>,
    dropout: Dropout,
    head: Linear,
    num_classes: usize,
}

impl std::fmt::Debug for SequenceClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceClassifier")
            .field("encoder", &self.encoder.name())
            .field("hidden_size", &self.encoder.hidden_size())
            .field("num_classes", &self.num_classes)
            .finish()
    }
}

impl SequenceClassifier {
    /// Assemble a classifier, checking the head against the encoder.
    pub fn new(encoder: Box<dyn PooledEncoder>, head: Linear, dropout_prob: f32) -> Result<Self> {
        let (num_classes, in_features) = head
            .weight()
            .dims2()
            .map_err(|e| Error::model_input(format!("classification head weight: {}", e)))?;

        if num_classes == 0 {
            return Err(Error::EmptyDistribution);
        }

        if in_features != encoder.hidden_size() {
            return Err(Error::model_input(format!(
                "classification head expects {} features, encoder produces {}",
                in_features,
                encoder.hidden_size()
            )));
        }

        if let Some(bias) = head.bias() {
            let bias_len = bias
                .dims1()
                .map_err(|e| Error::model_input(format!("classification head bias: {}", e)))?;
            if bias_len != num_classes {
                return Err(Error::model_input(format!(
                    "classification head bias has {} entries for {} classes",
                    bias_len, num_classes
                )));
            }
        }

        Ok(Self {
            encoder,
            dropout: Dropout::new(dropout_prob),
            head,
            num_classes,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn hidden_size(&self) -> usize {
        self.encoder.hidden_size()
    }

    pub fn max_positions(&self) -> usize {
        self.encoder.max_positions()
    }

    /// Compute logits for every batch member, in batch order.
    pub fn classify(&self, batch: &Batch) -> Result<Logits> {
        let seq_len = batch.seq_len();
        if seq_len > self.encoder.max_positions() {
            return Err(Error::model_input(format!(
                "sequence length {} exceeds encoder capacity {}",
                seq_len,
                self.encoder.max_positions()
            )));
        }

        let pooled = self
            .encoder
            .forward(&batch.token_ids, &batch.segment_ids, &batch.attention_mask)?;

        let (rows, width) = pooled
            .dims2()
            .map_err(|e| Error::model_input(format!("pooled output: {}", e)))?;

        if rows != batch.len() || width != self.encoder.hidden_size() {
            return Err(Error::model_input(format!(
                "pooled output is {}x{}, expected {}x{}",
                rows,
                width,
                batch.len(),
                self.encoder.hidden_size()
            )));
        }

        let pooled = self
            .dropout
            .forward_t(&pooled, false)
            .map_err(|e| Error::internal(format!("dropout failed: {}", e)))?;

        let logits = self
            .head
            .forward(&pooled)
            .and_then(|t| t.to_dtype(DType::F32))
            .and_then(|t| t.to_vec2::<f32>())
            .map_err(|e| Error::model_input(format!("Classification head failed: {}", e)))?;

        Ok(Logits::new(logits))
    }
}
