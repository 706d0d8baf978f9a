//! BERT encoder with the standard tanh pooler over the first token

use crate::classifier::PooledEncoder;
use candle_core::{IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use emotion_core::{Error, Result};

/// Checkpoint prefixes tried in order when locating the encoder weights
pub const ENCODER_PREFIXES: [&str; 2] = ["bert", ""];

/// Pretrained BERT backbone producing pooled sentence vectors
pub struct BertPooledEncoder {
    model: BertModel,
    pooler: Linear,
    hidden_size: usize,
    max_positions: usize,
    prefix: String,
}

impl BertPooledEncoder {
    /// Load the backbone and pooler, trying each of [`ENCODER_PREFIXES`].
    pub fn load(vb: &VarBuilder, config: &BertConfig) -> Result<Self> {
        let mut errors = Vec::new();

        for prefix in ENCODER_PREFIXES {
            let vb_prefix = if prefix.is_empty() {
                vb.clone()
            } else {
                vb.pp(prefix)
            };
            let shown = if prefix.is_empty() { "<root>" } else { prefix };

            let loaded = BertModel::load(vb_prefix.clone(), config).and_then(|model| {
                let pooler = candle_nn::linear(
                    config.hidden_size,
                    config.hidden_size,
                    vb_prefix.pp("pooler").pp("dense"),
                )?;
                Ok((model, pooler))
            });

            match loaded {
                Ok((model, pooler)) => {
                    tracing::info!("Loaded BERT encoder and pooler from '{}'", shown);
                    return Ok(Self {
                        model,
                        pooler,
                        hidden_size: config.hidden_size,
                        max_positions: config.max_position_embeddings,
                        prefix: prefix.to_string(),
                    });
                }
                Err(e) => errors.push(format!("{}: {}", shown, e)),
            }
        }

        Err(Error::model_load(format!(
            "Failed to load BERT encoder with tried prefixes [{}]",
            errors.join(" | ")
        )))
    }

    /// Prefix the weights were found under; empty for the checkpoint root
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl PooledEncoder for BertPooledEncoder {
    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn max_positions(&self) -> usize {
        self.max_positions
    }

    fn forward(
        &self,
        token_ids: &Tensor,
        segment_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor> {
        let hidden = self
            .model
            .forward(token_ids, segment_ids, Some(attention_mask))
            .map_err(|e| Error::model_input(format!("BERT forward failed: {}", e)))?;

        // Pool the hidden state of the start marker.
        hidden
            .i((.., 0))
            .and_then(|first| self.pooler.forward(&first))
            .and_then(|pooled| pooled.tanh())
            .map_err(|e| Error::model_input(format!("Pooling failed: {}", e)))
    }

    fn name(&self) -> &str {
        "bert"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    fn tiny_config() -> BertConfig {
        serde_json::from_value(serde_json::json!({
            "vocab_size": 32,
            "hidden_size": 8,
            "num_hidden_layers": 1,
            "num_attention_heads": 2,
            "intermediate_size": 16,
            "hidden_act": "gelu",
            "hidden_dropout_prob": 0.1,
            "max_position_embeddings": 16,
            "type_vocab_size": 2,
            "initializer_range": 0.02,
            "layer_norm_eps": 1e-12,
            "pad_token_id": 0
        }))
        .unwrap()
    }

    #[test]
    fn test_zero_weights_pool_to_zero() {
        let device = Device::Cpu;
        let vb = VarBuilder::zeros(DType::F32, &device);
        let encoder = BertPooledEncoder::load(&vb, &tiny_config()).unwrap();

        assert_eq!(encoder.hidden_size(), 8);
        assert_eq!(encoder.max_positions(), 16);
        assert_eq!(encoder.prefix(), "bert");

        let ids = Tensor::from_vec(vec![2u32, 5, 3, 0, 2, 6, 7, 3], (2, 4), &device).unwrap();
        let segments = Tensor::zeros((2, 4), DType::U32, &device).unwrap();
        let mask = Tensor::from_vec(vec![1u32, 1, 1, 0, 1, 1, 1, 1], (2, 4), &device).unwrap();

        let pooled = encoder.forward(&ids, &segments, &mask).unwrap();

        assert_eq!(pooled.dims(), &[2, 8]);
        let values = pooled.to_vec2::<f32>().unwrap();
        assert!(values.iter().flatten().all(|v| *v == 0.0));
    }
}
