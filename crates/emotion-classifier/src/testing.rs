//! Test doubles: a toy WordPiece vocabulary and a keyword-counting encoder.
//!
//! The stub encoder stands in for BERT so the pipeline can be exercised without
//! downloading weights. Its pooled vector for a sentence holds, per emotion, the number
//! of keywords for that emotion among the attended tokens. Paired with an identity head
//! the logits are those counts, so the predicted label is the emotion with the most
//! keywords (FEAR on a tie or when none are present).

use crate::batch::BatchAssembler;
use crate::classifier::{PooledEncoder, SequenceClassifier};
use crate::encoder::{SentenceEncoder, SpecialTokens};
use crate::loader::wordpiece_tokenizer;
use crate::service::InferenceService;
use candle_core::{DType, Device, Tensor};
use candle_nn::Linear;
use emotion_core::{Error, LabelTable, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Toy vocabulary, one token per line; line number is the id
pub const TOY_VOCAB: &[&str] = &[
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", // 0..=3
    "scared", "afraid", // 4, 5: fear
    "furious", "angry", // 6, 7: anger
    "sad", "lonely", // 8, 9: sadness
    "happy", "glad", // 10, 11: joy
    "i", "am", "so", "feel", "very", "today", "and", "the", "it", "was", ".", "!", "##ly",
];

/// Keyword ids per class, in default label-table order
pub const KEYWORDS: [[u32; 2]; 4] = [[4, 5], [6, 7], [8, 9], [10, 11]];

/// Write [`TOY_VOCAB`] to `dir/vocab.txt`
pub fn write_toy_vocab(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("vocab.txt");
    std::fs::write(&path, TOY_VOCAB.join("\n"))?;
    Ok(path)
}

/// Sentence encoder over the toy vocabulary
pub fn toy_encoder(dir: &Path, max_len: usize) -> Result<SentenceEncoder> {
    let vocab = write_toy_vocab(dir)?;
    let tokenizer = wordpiece_tokenizer(&vocab)?;
    let special = SpecialTokens::from_tokenizer(&tokenizer, None)?;
    SentenceEncoder::new(tokenizer, special, max_len, 1_000)
}

/// Pooled encoder that counts emotion keywords among attended tokens
pub struct KeywordEncoder {
    max_positions: usize,
}

impl KeywordEncoder {
    pub fn new(max_positions: usize) -> Self {
        Self { max_positions }
    }
}

impl PooledEncoder for KeywordEncoder {
    fn hidden_size(&self) -> usize {
        KEYWORDS.len()
    }

    fn max_positions(&self) -> usize {
        self.max_positions
    }

    fn forward(
        &self,
        token_ids: &Tensor,
        _segment_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor> {
        let ids = token_ids
            .to_vec2::<u32>()
            .map_err(|e| Error::model_input(format!("token ids: {}", e)))?;
        let mask = attention_mask
            .to_vec2::<u32>()
            .map_err(|e| Error::model_input(format!("attention mask: {}", e)))?;

        let mut pooled = Vec::with_capacity(ids.len() * KEYWORDS.len());
        for (row, row_mask) in ids.iter().zip(&mask) {
            for keywords in &KEYWORDS {
                let hits = row
                    .iter()
                    .zip(row_mask)
                    .filter(|(id, m)| **m == 1 && keywords.contains(*id))
                    .count();
                pooled.push(hits as f32);
            }
        }

        Tensor::from_vec(pooled, (ids.len(), KEYWORDS.len()), token_ids.device())
            .map_err(|e| Error::internal(format!("pooled tensor: {}", e)))
    }

    fn name(&self) -> &str {
        "keyword-stub"
    }
}

/// [`KeywordEncoder`] that sleeps before every forward pass
pub struct SlowEncoder {
    inner: KeywordEncoder,
    delay: Duration,
}

impl SlowEncoder {
    pub fn new(max_positions: usize, delay: Duration) -> Self {
        Self {
            inner: KeywordEncoder::new(max_positions),
            delay,
        }
    }
}

impl PooledEncoder for SlowEncoder {
    fn hidden_size(&self) -> usize {
        self.inner.hidden_size()
    }

    fn max_positions(&self) -> usize {
        self.inner.max_positions()
    }

    fn forward(
        &self,
        token_ids: &Tensor,
        segment_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor> {
        std::thread::sleep(self.delay);
        self.inner.forward(token_ids, segment_ids, attention_mask)
    }

    fn name(&self) -> &str {
        "slow-keyword-stub"
    }
}

/// Square identity projection with zero bias
pub fn identity_head(size: usize) -> Result<Linear> {
    let mut weight = vec![0f32; size * size];
    for i in 0..size {
        weight[i * size + i] = 1.0;
    }

    let weight = Tensor::from_vec(weight, (size, size), &Device::Cpu)
        .map_err(|e| Error::internal(e.to_string()))?;
    let bias =
        Tensor::zeros(size, DType::F32, &Device::Cpu).map_err(|e| Error::internal(e.to_string()))?;

    Ok(Linear::new(weight, Some(bias)))
}

/// Keyword classifier with an identity head over the four emotions
pub fn keyword_classifier(max_positions: usize) -> Result<SequenceClassifier> {
    SequenceClassifier::new(
        Box::new(KeywordEncoder::new(max_positions)),
        identity_head(KEYWORDS.len())?,
        0.1,
    )
}

/// Complete inference service over the toy vocabulary and keyword classifier
pub fn keyword_service(dir: &Path, max_len: usize) -> Result<InferenceService> {
    InferenceService::new(
        toy_encoder(dir, max_len)?,
        BatchAssembler::new(Device::Cpu),
        Arc::new(keyword_classifier(512)?),
        LabelTable::default(),
    )
}

/// Keyword service whose forward passes each take at least `delay`
pub fn slow_service(dir: &Path, max_len: usize, delay: Duration) -> Result<InferenceService> {
    let classifier = SequenceClassifier::new(
        Box::new(SlowEncoder::new(512, delay)),
        identity_head(KEYWORDS.len())?,
        0.1,
    )?;

    InferenceService::new(
        toy_encoder(dir, max_len)?,
        BatchAssembler::new(Device::Cpu),
        Arc::new(classifier),
        LabelTable::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use emotion_core::Emotion;
    use std::time::Instant;

    #[test]
    fn test_slow_service_waits_then_classifies() {
        let dir = tempfile::tempdir().unwrap();
        let service = slow_service(dir.path(), 32, Duration::from_millis(20)).unwrap();

        let start = Instant::now();
        let label = service.predict("so angry").unwrap();

        assert_eq!(label, Emotion::Anger);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
