//! Batch assembly: encoded examples to aligned model input tensors

use crate::encoder::EncodedExample;
use candle_core::{Device, Tensor};
use emotion_core::{Error, Result};

/// Encoded examples stacked into `(batch_size, seq_len)` tensors.
///
/// Row `i` of every tensor belongs to the `i`-th example passed to
/// [`BatchAssembler::assemble`].
#[derive(Debug, Clone)]
pub struct Batch {
    /// Token ids, `u32`, shape `(batch_size, seq_len)`
    pub token_ids: Tensor,

    /// Segment ids, `u32`, shape `(batch_size, seq_len)`
    pub segment_ids: Tensor,

    /// 1 for attendable positions, 0 for padding; `u32`, shape `(batch_size, seq_len)`
    pub attention_mask: Tensor,

    /// Real token count per row
    pub valid_lengths: Vec<usize>,

    /// Sequence length cap shared by all rows
    pub max_len: usize,
}

impl Batch {
    /// Number of examples
    pub fn len(&self) -> usize {
        self.valid_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valid_lengths.is_empty()
    }

    /// Width of the id tensors
    pub fn seq_len(&self) -> usize {
        self.token_ids.dims().get(1).copied().unwrap_or(0)
    }
}

/// Packages encoded examples into a [`Batch`] on a fixed device
#[derive(Debug, Clone)]
pub struct BatchAssembler {
    device: Device,
}

impl BatchAssembler {
    pub fn new(device: Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Stack examples in order.
    ///
    /// All examples must share `max_len` and sequence length, and each must be
    /// internally consistent; anything else is a [`Error::ShapeMismatch`].
    pub fn assemble(&self, examples: &[EncodedExample]) -> Result<Batch> {
        let first = examples
            .first()
            .ok_or_else(|| Error::shape_mismatch("cannot assemble an empty batch"))?;

        let max_len = first.max_len;
        let seq_len = first.seq_len();

        for (i, example) in examples.iter().enumerate() {
            if example.max_len != max_len {
                return Err(Error::shape_mismatch(format!(
                    "example {} has max_len {}, expected {}",
                    i, example.max_len, max_len
                )));
            }
            if example.seq_len() != seq_len {
                return Err(Error::shape_mismatch(format!(
                    "example {} has {} token ids, expected {}",
                    i,
                    example.seq_len(),
                    seq_len
                )));
            }
            if example.segment_ids.len() != seq_len {
                return Err(Error::shape_mismatch(format!(
                    "example {} has {} segment ids for {} token ids",
                    i,
                    example.segment_ids.len(),
                    seq_len
                )));
            }
            if example.valid_length == 0 || example.valid_length > seq_len {
                return Err(Error::shape_mismatch(format!(
                    "example {} has valid_length {} outside 1..={}",
                    i, example.valid_length, seq_len
                )));
            }
        }

        let rows = examples.len();
        let mut token_ids = Vec::with_capacity(rows * seq_len);
        let mut segment_ids = Vec::with_capacity(rows * seq_len);
        for example in examples {
            token_ids.extend_from_slice(&example.token_ids);
            segment_ids.extend_from_slice(&example.segment_ids);
        }

        let valid_lengths: Vec<usize> = examples.iter().map(|e| e.valid_length).collect();
        let attention_mask = attention_mask(&valid_lengths, seq_len);

        let to_tensor = |data: Vec<u32>, what: &str| {
            Tensor::from_vec(data, (rows, seq_len), &self.device)
                .map_err(|e| Error::internal(format!("Failed to create {} tensor: {}", what, e)))
        };

        Ok(Batch {
            token_ids: to_tensor(token_ids, "token id")?,
            segment_ids: to_tensor(segment_ids, "segment id")?,
            attention_mask: to_tensor(attention_mask, "attention mask")?,
            valid_lengths,
            max_len,
        })
    }
}

/// Row-major mask with the first `valid_length` positions of each row set to 1
pub fn attention_mask(valid_lengths: &[usize], seq_len: usize) -> Vec<u32> {
    let mut mask = vec![0u32; valid_lengths.len() * seq_len];
    for (row, &valid) in valid_lengths.iter().enumerate() {
        let start = row * seq_len;
        mask[start..start + valid.min(seq_len)].fill(1);
    }
    mask
}
