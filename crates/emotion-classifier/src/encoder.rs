//! Sentence encoding: raw text to fixed-length token id arrays
//!
//! The tokenizer only splits text into subwords. Boundary markers, truncation and
//! padding are applied here so that every encoded example has the layout
//! `[CLS] t1 .. tn [SEP] [PAD] ..` regardless of how the tokenizer file was configured.

use emotion_core::{Error, Result};
use tokenizers::Tokenizer;

/// Number of positions taken by the start and end markers
pub const SPECIAL_TOKEN_OVERHEAD: usize = 2;

/// Ids of the reserved tokens the encoder inserts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    /// Start-of-sequence marker
    pub cls: u32,
    /// End-of-sequence marker
    pub sep: u32,
    /// Padding id
    pub pad: u32,
}

impl SpecialTokens {
    /// Resolve marker ids from the vocabulary.
    ///
    /// BERT-style names are tried first, then SentencePiece-style ones. `pad_override`
    /// takes precedence over the vocabulary for the padding id.
    pub fn from_tokenizer(tokenizer: &Tokenizer, pad_override: Option<u32>) -> Result<Self> {
        let lookup = |candidates: &[&str]| {
            candidates
                .iter()
                .find_map(|token| tokenizer.token_to_id(token))
                .ok_or_else(|| {
                    Error::model_load(format!(
                        "vocabulary has none of the tokens {:?}",
                        candidates
                    ))
                })
        };

        let cls = lookup(&["[CLS]", "<s>", "<cls>"])?;
        let sep = lookup(&["[SEP]", "</s>", "<sep>"])?;
        let pad = match pad_override {
            Some(pad) => pad,
            None => lookup(&["[PAD]", "<pad>"])?,
        };

        Ok(Self { cls, sep, pad })
    }
}

/// One sentence encoded for the classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedExample {
    /// Token ids, starting with the start marker
    pub token_ids: Vec<u32>,

    /// Number of real tokens, boundary markers included
    pub valid_length: usize,

    /// Sentence markers, all zero for single-sentence input
    pub segment_ids: Vec<u32>,

    /// Sequence length cap this example was encoded for
    pub max_len: usize,
}

impl EncodedExample {
    /// Length of the id arrays
    pub fn seq_len(&self) -> usize {
        self.token_ids.len()
    }

    /// Whether the arrays were padded out to `max_len`
    pub fn is_padded(&self) -> bool {
        self.token_ids.len() == self.max_len
    }
}

/// Turns text into [`EncodedExample`]s using a pretrained subword vocabulary
pub struct SentenceEncoder {
    tokenizer: Tokenizer,
    special: SpecialTokens,
    max_len: usize,
    max_chars: usize,
}

impl SentenceEncoder {
    /// Create an encoder.
    ///
    /// Any truncation or padding configured in the tokenizer file is disabled; the
    /// encoder applies its own.
    pub fn new(
        mut tokenizer: Tokenizer,
        special: SpecialTokens,
        max_len: usize,
        max_chars: usize,
    ) -> Result<Self> {
        if max_len <= SPECIAL_TOKEN_OVERHEAD {
            return Err(Error::config(format!(
                "max_len must exceed {} to leave room for content tokens, got {}",
                SPECIAL_TOKEN_OVERHEAD, max_len
            )));
        }

        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(None)
            .map_err(|e| Error::model_load(format!("Failed to disable truncation: {}", e)))?;

        Ok(Self {
            tokenizer,
            special,
            max_len,
            max_chars,
        })
    }

    /// Configured sequence length cap
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Raw character limit for a single input
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn special_tokens(&self) -> SpecialTokens {
        self.special
    }

    /// Encode with the configured `max_len`, padded
    pub fn encode_default(&self, text: &str) -> Result<EncodedExample> {
        self.encode(text, self.max_len, true)
    }

    /// Encode one sentence.
    ///
    /// Keeps at most `max_len - 2` leading subwords, wraps them in the boundary
    /// markers and, when `pad` is set, right-pads to exactly `max_len`.
    pub fn encode(&self, text: &str, max_len: usize, pad: bool) -> Result<EncodedExample> {
        if text.trim().is_empty() {
            return Err(Error::encoding("input text is empty"));
        }

        let chars = text.chars().count();
        if chars > self.max_chars {
            return Err(Error::encoding(format!(
                "input text has {} characters, limit is {}",
                chars, self.max_chars
            )));
        }

        if max_len <= SPECIAL_TOKEN_OVERHEAD {
            return Err(Error::encoding(format!(
                "max_len {} leaves no room for content tokens",
                max_len
            )));
        }

        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| Error::encoding(format!("Tokenization failed: {}", e)))?;

        let content = encoding.get_ids();
        let keep = content.len().min(max_len - SPECIAL_TOKEN_OVERHEAD);

        let mut token_ids = Vec::with_capacity(max_len);
        token_ids.push(self.special.cls);
        token_ids.extend_from_slice(&content[..keep]);
        token_ids.push(self.special.sep);

        let valid_length = token_ids.len();

        if pad {
            token_ids.resize(max_len, self.special.pad);
        }

        let segment_ids = vec![0; token_ids.len()];

        Ok(EncodedExample {
            token_ids,
            valid_length,
            segment_ids,
            max_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn encoder(max_len: usize) -> (tempfile::TempDir, SentenceEncoder) {
        let dir = tempfile::tempdir().unwrap();
        let encoder = testing::toy_encoder(dir.path(), max_len).unwrap();
        (dir, encoder)
    }

    #[test]
    fn test_encode_pads_to_max_len() {
        let (_dir, encoder) = encoder(16);
        let special = encoder.special_tokens();

        let example = encoder.encode("I am so happy", 16, true).unwrap();

        assert_eq!(example.token_ids.len(), 16);
        assert_eq!(example.segment_ids.len(), 16);
        assert_eq!(example.valid_length, 6);
        assert_eq!(example.token_ids[0], special.cls);
        assert_eq!(example.token_ids[5], special.sep);
        assert!(example.token_ids[6..].iter().all(|id| *id == special.pad));
        assert!(example.segment_ids.iter().all(|id| *id == 0));
        assert!(example.is_padded());
    }

    #[test]
    fn test_encode_without_padding() {
        let (_dir, encoder) = encoder(16);

        let example = encoder.encode("i feel lonely", 16, false).unwrap();

        assert_eq!(example.seq_len(), example.valid_length);
        assert_eq!(example.valid_length, 5);
        assert_eq!(example.max_len, 16);
        assert!(!example.is_padded());
    }

    #[test]
    fn test_truncation_keeps_leading_tokens() {
        let (_dir, encoder) = encoder(6);
        let special = encoder.special_tokens();
        let full = encoder
            .encode("i am so very happy and glad today", 64, false)
            .unwrap();

        let example = encoder
            .encode("i am so very happy and glad today", 6, true)
            .unwrap();

        assert_eq!(example.valid_length, 6);
        assert_eq!(example.token_ids.len(), 6);
        assert_eq!(example.token_ids[0], special.cls);
        assert_eq!(&example.token_ids[1..5], &full.token_ids[1..5]);
        assert_eq!(example.token_ids[5], special.sep);
    }

    #[test]
    fn test_empty_text_rejected() {
        let (_dir, encoder) = encoder(16);

        assert!(matches!(encoder.encode("", 16, true), Err(Error::Encoding(_))));
        assert!(matches!(
            encoder.encode("   \n\t", 16, true),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn test_oversized_text_rejected() {
        let (_dir, encoder) = encoder(16);
        let text = "happy ".repeat(encoder.max_chars());

        assert!(matches!(
            encoder.encode(&text, 16, true),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let (_dir, encoder) = encoder(16);

        let a = encoder.encode_default("i am scared and angry").unwrap();
        let b = encoder.encode_default("i am scared and angry").unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_words_still_encoded() {
        let (_dir, encoder) = encoder(16);

        let example = encoder.encode("xylophone", 16, true).unwrap();

        assert!(example.valid_length >= 3);
    }

    #[test]
    fn test_max_len_too_small() {
        let (_dir, encoder) = encoder(16);

        assert!(matches!(
            encoder.encode("happy", 2, true),
            Err(Error::Encoding(_))
        ));
    }
}
