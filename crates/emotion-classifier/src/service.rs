//! Inference service: text in, emotion label out

use crate::batch::BatchAssembler;
use crate::classifier::SequenceClassifier;
use crate::encoder::SentenceEncoder;
use crate::postprocess::ScorePostProcessor;
use emotion_core::{Emotion, Error, LabelTable, Prediction, RawExample, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Runs encode, assemble, classify and post-process for incoming sentences.
///
/// All components are read-only after construction, so the service can be shared
/// across threads. With [`InferenceService::serialized`] set, forward passes are
/// additionally run one at a time.
pub struct InferenceService {
    encoder: SentenceEncoder,
    assembler: BatchAssembler,
    classifier: Arc<SequenceClassifier>,
    postprocessor: ScorePostProcessor,
    gate: Option<Mutex<()>>,
}

impl std::fmt::Debug for InferenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceService")
            .field("max_len", &self.encoder.max_len())
            .field("classifier", &self.classifier)
            .field("labels", self.postprocessor.labels())
            .field("serialized", &self.gate.is_some())
            .finish()
    }
}

impl InferenceService {
    /// Wire the pipeline together, checking that the stages agree.
    pub fn new(
        encoder: SentenceEncoder,
        assembler: BatchAssembler,
        classifier: Arc<SequenceClassifier>,
        labels: LabelTable,
    ) -> Result<Self> {
        if labels.len() != classifier.num_classes() {
            return Err(Error::model_input(format!(
                "label table has {} entries, classifier has {} classes",
                labels.len(),
                classifier.num_classes()
            )));
        }

        if encoder.max_len() > classifier.max_positions() {
            return Err(Error::model_input(format!(
                "max_len {} exceeds encoder capacity {}",
                encoder.max_len(),
                classifier.max_positions()
            )));
        }

        Ok(Self {
            encoder,
            assembler,
            classifier,
            postprocessor: ScorePostProcessor::new(labels),
            gate: None,
        })
    }

    /// Run at most one forward pass at a time
    pub fn serialized(mut self, serialized: bool) -> Self {
        self.gate = serialized.then(|| Mutex::new(()));
        self
    }

    pub fn labels(&self) -> &LabelTable {
        self.postprocessor.labels()
    }

    pub fn max_len(&self) -> usize {
        self.encoder.max_len()
    }

    pub fn max_chars(&self) -> usize {
        self.encoder.max_chars()
    }

    /// Predict the emotion of one sentence
    pub fn predict(&self, text: &str) -> Result<Emotion> {
        self.predict_detailed(text).map(|p| p.label)
    }

    /// Predict one sentence, keeping the full probability distribution
    pub fn predict_detailed(&self, text: &str) -> Result<Prediction> {
        let mut predictions = self.predict_batch(&[text])?;
        predictions
            .pop()
            .ok_or_else(|| Error::internal("classifier returned no prediction"))
    }

    /// Predict a request example; any gold label it carries is ignored
    pub fn predict_example(&self, example: &RawExample) -> Result<Prediction> {
        self.predict_detailed(&example.text)
    }

    /// Predict several sentences in one forward pass, in input order.
    ///
    /// Any unencodable sentence fails the whole call.
    pub fn predict_batch(&self, texts: &[&str]) -> Result<Vec<Prediction>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let examples = texts
            .iter()
            .map(|text| self.encoder.encode_default(text))
            .collect::<Result<Vec<_>>>()?;

        let batch = self.assembler.assemble(&examples)?;

        let logits = {
            let _guard = self.gate.as_ref().map(|gate| gate.lock());
            self.classifier.classify(&batch)?
        };

        if logits.len() != texts.len() {
            return Err(Error::internal(format!(
                "classifier returned {} rows for {} inputs",
                logits.len(),
                texts.len()
            )));
        }

        let predictions = self.postprocessor.postprocess_batch(&logits)?;

        for prediction in &predictions {
            tracing::debug!(
                label = %prediction.label,
                probabilities = ?prediction.probabilities.as_slice(),
                "Scored sentence"
            );
        }

        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use candle_core::Device;

    fn service(max_len: usize) -> (tempfile::TempDir, InferenceService) {
        let dir = tempfile::tempdir().unwrap();
        let service = testing::keyword_service(dir.path(), max_len).unwrap();
        (dir, service)
    }

    #[test]
    fn test_predict_each_emotion() {
        let (_dir, service) = service(32);

        assert_eq!(service.predict("i am so scared").unwrap(), Emotion::Fear);
        assert_eq!(service.predict("i am furious").unwrap(), Emotion::Anger);
        assert_eq!(service.predict("i feel lonely today").unwrap(), Emotion::Sad);
        assert_eq!(service.predict("i am very happy").unwrap(), Emotion::Joy);
    }

    #[test]
    fn test_no_keywords_falls_back_to_first_label() {
        let (_dir, service) = service(32);

        let prediction = service.predict_detailed("it was the").unwrap();

        assert_eq!(prediction.label, Emotion::Fear);
        assert_eq!(prediction.probabilities.as_slice(), &[25.0; 4]);
    }

    #[test]
    fn test_truncated_keywords_are_ignored() {
        let (_dir, service) = service(4);

        // Only "i am" survives truncation.
        let prediction = service.predict_detailed("i am happy happy happy").unwrap();

        assert_eq!(prediction.label, Emotion::Fear);
    }

    #[test]
    fn test_detailed_distribution() {
        let (_dir, service) = service(32);

        let prediction = service.predict_detailed("happy and glad but sad").unwrap();

        assert_eq!(prediction.label, Emotion::Joy);
        assert_eq!(prediction.probabilities.len(), 4);
        assert!((prediction.probabilities.total() - 100.0).abs() < 0.01);
        assert!(prediction.confidence() > prediction.probability(Emotion::Sad).unwrap());
    }

    #[test]
    fn test_batch_matches_single() {
        let (_dir, service) = service(32);
        let texts = ["i am glad", "so angry", "afraid and scared"];

        let batch: Vec<Emotion> = service
            .predict_batch(&texts)
            .unwrap()
            .into_iter()
            .map(|p| p.label)
            .collect();
        let single: Vec<Emotion> = texts.iter().map(|t| service.predict(t).unwrap()).collect();

        assert_eq!(batch, single);
        assert_eq!(batch, vec![Emotion::Joy, Emotion::Anger, Emotion::Fear]);
    }

    #[test]
    fn test_predict_example_ignores_gold_label() {
        let (_dir, service) = service(32);
        let example = RawExample {
            text: "so angry".to_string(),
            label: Some(Emotion::Joy),
        };

        assert_eq!(service.predict_example(&example).unwrap().label, Emotion::Anger);
    }

    #[test]
    fn test_empty_input_is_encoding_error() {
        let (_dir, service) = service(32);

        assert!(matches!(service.predict(""), Err(Error::Encoding(_))));
        assert!(matches!(
            service.predict_batch(&["happy", " "]),
            Err(Error::Encoding(_))
        ));
        assert!(service.predict_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_serialized_service() {
        let (_dir, service) = service(32);
        let service = Arc::new(service.serialized(true));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || service.predict("so sad").unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Emotion::Sad);
        }
    }

    #[test]
    fn test_label_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let result = InferenceService::new(
            testing::toy_encoder(dir.path(), 32).unwrap(),
            BatchAssembler::new(Device::Cpu),
            Arc::new(testing::keyword_classifier(512).unwrap()),
            LabelTable::new(vec![Emotion::Joy, Emotion::Sad]).unwrap(),
        );

        assert!(matches!(result, Err(Error::ModelInput(_))));
    }

    #[test]
    fn test_max_len_beyond_positions() {
        let dir = tempfile::tempdir().unwrap();
        let result = InferenceService::new(
            testing::toy_encoder(dir.path(), 64).unwrap(),
            BatchAssembler::new(Device::Cpu),
            Arc::new(testing::keyword_classifier(16).unwrap()),
            LabelTable::default(),
        );

        assert!(matches!(result, Err(Error::ModelInput(_))));
    }
}
