//! Model artifact loading.
//!
//! An artifact is a directory holding `config.json` (BERT configuration),
//! `model.safetensors` (encoder, pooler and classification head) and either
//! `tokenizer.json` or a WordPiece `vocab.txt`. It is read once at startup; the
//! resulting [`InferenceService`] owns everything it needs afterwards.

use crate::batch::BatchAssembler;
use crate::bert::BertPooledEncoder;
use crate::classifier::SequenceClassifier;
use crate::config::{DeviceSpec, ModelSource, ModelSpec};
use crate::encoder::{SentenceEncoder, SpecialTokens};
use crate::service::InferenceService;
use candle_core::{DType, Device};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::bert::Config as BertConfig;
use emotion_core::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::Tokenizer;

/// Weight file inside an artifact directory
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Checkpoint prefixes tried in order for the classification head
pub const HEAD_PREFIXES: [&str; 2] = ["classifier", "score"];

/// Load the artifact described by `spec` and build a ready-to-serve service.
///
/// Every consistency check runs here, so a service that builds is one that can
/// answer requests.
pub fn build_service(spec: &ModelSpec) -> Result<InferenceService> {
    let start = Instant::now();

    let model_dir = resolve_model_dir(&spec.source)?;
    tracing::info!("Loading emotion model from {}", model_dir.display());

    let tokenizer = load_tokenizer(&model_dir)?;
    let special = SpecialTokens::from_tokenizer(&tokenizer, spec.pad_token_id)?;
    let encoder = SentenceEncoder::new(tokenizer, special, spec.max_len, spec.max_chars)?;

    let bert_config: BertConfig = parse_json_config(&model_dir.join("config.json"))?;
    if let Some(expected) = spec.hidden_size {
        if expected != bert_config.hidden_size {
            return Err(Error::model_input(format!(
                "configured hidden_size {} but the model has {}",
                expected, bert_config.hidden_size
            )));
        }
    }

    let device = get_device(&spec.device)?;
    let vb = load_var_builder(&model_dir, &device)?;

    let bert = BertPooledEncoder::load(&vb, &bert_config)?;
    let head = load_classification_head(&vb, bert_config.hidden_size, spec.labels.len())?;
    let classifier =
        SequenceClassifier::new(Box::new(bert), head, bert_config.hidden_dropout_prob as f32)?;

    let service = InferenceService::new(
        encoder,
        BatchAssembler::new(device),
        Arc::new(classifier),
        spec.labels.clone(),
    )?
    .serialized(spec.serialize_inference);

    tracing::info!(
        labels = ?spec.labels.as_slice(),
        max_len = spec.max_len,
        serialized = spec.serialize_inference,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Emotion model ready"
    );

    Ok(service)
}

/// Locate the artifact directory, downloading it from the Hub if needed
pub fn resolve_model_dir(source: &ModelSource) -> Result<PathBuf> {
    match source {
        ModelSource::Local { path } => {
            let path = expand_home(path);
            if !path.is_dir() {
                return Err(Error::model_load(format!(
                    "Model directory does not exist: {}",
                    path.display()
                )));
            }
            Ok(path)
        }
        ModelSource::HuggingFace { repo, revision } => download_from_huggingface(repo, revision),
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

fn download_from_huggingface(repo: &str, revision: &str) -> Result<PathBuf> {
    tracing::info!("Downloading model from HuggingFace: {}@{}", repo, revision);

    let api = hf_hub::api::sync::Api::new().map_err(|e| {
        Error::model_load(format!("Failed to initialize HuggingFace API: {}", e))
    })?;
    let repo_obj = api.repo(hf_hub::Repo::with_revision(
        repo.to_string(),
        hf_hub::RepoType::Model,
        revision.to_string(),
    ));

    let config_path = repo_obj
        .get("config.json")
        .map_err(|e| Error::model_load(format!("Failed to download config.json: {}", e)))?;

    repo_obj
        .get(WEIGHTS_FILE)
        .map_err(|e| Error::model_load(format!("Failed to download {}: {}", WEIGHTS_FILE, e)))?;

    let found_tokenizer = ["tokenizer.json", "vocab.txt"].iter().any(|file| {
        match repo_obj.get(file) {
            Ok(_) => {
                tracing::debug!("Found tokenizer file: {}", file);
                true
            }
            Err(e) => {
                tracing::debug!("Tokenizer file {} unavailable: {}", file, e);
                false
            }
        }
    });

    if !found_tokenizer {
        return Err(Error::model_load(
            "No tokenizer found (tried tokenizer.json, vocab.txt)",
        ));
    }

    let model_dir = config_path
        .parent()
        .ok_or_else(|| Error::model_load("Invalid cache path"))?;

    tracing::info!("Model available at: {}", model_dir.display());
    Ok(model_dir.to_path_buf())
}

/// Load `tokenizer.json`, falling back to a WordPiece tokenizer over `vocab.txt`
pub fn load_tokenizer(model_dir: &Path) -> Result<Tokenizer> {
    let tokenizer_json = model_dir.join("tokenizer.json");
    if tokenizer_json.exists() {
        tracing::debug!("Loading tokenizer from tokenizer.json");
        return Tokenizer::from_file(&tokenizer_json)
            .map_err(|e| Error::model_load(format!("Failed to load tokenizer.json: {}", e)));
    }

    let vocab = model_dir.join("vocab.txt");
    if vocab.exists() {
        tracing::debug!("Building tokenizer from vocab.txt");
        return wordpiece_tokenizer(&vocab);
    }

    Err(Error::model_load(format!(
        "No tokenizer found in {} (tried tokenizer.json, vocab.txt)",
        model_dir.display()
    )))
}

/// Uncased BERT WordPiece tokenizer over a one-token-per-line vocabulary.
///
/// No post-processor is attached; boundary markers are added by the sentence encoder.
pub fn wordpiece_tokenizer(vocab_path: &Path) -> Result<Tokenizer> {
    let wordpiece = WordPiece::from_file(vocab_path.to_string_lossy().as_ref())
        .unk_token("[UNK]".to_string())
        .build()
        .map_err(|e| Error::model_load(format!("Failed to build WordPiece model: {}", e)))?;

    let mut tokenizer = Tokenizer::new(wordpiece);
    tokenizer.with_normalizer(Some(BertNormalizer::default()));
    tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));

    Ok(tokenizer)
}

fn parse_json_config<T: DeserializeOwned>(config_path: &Path) -> Result<T> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        Error::model_load(format!(
            "Failed to read config {}: {}",
            config_path.display(),
            e
        ))
    })?;

    serde_json::from_str(&config_str).map_err(|e| {
        Error::model_load(format!(
            "Failed to parse config {}: {}",
            config_path.display(),
            e
        ))
    })
}

fn load_var_builder(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let weights_path = model_dir.join(WEIGHTS_FILE);
    if !weights_path.exists() {
        return Err(Error::model_load(format!(
            "{} not found in {}",
            WEIGHTS_FILE,
            model_dir.display()
        )));
    }

    // SAFETY: the weight file is treated as read-only for the life of the process.
    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
            .map_err(|e| Error::model_load(format!("Failed to load weights: {}", e)))?
    };

    Ok(vb)
}

/// Load the `hidden_size -> num_labels` head.
///
/// A checkpoint without a trained head is rejected rather than initialized randomly.
pub fn load_classification_head(
    vb: &VarBuilder,
    hidden_size: usize,
    num_labels: usize,
) -> Result<Linear> {
    let mut errors = Vec::new();

    for prefix in HEAD_PREFIXES {
        match candle_nn::linear(hidden_size, num_labels, vb.pp(prefix)) {
            Ok(linear) => {
                tracing::info!(
                    "Loaded classification head from '{}' (hidden_size={}, num_labels={})",
                    prefix,
                    hidden_size,
                    num_labels
                );
                return Ok(linear);
            }
            Err(e) if vb.pp(prefix).contains_tensor("weight") => {
                // The head exists but its shape disagrees with the label table.
                return Err(Error::model_input(format!(
                    "classification head at '{}' does not map {} features to {} labels: {}",
                    prefix, hidden_size, num_labels, e
                )));
            }
            Err(e) => errors.push(format!("{}: {}", prefix, e)),
        }
    }

    Err(Error::model_load(format!(
        "No classification head with {} labels found [{}]",
        num_labels,
        errors.join(" | ")
    )))
}

/// Resolve a device spec to a candle device
pub fn get_device(spec: &DeviceSpec) -> Result<Device> {
    match spec {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda { index } => Device::new_cuda(index.unwrap_or(0))
            .map_err(|e| Error::model_load(format!("Failed to initialize CUDA: {}", e))),
        DeviceSpec::Metal { index } => Device::new_metal(index.unwrap_or(0))
            .map_err(|e| Error::model_load(format!("Failed to initialize Metal: {}", e))),
    }
}
