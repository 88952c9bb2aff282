//! ONNX Runtime pipeline for sequence-classification models.
//!
//! Runs a Hugging Face `*ForSequenceClassification` export. The model
//! directory must contain `model.onnx` and `tokenizer.json`.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::Context;
use darkscan_core::LabelRegistry;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::info;

use crate::engine::{InferenceEngine, InferenceError};

/// Load-time options for [`OnnxEngine`].
#[derive(Debug, Clone)]
pub struct OnnxOptions {
    /// Tokens kept per input; longer inputs are truncated.
    pub max_length: usize,
    /// Independent sessions, one forward pass each at a time.
    pub sessions: usize,
    pub intra_threads: Option<usize>,
}

impl Default for OnnxOptions {
    fn default() -> Self {
        Self {
            max_length: 512,
            sessions: 1,
            intra_threads: None,
        }
    }
}

/// Token ids and masks for one input, in the model's `i64` layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub token_type_ids: Vec<i64>,
}

impl Encoded {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Converts raw text into model input ids.
pub struct TokenizerAdapter {
    tokenizer: Tokenizer,
}

impl TokenizerAdapter {
    /// Load `tokenizer.json` and truncate inputs to `max_length` tokens.
    pub fn load(path: &Path, max_length: usize) -> anyhow::Result<Self> {
        let mut tokenizer =
            Tokenizer::from_file(path).map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;

        // Single inputs never need padding.
        tokenizer.with_padding(None);

        Ok(Self { tokenizer })
    }

    pub fn encode(&self, text: &str) -> Result<Encoded, InferenceError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| InferenceError::Tokenize(e.to_string()))?;

        let widen = |v: &[u32]| v.iter().map(|&x| x as i64).collect::<Vec<i64>>();
        Ok(Encoded {
            input_ids: widen(encoding.get_ids()),
            attention_mask: widen(encoding.get_attention_mask()),
            token_type_ids: widen(encoding.get_type_ids()),
        })
    }
}

/// Sequence classifier backed by ONNX Runtime.
///
/// A session runs one forward pass at a time, so the engine keeps a small
/// pool of sessions and hands them out round-robin. The tokenizer is shared.
pub struct OnnxEngine {
    sessions: Vec<Mutex<Session>>,
    next: AtomicUsize,
    tokenizer: TokenizerAdapter,
    uses_token_type_ids: bool,
    num_classes: Option<usize>,
}

impl OnnxEngine {
    /// Load a classifier from a directory containing `model.onnx` and `tokenizer.json`.
    pub fn load(model_dir: &Path, options: &OnnxOptions) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {model_dir:?}"
        );
        anyhow::ensure!(options.max_length > 0, "max_length must be positive");

        let pool_size = options.sessions.max(1);
        let sessions = (0..pool_size)
            .map(|_| build_session(&model_path, options.intra_threads))
            .collect::<anyhow::Result<Vec<_>>>()?;

        // BERT-style graphs take segment ids; DistilBERT/RoBERTa exports do not.
        let uses_token_type_ids = sessions[0]
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");
        let num_classes = infer_classes(sessions[0].outputs()[0].dtype());

        let tokenizer = TokenizerAdapter::load(&tokenizer_path, options.max_length)?;

        info!(
            sessions = pool_size,
            classes = ?num_classes,
            uses_token_type_ids,
            model = %model_path.display(),
            "loaded classification model"
        );
        Ok(Self {
            sessions: sessions.into_iter().map(Mutex::new).collect(),
            next: AtomicUsize::new(0),
            tokenizer,
            uses_token_type_ids,
            num_classes,
        })
    }

    /// Label table from the model's own `config.json`, if it ships one with
    /// an `id2label` entry.
    pub fn load_labels(model_dir: &Path) -> anyhow::Result<Option<LabelRegistry>> {
        let config_path = model_dir.join("config.json");
        if !config_path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&config_path)
            .with_context(|| format!("read {}", config_path.display()))?;
        let config: serde_json::Value = serde_json::from_str(&json)
            .with_context(|| format!("parse {}", config_path.display()))?;
        if config.get("id2label").is_none() {
            return Ok(None);
        }

        let registry = LabelRegistry::from_json_str(&json)
            .with_context(|| format!("id2label in {}", config_path.display()))?;
        Ok(Some(registry))
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        // A panic mid-run leaves the session itself usable.
        self.sessions[slot]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl InferenceEngine for OnnxEngine {
    fn logits(&self, text: &str) -> Result<Vec<f32>, InferenceError> {
        let encoded = self.tokenizer.encode(text)?;
        let shape = [1i64, encoded.len() as i64];

        let ids_tensor = Tensor::from_array((shape, encoded.input_ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, encoded.attention_mask.into_boxed_slice()))?;

        let mut session = self.session();
        let outputs = if self.uses_token_type_ids {
            let type_tensor =
                Tensor::from_array((shape, encoded.token_type_ids.into_boxed_slice()))?;
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])?
        } else {
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
            ])?
        };

        // Logits: [1, num_classes].
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        if dims.len() != 2 || dims[0] != 1 || dims[1] <= 0 {
            return Err(InferenceError::OutputShape(dims.to_vec()));
        }

        let classes = dims[1] as usize;
        Ok(output_data[..classes].to_vec())
    }

    fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }
}

fn build_session(model_path: &Path, intra_threads: Option<usize>) -> anyhow::Result<Session> {
    let mut builder = Session::builder()?;
    if let Some(threads) = intra_threads {
        builder = builder.with_intra_threads(threads)?;
    }
    Ok(builder.commit_from_file(model_path)?)
}

/// Try to infer the class count from the ONNX model output type.
fn infer_classes(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => {
            // Last dimension is the class count.
            shape
                .last()
                .and_then(|&d| if d > 0 { Some(d as usize) } else { None })
        }
        _ => None,
    }
}
