use std::sync::Arc;

use anyhow::Context;
use darkscan_ai::{OnnxEngine, TextClassifier};
use darkscan_core::{EmptyTextPolicy, LabelRegistry};
use darkscan_ocr::{HttpImageFetcher, ImagePipeline, TesseractOcr};
use darkscan_store::{DuckFeedbackStore, FeedbackSink};
use tracing::{info, warn};

use crate::config::Config;

/// Per-route behaviour switches.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub echo_text: bool,
    pub empty_text: EmptyTextPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            echo_text: true,
            empty_text: EmptyTextPolicy::Infer,
        }
    }
}

/// Services shared by all handlers.
pub struct AppState {
    pub classifier: Arc<TextClassifier>,
    pub images: ImagePipeline,
    /// `None` when no feedback store is configured.
    pub feedback: Option<Arc<dyn FeedbackSink>>,
    pub settings: Settings,
}

impl AppState {
    /// Load the model and wire the pipelines described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let labels = config
            .label_registry()
            .context("failed to load label registry")?;
        if config.labels.is_none() {
            check_model_labels(config, &labels);
        }

        let engine = OnnxEngine::load(&config.model_dir, &config.onnx_options())
            .with_context(|| format!("failed to load model from {}", config.model_dir.display()))?;
        let classifier = Arc::new(TextClassifier::new(Arc::new(engine), labels));

        let mut ocr = TesseractOcr::new(&config.tesseract_cmd);
        if let Some(lang) = &config.ocr_lang {
            ocr = ocr.with_lang(lang);
        }
        let images = ImagePipeline::new(
            Arc::new(HttpImageFetcher::new().with_max_bytes(config.max_image_bytes)),
            Arc::new(ocr),
            Arc::clone(&classifier),
            config.empty_image_text,
        );

        let feedback = match &config.feedback_db {
            Some(path) => {
                info!(path = %path.display(), "feedback store configured");
                Some(Arc::new(DuckFeedbackStore::new(path)) as Arc<dyn FeedbackSink>)
            }
            None => {
                warn!("no feedback store configured, /collect_user_feedback will refuse requests");
                None
            }
        };

        Ok(Self {
            classifier,
            images,
            feedback,
            settings: Settings {
                echo_text: config.echo_text,
                empty_text: config.empty_text,
            },
        })
    }
}

/// Warn when the model's own `id2label` disagrees with the built-in table in use.
fn check_model_labels(config: &Config, labels: &LabelRegistry) {
    match OnnxEngine::load_labels(&config.model_dir) {
        Ok(Some(model_labels)) if !model_labels.iter().eq(labels.iter()) => {
            warn!(
                label_set = %labels.version(),
                model_labels = model_labels.len(),
                "model config.json labels differ from the selected label set; pass --labels to use them"
            );
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "ignoring unreadable model config"),
    }
}
