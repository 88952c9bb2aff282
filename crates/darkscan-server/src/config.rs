use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use darkscan_ai::OnnxOptions;
use darkscan_core::{EmptyTextPolicy, LabelError, LabelRegistry, RegistryVersion};
use darkscan_ocr::fetch::DEFAULT_MAX_IMAGE_BYTES;

/// Runtime configuration, read once at startup from flags or the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "darkscan", version, about = "Dark-pattern text and image classifier API")]
pub struct Config {
    #[arg(long, env = "DARKSCAN_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory holding `model.onnx` and `tokenizer.json`.
    #[arg(long, env = "DARKSCAN_MODEL_DIR")]
    pub model_dir: PathBuf,

    /// Built-in label table matching the model head.
    #[arg(long, env = "DARKSCAN_LABEL_SET", default_value = "v1")]
    pub label_set: RegistryVersion,

    /// JSON label file (`id2label` config or bare map); overrides `--label-set`.
    #[arg(long, env = "DARKSCAN_LABELS")]
    pub labels: Option<PathBuf>,

    #[arg(long, env = "DARKSCAN_MAX_LENGTH", default_value_t = 512)]
    pub max_length: usize,

    /// ONNX Runtime sessions available for concurrent requests.
    #[arg(long, env = "DARKSCAN_SESSIONS", default_value_t = 1)]
    pub sessions: usize,

    #[arg(long, env = "DARKSCAN_INTRA_THREADS")]
    pub intra_threads: Option<usize>,

    #[arg(long, env = "TESSERACT_CMD", default_value = "tesseract")]
    pub tesseract_cmd: PathBuf,

    #[arg(long, env = "DARKSCAN_OCR_LANG")]
    pub ocr_lang: Option<String>,

    /// Largest image body `/predict_image` and `/extract_image` will download.
    #[arg(long, env = "DARKSCAN_MAX_IMAGE_BYTES", default_value_t = DEFAULT_MAX_IMAGE_BYTES)]
    pub max_image_bytes: u64,

    /// DuckDB file for user feedback. Feedback is refused when unset.
    #[arg(long, env = "DARKSCAN_FEEDBACK_DB")]
    pub feedback_db: Option<PathBuf>,

    /// Empty-text handling on `/predict`: `infer` or `skip`.
    #[arg(long, env = "DARKSCAN_EMPTY_TEXT", default_value = "infer")]
    pub empty_text: EmptyTextPolicy,

    /// Empty-text handling on `/predict_image`: `infer` or `skip`.
    #[arg(long, env = "DARKSCAN_EMPTY_IMAGE_TEXT", default_value = "skip")]
    pub empty_image_text: EmptyTextPolicy,

    /// Include the input text in `/predict` responses.
    #[arg(long, env = "DARKSCAN_ECHO_TEXT", default_value_t = true, action = ArgAction::Set)]
    pub echo_text: bool,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn label_registry(&self) -> Result<LabelRegistry, LabelError> {
        match &self.labels {
            Some(path) => LabelRegistry::from_json_file(path),
            None => Ok(LabelRegistry::builtin(self.label_set)),
        }
    }

    pub fn onnx_options(&self) -> OnnxOptions {
        OnnxOptions {
            max_length: self.max_length,
            sessions: self.sessions,
            intra_threads: self.intra_threads,
        }
    }
}
