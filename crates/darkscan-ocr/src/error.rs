use darkscan_ai::InferenceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("missing required field '{0}'")]
    MissingInput(&'static str),

    #[error("invalid image URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("fetching {url} failed: {reason}")]
    Fetch {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("OCR engine failed: {0}")]
    Engine(String),

    #[error("image worker failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

