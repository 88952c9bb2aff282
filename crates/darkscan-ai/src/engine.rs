use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("tokenize: {0}")]
    Tokenize(String),
    #[error("model run failed: {0}")]
    Runtime(String),
    #[error("model returned no logits")]
    EmptyLogits,
    #[error("model returned {0} logits, all NaN")]
    NonFiniteLogits(usize),
    #[error("unexpected output shape: {0:?}, expected [1, num_classes]")]
    OutputShape(Vec<i64>),
    #[error("inference worker failed: {0}")]
    Worker(String),
}

#[cfg(feature = "onnx")]
impl From<ort::Error> for InferenceError {
    fn from(e: ort::Error) -> Self {
        Self::Runtime(e.to_string())
    }
}

/// A pretrained classifier that turns text into per-class scores.
///
/// Implementations are shared read-only across requests and must be callable
/// from several threads at once.
pub trait InferenceEngine: Send + Sync {
    /// Raw, unnormalized scores for one input text, one per class.
    fn logits(&self, text: &str) -> Result<Vec<f32>, InferenceError>;

    /// Number of output classes, when the engine knows it up front.
    fn num_classes(&self) -> Option<usize> {
        None
    }
}
