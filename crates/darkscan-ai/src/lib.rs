//! Inference layer: engine seam, ONNX Runtime sequence classifier, and the text classification service.

mod classifier;
mod engine;
#[cfg(feature = "onnx")]
mod onnx;

pub use classifier::{TextClassifier, argmax};
pub use engine::{InferenceEngine, InferenceError};
#[cfg(feature = "onnx")]
pub use onnx::{Encoded, OnnxEngine, OnnxOptions, TokenizerAdapter};
