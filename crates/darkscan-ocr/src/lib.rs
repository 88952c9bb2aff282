//! OCR layer: fetch an image by URL, extract its text, and classify it.

mod error;
pub mod fetch;
pub mod pipeline;
pub mod tesseract;

pub use error::OcrError;
pub use fetch::{HttpImageFetcher, ImageFetcher};
pub use pipeline::ImagePipeline;
pub use tesseract::{OcrEngine, TesseractOcr};
