//! Image pipeline: URL → image bytes → decoded image → OCR text → classification.

use std::sync::Arc;

use darkscan_ai::{InferenceError, TextClassifier};
use darkscan_core::{ClassificationResult, EmptyTextPolicy, ImageClassification};
use tracing::{debug, info};

use crate::{ImageFetcher, OcrEngine, OcrError};

pub struct ImagePipeline {
    fetcher: Arc<dyn ImageFetcher>,
    ocr: Arc<dyn OcrEngine>,
    classifier: Arc<TextClassifier>,
    empty_policy: EmptyTextPolicy,
}

impl ImagePipeline {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        ocr: Arc<dyn OcrEngine>,
        classifier: Arc<TextClassifier>,
        empty_policy: EmptyTextPolicy,
    ) -> Self {
        Self {
            fetcher,
            ocr,
            classifier,
            empty_policy,
        }
    }

    /// Extract plain text from the image at `image_url`.
    ///
    /// An empty URL fails before anything is fetched. An image with no
    /// detectable text yields `""`, which is not an error.
    pub async fn extract_text(&self, image_url: &str) -> Result<String, OcrError> {
        let url = image_url.trim();
        if url.is_empty() {
            return Err(OcrError::MissingInput("image_link"));
        }

        let bytes = self.fetcher.fetch(url).await?;
        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| OcrError::Worker(e.to_string()))??;
        debug!(width = image.width(), height = image.height(), "decoded image");

        let text = self.ocr.recognize(image).await?;
        info!(url, chars = text.chars().count(), "extracted text from image");
        Ok(text)
    }

    /// Extract text from the image and classify it.
    ///
    /// Under [`EmptyTextPolicy::Skip`], empty extracted text returns the
    /// sentinel result without touching the model.
    pub async fn classify_image(&self, image_url: &str) -> Result<ImageClassification, OcrError> {
        let text = self.extract_text(image_url).await?;

        if self.empty_policy.skips(&text) {
            debug!("no text in image, skipping inference");
            return Ok(ImageClassification::new(text, ClassificationResult::sentinel()));
        }

        let classifier = Arc::clone(&self.classifier);
        let input = text.clone();
        let result = tokio::task::spawn_blocking(move || classifier.classify(&input))
            .await
            .map_err(|e| InferenceError::Worker(e.to_string()))??;

        Ok(ImageClassification::new(text, result))
    }
}
