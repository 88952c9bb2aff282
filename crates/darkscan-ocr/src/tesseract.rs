//! Tesseract OCR adapter.
//!
//! Shells out to the `tesseract` executable configured at startup: the image
//! is written to a temporary PNG and the recognized text is read from stdout.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

use crate::OcrError;

/// Extracts plain text from decoded image pixels.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognized text, trimmed. An image without text yields `""`.
    ///
    /// Takes the image by value so pixel work can move off the async runtime.
    async fn recognize(&self, image: DynamicImage) -> Result<String, OcrError>;
}

#[derive(Debug, Clone)]
pub struct TesseractOcr {
    command: PathBuf,
    lang: Option<String>,
}

impl TesseractOcr {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            lang: None,
        }
    }

    /// Tesseract language pack(s), e.g. `eng` or `eng+deu`.
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn command(&self) -> &Path {
        &self.command
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: DynamicImage) -> Result<String, OcrError> {
        let file = tokio::task::spawn_blocking(move || write_temp_png(image))
            .await
            .map_err(|e| OcrError::Worker(e.to_string()))??;

        let mut cmd = Command::new(&self.command);
        cmd.arg(file.path()).arg("stdout").kill_on_drop(true);
        if let Some(lang) = &self.lang {
            cmd.arg("-l").arg(lang);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| OcrError::Engine(format!("run {}: {e}", self.command.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "{} exited with {}: {}",
                self.command.display(),
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(chars = text.chars().count(), "tesseract finished");
        Ok(text)
    }
}

/// Encode `image` as PNG into a fresh temp file. Blocking.
fn write_temp_png(image: DynamicImage) -> Result<NamedTempFile, OcrError> {
    let file = tempfile::Builder::new()
        .prefix("darkscan-ocr-")
        .suffix(".png")
        .tempfile()
        .map_err(|e| OcrError::Engine(format!("create temp file: {e}")))?;

    // PNG has no float pixel formats; normalize before encoding.
    DynamicImage::ImageRgba8(image.into_rgba8())
        .save_with_format(file.path(), ImageFormat::Png)
        .map_err(|e| OcrError::Engine(format!("write temp image: {e}")))?;
    Ok(file)
}
