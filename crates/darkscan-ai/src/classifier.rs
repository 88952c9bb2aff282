//! Text classification service.
//!
//! Runs the engine once per input, takes the argmax over the logits, and
//! resolves the winning index through the label registry. Indices missing from
//! the registry degrade to `Unknown Label (<index>)` rather than failing.

use std::sync::Arc;

use darkscan_core::{ClassificationResult, EmptyTextPolicy, LabelRegistry};
use tracing::{debug, warn};

use crate::engine::{InferenceEngine, InferenceError};

/// Classifier service shared by all request handlers.
pub struct TextClassifier {
    engine: Arc<dyn InferenceEngine>,
    labels: LabelRegistry,
}

impl TextClassifier {
    pub fn new(engine: Arc<dyn InferenceEngine>, labels: LabelRegistry) -> Self {
        if let Some(classes) = engine.num_classes()
            && classes != labels.len()
        {
            warn!(
                classes,
                labels = labels.len(),
                label_set = %labels.version(),
                "model class count does not match label registry"
            );
        }
        Self { engine, labels }
    }

    pub fn labels(&self) -> &LabelRegistry {
        &self.labels
    }

    /// Classify one text. Empty text is passed to the model like any other input.
    pub fn classify(&self, text: &str) -> Result<ClassificationResult, InferenceError> {
        let logits = self.engine.logits(text)?;
        if logits.is_empty() {
            return Err(InferenceError::EmptyLogits);
        }
        let index = argmax(&logits).ok_or(InferenceError::NonFiniteLogits(logits.len()))?;
        let label = self.labels.resolve(index);

        debug!(index, label = %label, chars = text.chars().count(), "classified text");
        Ok(ClassificationResult::classified(index, label))
    }

    /// Classify, or return the sentinel result for empty text under [`EmptyTextPolicy::Skip`].
    pub fn classify_with_policy(
        &self,
        text: &str,
        policy: EmptyTextPolicy,
    ) -> Result<ClassificationResult, InferenceError> {
        if policy.skips(text) {
            debug!("empty text, skipping inference");
            return Ok(ClassificationResult::sentinel());
        }
        self.classify(text)
    }
}

/// Index of the largest value. The first maximum wins ties; NaN never wins.
///
/// `torch.argmax` would report the position of a NaN instead. Skipping them
/// keeps a single corrupt score from deciding the label.
///
/// Returns `None` for an empty slice or one containing only NaN.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, best_v)) if v <= best_v => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
