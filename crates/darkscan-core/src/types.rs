//! Request, result, and feedback types shared by the pipelines and the HTTP layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Label reported when extracted text is empty and inference was skipped.
pub const SENTINEL_LABEL: &str = "--";
/// Index reported alongside [`SENTINEL_LABEL`]. Serialized as a string.
pub const SENTINEL_INDEX: &str = "0";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
}

/// Body of `POST /predict` and `POST /echo`: a text classification request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub text: Option<String>,
}

impl PredictRequest {
    /// Empty text is a valid request; only an absent field is rejected.
    pub fn into_text(self) -> Result<String, RequestError> {
        self.text.ok_or(RequestError::MissingField("text"))
    }
}

/// Body of `POST /predict_image` and `POST /extract_image`: a remote image reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageRequest {
    #[serde(default)]
    pub image_link: Option<String>,
}

impl ImageRequest {
    /// The trimmed image URL. Absent and blank links are both missing.
    pub fn into_url(self) -> Result<String, RequestError> {
        match self.image_link {
            Some(url) if !url.trim().is_empty() => Ok(url.trim().to_string()),
            _ => Err(RequestError::MissingField("image_link")),
        }
    }
}

/// Predicted class index: a real class, or the `"0"` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictedIndex {
    Class(usize),
    Sentinel,
}

impl Serialize for PredictedIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Class(index) => serializer.serialize_u64(*index as u64),
            Self::Sentinel => serializer.serialize_str(SENTINEL_INDEX),
        }
    }
}

impl<'de> Deserialize<'de> for PredictedIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(usize),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(index) => Ok(Self::Class(index)),
            Raw::Text(s) if s == SENTINEL_INDEX => Ok(Self::Sentinel),
            Raw::Text(s) => Err(serde::de::Error::custom(format!(
                "unexpected class index {s:?}"
            ))),
        }
    }
}

/// Outcome of classifying one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub predicted_label: String,
    pub predicted_class_index: PredictedIndex,
}

impl ClassificationResult {
    pub fn classified(index: usize, label: String) -> Self {
        Self {
            text: None,
            predicted_label: label,
            predicted_class_index: PredictedIndex::Class(index),
        }
    }

    /// Placeholder result for empty input when inference is skipped.
    pub fn sentinel() -> Self {
        Self {
            text: None,
            predicted_label: SENTINEL_LABEL.to_string(),
            predicted_class_index: PredictedIndex::Sentinel,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn is_sentinel(&self) -> bool {
        self.predicted_class_index == PredictedIndex::Sentinel
    }
}

/// Response of `POST /predict_image`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageClassification {
    pub extracted_text: String,
    pub predicted_label: String,
    pub predicted_class_index: PredictedIndex,
}

impl ImageClassification {
    pub fn new(extracted_text: String, result: ClassificationResult) -> Self {
        Self {
            extracted_text,
            predicted_label: result.predicted_label,
            predicted_class_index: result.predicted_class_index,
        }
    }
}

/// What to do with empty input text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyTextPolicy {
    /// Run the model anyway.
    #[default]
    Infer,
    /// Return the sentinel result without running the model.
    Skip,
}

impl EmptyTextPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Infer => "infer",
            Self::Skip => "skip",
        }
    }

    /// Whether `text` should bypass inference under this policy.
    pub fn skips(&self, text: &str) -> bool {
        matches!(self, Self::Skip) && text.is_empty()
    }
}

impl fmt::Display for EmptyTextPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmptyTextPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "infer" => Ok(Self::Infer),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown empty-text policy {other:?} (expected infer or skip)")),
        }
    }
}

/// A stored feedback document. The id is assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRecord {
    pub id: String,
    /// The submitted document, verbatim.
    pub document: Value,
    pub received_at: DateTime<Utc>,
}

impl FeedbackRecord {
    /// The stored document with the store id merged in as `_id`.
    ///
    /// Non-object documents, and objects that already have their own `_id`,
    /// are wrapped as `{"_id": ..., "document": ...}` and left untouched.
    pub fn into_document(self) -> Value {
        match self.document {
            Value::Object(mut obj) if !obj.contains_key("_id") => {
                obj.insert("_id".into(), Value::String(self.id));
                Value::Object(obj)
            }
            other => serde_json::json!({ "_id": self.id, "document": other }),
        }
    }
}

/// Response of `POST /collect_user_feedback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackAck {
    pub message: String,
    pub id: String,
}

impl FeedbackAck {
    pub fn stored(id: String) -> Self {
        Self {
            message: "Feedback stored successfully".into(),
            id,
        }
    }
}
