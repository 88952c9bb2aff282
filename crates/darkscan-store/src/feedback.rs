//! Feedback sink seam and document validation.

use darkscan_core::FeedbackRecord;
use serde_json::Value;

use crate::StoreError;

/// Persists user feedback documents. No schema is enforced beyond
/// [`validate_document`].
pub trait FeedbackSink: Send + Sync {
    /// Store `document` verbatim and return the store-assigned id.
    fn submit(&self, document: &Value) -> Result<String, StoreError>;

    /// Read a stored document back by id.
    fn get(&self, id: &str) -> Result<Option<FeedbackRecord>, StoreError>;
}

/// Reject documents with nothing in them: `null`, `{}`, `[]`, and `""`.
pub fn validate_document(document: &Value) -> Result<(), StoreError> {
    let empty = match document {
        Value::Null => true,
        Value::Object(obj) => obj.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    };

    if empty {
        return Err(StoreError::Validation(
            "feedback document is null or empty".into(),
        ));
    }
    Ok(())
}
