pub mod labels;
pub mod types;

pub use labels::{ClassLabel, LabelError, LabelRegistry, RegistryVersion};
pub use types::{
    ClassificationResult, EmptyTextPolicy, FeedbackAck, FeedbackRecord,
    ImageClassification, ImageRequest, PredictRequest, PredictedIndex, RequestError,
};
