//! Storage layer: feedback documents, persisted verbatim.

mod error;
mod feedback;
pub use error::StoreError;
pub use feedback::{FeedbackSink, validate_document};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckFeedbackStore;
