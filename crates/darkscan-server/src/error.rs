use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use darkscan_ai::InferenceError;
use darkscan_core::RequestError;
use darkscan_ocr::OcrError;
use darkscan_store::StoreError;
use serde::Serialize;

/// Error returned by every handler, rendered as `{"error": ..., "code": ...}`.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: String) -> Self {
        Self {
            status,
            code,
            message,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!("Internal error: {}", msg);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
    }

    pub fn missing_input(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::warn!("Missing input: {}", msg);
        Self::new(StatusCode::BAD_REQUEST, "MISSING_INPUT", msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::warn!("Bad request: {}", msg);
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
    }

    pub fn invalid_url(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::warn!("Invalid URL: {}", msg);
        Self::new(StatusCode::BAD_REQUEST, "INVALID_URL", msg)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::warn!("Validation failed: {}", msg);
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", msg)
    }

    pub fn fetch_failed(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::warn!("Fetch failed: {}", msg);
        Self::new(StatusCode::BAD_GATEWAY, "FETCH_FAILED", msg)
    }

    pub fn undecodable_image(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::warn!("Undecodable image: {}", msg);
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "UNDECODABLE_IMAGE", msg)
    }

    pub fn ocr_failed(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!("OCR failed: {}", msg);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "OCR_FAILED", msg)
    }

    pub fn inference_failed(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!("Inference failed: {}", msg);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INFERENCE_FAILED", msg)
    }

    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!("Feedback store unavailable: {}", msg);
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE", msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody<'a> {
            error: &'a str,
            code: &'a str,
        }

        (
            self.status,
            Json(ErrorBody {
                error: &self.message,
                code: self.code,
            }),
        )
            .into_response()
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        Self::missing_input(err.to_string())
    }
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        Self::inference_failed(err.to_string())
    }
}

impl From<OcrError> for ApiError {
    fn from(err: OcrError) -> Self {
        match &err {
            OcrError::MissingInput(_) => Self::missing_input(err.to_string()),
            OcrError::InvalidUrl { .. } => Self::invalid_url(err.to_string()),
            OcrError::Fetch { .. } => Self::fetch_failed(err.to_string()),
            OcrError::Decode(_) => Self::undecodable_image(err.to_string()),
            OcrError::Engine(_) | OcrError::Worker(_) => Self::ocr_failed(err.to_string()),
            OcrError::Inference(_) => Self::inference_failed(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::Validation(_) => Self::validation(err.to_string()),
            StoreError::Connection(_) => Self::store_unavailable(err.to_string()),
            _ => Self::internal(format!("feedback store: {err}")),
        }
    }
}
