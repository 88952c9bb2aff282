//! HTTP routes.
//!
//! Bodies are read as raw bytes and parsed as JSON whatever the
//! `Content-Type` header says, since the browser extension posts plain text.
//! An empty body counts as `{}`.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    routing::{get, post},
};
use darkscan_ai::InferenceError;
use darkscan_core::{ClassificationResult, FeedbackAck, ImageClassification, ImageRequest, PredictRequest};
use darkscan_store::validate_document;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/predict_image", post(predict_image))
        .route("/extract_image", post(extract_image))
        .route("/collect_user_feedback", post(collect_user_feedback))
        .route("/echo", post(echo))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("malformed JSON body: {e}")))
}

async fn predict(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ClassificationResult>, ApiError> {
    let text = parse_body::<PredictRequest>(&body)?.into_text()?;

    let classifier = Arc::clone(&state.classifier);
    let policy = state.settings.empty_text;
    let input = text.clone();
    let result = tokio::task::spawn_blocking(move || classifier.classify_with_policy(&input, policy))
        .await
        .map_err(|e| InferenceError::Worker(e.to_string()))??;

    info!(label = %result.predicted_label, "POST /predict");
    if state.settings.echo_text {
        Ok(Json(result.with_text(text)))
    } else {
        Ok(Json(result))
    }
}

async fn predict_image(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ImageClassification>, ApiError> {
    let url = parse_body::<ImageRequest>(&body)?.into_url()?;
    let result = state.images.classify_image(&url).await?;
    info!(label = %result.predicted_label, "POST /predict_image");
    Ok(Json(result))
}

#[derive(Serialize)]
struct ExtractedText {
    extracted_text: String,
}

async fn extract_image(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ExtractedText>, ApiError> {
    let url = parse_body::<ImageRequest>(&body)?.into_url()?;
    let extracted_text = state.images.extract_text(&url).await?;
    Ok(Json(ExtractedText { extracted_text }))
}

async fn collect_user_feedback(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<FeedbackAck>, ApiError> {
    let document = parse_body::<Value>(&body)?;
    validate_document(&document)?;

    let sink = state
        .feedback
        .clone()
        .ok_or_else(|| ApiError::store_unavailable("feedback store is not configured"))?;
    let id = tokio::task::spawn_blocking(move || sink.submit(&document))
        .await
        .map_err(|e| ApiError::internal(format!("feedback worker failed: {e}")))??;

    info!(id = %id, "POST /collect_user_feedback");
    Ok(Json(FeedbackAck::stored(id)))
}

#[derive(Serialize)]
struct EchoResponse {
    message: String,
}

async fn echo(body: Bytes) -> Result<Json<EchoResponse>, ApiError> {
    let req = parse_body::<PredictRequest>(&body)?;
    let text = req.text.unwrap_or_default();
    Ok(Json(EchoResponse {
        message: format!("Hi {text}! This is the server echoing your input."),
    }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    labels: usize,
    label_set: String,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let labels = state.classifier.labels();
    Json(HealthResponse {
        status: "ok",
        labels: labels.len(),
        label_set: labels.version().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Settings;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use darkscan_ai::{InferenceEngine, TextClassifier};
    use darkscan_core::{EmptyTextPolicy, FeedbackRecord, LabelRegistry};
    use darkscan_ocr::{ImageFetcher, ImagePipeline, OcrEngine, OcrError};
    use darkscan_store::{FeedbackSink, StoreError};
    use image::{DynamicImage, ImageFormat};
    use serde_json::json;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Scores "left" or "only" as scarcity, "hurry" as urgency, anything else as not_dark.
    struct KeywordEngine {
        calls: AtomicUsize,
    }

    impl InferenceEngine for KeywordEngine {
        fn logits(&self, text: &str) -> Result<Vec<f32>, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let lower = text.to_lowercase();
            let mut logits = vec![0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
            if lower.contains("hurry") {
                logits[1] = 4.0;
            }
            if lower.contains("left") || lower.contains("only") {
                logits[2] = 5.0;
            }
            Ok(logits)
        }

        fn num_classes(&self) -> Option<usize> {
            Some(8)
        }
    }

    struct FailingEngine;

    impl InferenceEngine for FailingEngine {
        fn logits(&self, _text: &str) -> Result<Vec<f32>, InferenceError> {
            Err(InferenceError::Runtime("session crashed".into()))
        }
    }

    struct PngFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageFetcher for PngFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.contains("missing") {
                return Err(OcrError::Fetch {
                    url: url.to_string(),
                    status: Some(404),
                    reason: "server returned 404 Not Found".into(),
                });
            }
            if url.ends_with(".html") {
                return Ok(b"<html></html>".to_vec());
            }
            let mut buf = Cursor::new(Vec::new());
            DynamicImage::new_rgb8(4, 4)
                .write_to(&mut buf, ImageFormat::Png)
                .map_err(OcrError::Decode)?;
            Ok(buf.into_inner())
        }
    }

    struct StubOcr;

    #[async_trait]
    impl OcrEngine for StubOcr {
        async fn recognize(&self, _image: DynamicImage) -> Result<String, OcrError> {
            Ok("Only 2 left!".into())
        }
    }

    struct BlankOcr;

    #[async_trait]
    impl OcrEngine for BlankOcr {
        async fn recognize(&self, _image: DynamicImage) -> Result<String, OcrError> {
            Ok(String::new())
        }
    }

    #[derive(Default)]
    struct MemorySink {
        docs: Mutex<Vec<Value>>,
    }

    impl FeedbackSink for MemorySink {
        fn submit(&self, document: &Value) -> Result<String, StoreError> {
            validate_document(document)?;
            let mut docs = self.docs.lock().unwrap();
            docs.push(document.clone());
            Ok(format!("fb-{}", docs.len()))
        }

        fn get(&self, _id: &str) -> Result<Option<FeedbackRecord>, StoreError> {
            Ok(None)
        }
    }

    struct DownSink;

    impl FeedbackSink for DownSink {
        fn submit(&self, _document: &Value) -> Result<String, StoreError> {
            Err(StoreError::Connection("connection refused".into()))
        }

        fn get(&self, _id: &str) -> Result<Option<FeedbackRecord>, StoreError> {
            Err(StoreError::Connection("connection refused".into()))
        }
    }

    struct Harness {
        engine: Arc<KeywordEngine>,
        fetcher: Arc<PngFetcher>,
        sink: Arc<MemorySink>,
    }

    fn build(
        engine: Arc<dyn InferenceEngine>,
        ocr: Arc<dyn OcrEngine>,
        fetcher: Arc<PngFetcher>,
        feedback: Option<Arc<dyn FeedbackSink>>,
        settings: Settings,
    ) -> Router {
        let classifier = Arc::new(TextClassifier::new(engine, LabelRegistry::v1()));
        let images = ImagePipeline::new(fetcher, ocr, Arc::clone(&classifier), EmptyTextPolicy::Skip);
        router(Arc::new(AppState {
            classifier,
            images,
            feedback,
            settings,
        }))
    }

    fn app_with(ocr: Arc<dyn OcrEngine>, settings: Settings) -> (Router, Harness) {
        let harness = Harness {
            engine: Arc::new(KeywordEngine {
                calls: AtomicUsize::new(0),
            }),
            fetcher: Arc::new(PngFetcher {
                calls: AtomicUsize::new(0),
            }),
            sink: Arc::new(MemorySink::default()),
        };
        let app = build(
            harness.engine.clone(),
            ocr,
            harness.fetcher.clone(),
            Some(harness.sink.clone()),
            settings,
        );
        (app, harness)
    }

    fn app() -> (Router, Harness) {
        app_with(Arc::new(StubOcr), Settings::default())
    }

    async fn send(app: Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "text/plain")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn post(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        send(app, Method::POST, uri, body).await
    }

    #[tokio::test]
    async fn predict_classifies_and_echoes_text() {
        let (app, _) = app();
        let (status, body) = post(app, "/predict", r#"{"text": "Only 2 left in stock!"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "text": "Only 2 left in stock!",
                "predicted_label": "scarcity",
                "predicted_class_index": 2
            })
        );
    }

    #[tokio::test]
    async fn predict_without_echo() {
        let settings = Settings {
            echo_text: false,
            ..Settings::default()
        };
        let (app, _) = app_with(Arc::new(StubOcr), settings);
        let (status, body) = post(app, "/predict", r#"{"text": "Hurry up!"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"predicted_label": "urgency", "predicted_class_index": 1}));
    }

    #[tokio::test]
    async fn predict_missing_text_is_400() {
        let (app, harness) = app();
        for body in ["{}", "", r#"{"text": null}"#] {
            let (status, json) = post(app.clone(), "/predict", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
            assert_eq!(json["code"], "MISSING_INPUT");
            assert!(json["error"].as_str().unwrap().contains("text"));
        }
        assert_eq!(harness.engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn predict_malformed_json_is_400() {
        let (app, _) = app();
        let (status, json) = post(app, "/predict", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn predict_empty_text_runs_model_by_default() {
        let (app, harness) = app();
        let (status, body) = post(app, "/predict", r#"{"text": ""}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["predicted_label"], "not_dark");
        assert_eq!(body["predicted_class_index"], 0);
        assert_eq!(harness.engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn predict_empty_text_skip_policy() {
        let settings = Settings {
            empty_text: EmptyTextPolicy::Skip,
            ..Settings::default()
        };
        let (app, harness) = app_with(Arc::new(StubOcr), settings);
        let (status, body) = post(app, "/predict", r#"{"text": ""}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["predicted_label"], "--");
        assert_eq!(body["predicted_class_index"], "0");
        assert_eq!(harness.engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn inference_failure_is_500() {
        let fetcher = Arc::new(PngFetcher {
            calls: AtomicUsize::new(0),
        });
        let app = build(
            Arc::new(FailingEngine),
            Arc::new(StubOcr),
            fetcher,
            None,
            Settings::default(),
        );
        let (status, json) = post(app, "/predict", r#"{"text": "Hurry!"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "INFERENCE_FAILED");
        assert!(json["error"].as_str().unwrap().contains("session crashed"));
    }

    #[tokio::test]
    async fn predict_image_extracts_and_classifies() {
        let (app, _) = app();
        let (status, body) = post(
            app,
            "/predict_image",
            r#"{"image_link": "https://shop.example/banner.png"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "extracted_text": "Only 2 left!",
                "predicted_label": "scarcity",
                "predicted_class_index": 2
            })
        );
    }

    #[tokio::test]
    async fn predict_image_blank_returns_sentinel() {
        let (app, harness) = app_with(Arc::new(BlankOcr), Settings::default());
        let (status, body) = post(
            app,
            "/predict_image",
            r#"{"image_link": "https://shop.example/blank.png"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"extracted_text": "", "predicted_label": "--", "predicted_class_index": "0"})
        );
        assert_eq!(harness.engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_image_link_never_fetches() {
        let (app, harness) = app();
        for uri in ["/predict_image", "/extract_image"] {
            for body in ["{}", r#"{"image_link": ""}"#] {
                let (status, json) = post(app.clone(), uri, body).await;
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(json["code"], "MISSING_INPUT");
            }
        }
        assert_eq!(harness.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn image_fetch_failures() {
        let (app, _) = app();
        let (status, json) = post(
            app.clone(),
            "/predict_image",
            r#"{"image_link": "https://shop.example/missing.png"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["code"], "FETCH_FAILED");

        let (status, json) = post(
            app,
            "/extract_image",
            r#"{"image_link": "https://shop.example/page.html"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["code"], "UNDECODABLE_IMAGE");
    }

    #[tokio::test]
    async fn extract_image_returns_text_only() {
        let (app, harness) = app();
        let (status, body) = post(
            app,
            "/extract_image",
            r#"{"image_link": "https://shop.example/banner.png"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"extracted_text": "Only 2 left!"}));
        assert_eq!(harness.engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn feedback_is_stored() {
        let (app, harness) = app();
        let (status, body) = post(
            app,
            "/collect_user_feedback",
            r#"{"url": "https://shop.example", "predicted_label": "scarcity", "correct": false}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"message": "Feedback stored successfully", "id": "fb-1"})
        );
        let docs = harness.sink.docs.lock().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["correct"], false);
    }

    #[tokio::test]
    async fn empty_feedback_is_rejected_without_write() {
        let (app, harness) = app();
        for body in ["", "{}", "null", "[]"] {
            let (status, json) = post(app.clone(), "/collect_user_feedback", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
            assert_eq!(json["code"], "VALIDATION_FAILED");
        }
        assert!(harness.sink.docs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn feedback_store_unavailable_is_503() {
        let fetcher = Arc::new(PngFetcher {
            calls: AtomicUsize::new(0),
        });
        let engine = Arc::new(KeywordEngine {
            calls: AtomicUsize::new(0),
        });

        let down = build(
            engine.clone(),
            Arc::new(StubOcr),
            fetcher.clone(),
            Some(Arc::new(DownSink)),
            Settings::default(),
        );
        let (status, json) = post(down, "/collect_user_feedback", r#"{"n": 1}"#).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["code"], "STORE_UNAVAILABLE");

        let unconfigured = build(engine, Arc::new(StubOcr), fetcher, None, Settings::default());
        let (status, json) = post(unconfigured, "/collect_user_feedback", r#"{"n": 1}"#).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["code"], "STORE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn echo_greets_input() {
        let (app, _) = app();
        let (status, body) = post(app.clone(), "/echo", r#"{"text": "Ada"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"message": "Hi Ada! This is the server echoing your input."})
        );

        let (_, body) = post(app, "/echo", "{}").await;
        assert_eq!(body["message"], "Hi ! This is the server echoing your input.");
    }

    #[tokio::test]
    async fn health_reports_label_set() {
        let (app, _) = app();
        let (status, body) = send(app, Method::GET, "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "labels": 8, "label_set": "v1"}));
    }

    #[tokio::test]
    async fn cors_preflight_is_allowed() {
        let (app, _) = app();
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/predict")
            .header("origin", "chrome-extension://abcdef")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.status().is_success());
        assert!(resp.headers().contains_key("access-control-allow-origin"));
    }
}
