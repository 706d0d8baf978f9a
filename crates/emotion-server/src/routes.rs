//! HTTP routes and handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use emotion_core::{Emotion, Error, Prediction, RawExample};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::state::AppState;
use crate::telemetry::{ERRORS_TOTAL, INFERENCE_LATENCY_US, PREDICTIONS_TOTAL, REQUESTS_TOTAL};

/// Allowance for JSON framing around the sentence itself
const BODY_OVERHEAD_BYTES: usize = 1024;

/// Longest JSON spelling of one character: a `\uXXXX\uXXXX` surrogate pair.
/// The character limit itself is enforced by the encoder.
const MAX_ENCODED_CHAR_BYTES: usize = 12;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.service.max_chars() * MAX_ENCODED_CHAR_BYTES + BODY_OVERHEAD_BYTES;

    Router::new()
        .route("/", get(index))
        .route("/emotion", post(emotion))
        .route("/emotion/scores", post(emotion_scores))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .fallback(fallback)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> &'static str {
    "Hello World!"
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

async fn fallback() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

/// Body of both classification endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct EmotionRequest {
    pub content: String,
}

/// Label plus the full distribution, keyed by emotion name
#[derive(Debug, Serialize, Deserialize)]
pub struct ScoresResponse {
    pub label: Emotion,
    pub probabilities: serde_json::Map<String, serde_json::Value>,
}

impl From<Prediction> for ScoresResponse {
    fn from(prediction: Prediction) -> Self {
        let probabilities = prediction
            .scores()
            .map(|(emotion, p)| (emotion.as_str().to_string(), json!(p)))
            .collect();

        Self {
            label: prediction.label,
            probabilities,
        }
    }
}

/// Classify a sentence and answer with the bare label
async fn emotion(
    State(state): State<AppState>,
    body: Result<Json<EmotionRequest>, JsonRejection>,
) -> Result<String, AppError> {
    metrics::counter!(REQUESTS_TOTAL, "endpoint" => "emotion").increment(1);

    let Json(req) = body?;
    let prediction = run_inference(&state, req.content).await?;

    Ok(prediction.label.as_str().to_string())
}

/// Classify a sentence and answer with the label and every class probability
async fn emotion_scores(
    State(state): State<AppState>,
    body: Result<Json<EmotionRequest>, JsonRejection>,
) -> Result<Json<ScoresResponse>, AppError> {
    metrics::counter!(REQUESTS_TOTAL, "endpoint" => "scores").increment(1);

    let Json(req) = body?;
    let prediction = run_inference(&state, req.content).await?;

    Ok(Json(ScoresResponse::from(prediction)))
}

/// Run the model off the async executor, bounded by the configured deadline
async fn run_inference(state: &AppState, text: String) -> Result<Prediction, AppError> {
    debug!("Classifying {} characters", text.chars().count());

    let example = RawExample::unlabeled(text);
    let service = Arc::clone(&state.service);
    let start = Instant::now();
    let task = tokio::task::spawn_blocking(move || service.predict_example(&example));

    let joined = match state.config.request_timeout() {
        Some(limit) => tokio::time::timeout(limit, task)
            .await
            .map_err(|_| Error::Timeout)?,
        None => task.await,
    };

    let prediction =
        joined.map_err(|e| Error::internal(format!("inference task failed: {}", e)))??;

    metrics::histogram!(INFERENCE_LATENCY_US)
        .record(start.elapsed().as_micros() as f64);
    metrics::counter!(PREDICTIONS_TOTAL, "label" => prediction.label.as_str())
        .increment(1);

    info!(
        label = %prediction.label,
        confidence = prediction.confidence(),
        "Classified sentence"
    );

    Ok(prediction)
}

/// Error handling
#[derive(Debug)]
pub enum AppError {
    InvalidRequest(String),
    Timeout,
    InternalError(String),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Timeout => "timeout",
            AppError::InternalError(_) => "internal",
        }
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        metrics::counter!(ERRORS_TOTAL, "kind" => err.kind()).increment(1);

        match err {
            Error::Encoding(msg) => AppError::InvalidRequest(msg),
            Error::Timeout => AppError::Timeout,
            other => AppError::InternalError(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        metrics::counter!(ERRORS_TOTAL, "kind" => "invalid_json").increment(1);
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, message) = match self {
            AppError::InvalidRequest(msg) => {
                warn!("Rejected request: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::Timeout => {
                warn!("Inference deadline exceeded");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "Inference timed out".to_string(),
                )
            }
            AppError::InternalError(msg) => {
                error!("Inference failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = json!({
            "error": {
                "message": message,
                "type": kind,
            }
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (Error::encoding("empty"), StatusCode::BAD_REQUEST),
            (Error::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (Error::shape_mismatch("rows"), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::model_input("width"), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::EmptyDistribution, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn test_scores_response_shape() {
        let prediction = Prediction {
            label: Emotion::Joy,
            probabilities: emotion_core::ClassProbabilities::new(vec![1.0, 2.0, 3.0, 94.0]),
            labels: emotion_core::LabelTable::default(),
        };

        let value = serde_json::to_value(ScoresResponse::from(prediction)).unwrap();

        assert_eq!(value["label"], "JOY");
        assert_eq!(value["probabilities"]["FEAR"], 1.0);
        assert_eq!(value["probabilities"]["JOY"], 94.0);
        assert_eq!(value["probabilities"].as_object().unwrap().len(), 4);
    }
}
