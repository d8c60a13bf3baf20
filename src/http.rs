use std::path::Path;
use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::detector::{best_detection, Detect};
use crate::mapping::CivicTaxonomy;

pub const SERVICE_NAME: &str = "civicflo-ai";

const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<dyn Detect>,
    pub taxonomy: Arc<CivicTaxonomy>,
}

impl AppState {
    pub fn new(detector: Arc<dyn Detect>, taxonomy: CivicTaxonomy) -> Self {
        Self {
            detector,
            taxonomy: Arc::new(taxonomy),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No image part")]
    MissingImagePart,
    #[error("No selected file")]
    EmptyFilename,
    #[error("Invalid file type")]
    InvalidFileType,
    #[error("{0}")]
    Multipart(#[from] MultipartError),
    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingImagePart
            | ApiError::EmptyFilename
            | ApiError::InvalidFileType
            | ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("prediction failed: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PredictResponse {
    Detection {
        class: String,
        confidence: f32,
        valid: bool,
        civic_issue: String,
    },
    NoDetection {
        valid: bool,
        reason: String,
    },
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

fn allowed_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("image") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            upload = Some((filename, bytes));
            break;
        }
    }
    let (filename, bytes) = upload.ok_or(ApiError::MissingImagePart)?;

    if filename.is_empty() {
        return Err(ApiError::EmptyFilename);
    }
    if !allowed_file(&filename) {
        return Err(ApiError::InvalidFileType);
    }

    // The upload stays in memory for its whole lifetime: no shared temp path,
    // so concurrent requests cannot overwrite each other's image.
    let image = image::load_from_memory(&bytes)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to decode image: {e}")))?;

    let detections = state.detector.detect(&image).await?;

    let response = match best_detection(&detections) {
        Some(det) => PredictResponse::Detection {
            class: det.class_name.clone(),
            confidence: det.confidence,
            valid: true,
            civic_issue: state.taxonomy.tag_for(&det.class_name).to_string(),
        },
        None => PredictResponse::NoDetection {
            valid: false,
            reason: "No object detected with sufficient confidence".to_string(),
        },
    };
    Ok(Json(response))
}
