//! REST API endpoints for the envcam service.
//!
//! # Concurrency
//!
//! - **`state.readings`** (Mutex): acquired for a single store call and
//!   released before the response is built.
//! - Image store and export work touches the filesystem and runs on the
//!   blocking thread pool via [`run_blocking`].
//!
//! # Error Handling
//!
//! All endpoints return structured JSON errors via [`AppError`]. Rejected input
//! maps to 400, missing resources to 404. Storage and export failures are logged
//! with their cause and reported as a generic 500.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Multipart, Path, State, multipart::MultipartRejection, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::StreamExt;
use serde::Serialize;
use time::OffsetDateTime;
use tokio_util::io::ReaderStream;
use tracing::{error, info};

use envcam_store::Error as StoreError;
use envcam_types::{DeviceId, NewReading, Reading};

use crate::state::AppState;

/// Multipart field carrying an uploaded image.
pub const IMAGE_FIELD: &str = "image";

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        // Readings
        .route("/api/sensor_data", post(ingest_reading))
        .route("/api/latest_sensor_data", get(latest_reading))
        // Images
        .route("/api/camera_upload/{device_id}", post(upload_image))
        .route("/api/latest_images", get(latest_images))
        .route("/images/{device_id}/{filename}", get(serve_image))
        // Exports
        .route("/download/sensor_data", get(download_readings))
        .route("/download/images", get(download_images))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Acknowledgement of a stored reading.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub id: i64,
}

async fn ingest_reading(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewReading>, JsonRejection>,
) -> Result<Json<IngestResponse>, AppError> {
    let Json(reading) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let stored = state.readings.lock().await.record(&reading)?;
    info!(id = stored.id, "Recorded sensor reading");

    Ok(Json(IngestResponse {
        status: "success",
        id: stored.id,
    }))
}

/// Latest reading, with its timestamp shifted to the display offset.
///
/// An empty store is not an error: the client gets 200 and an `error` field.
async fn latest_reading(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let latest: Option<Reading> = state.readings.lock().await.latest()?;
    let offset = state.exporter.settings().offset;

    Ok(match latest {
        Some(reading) => Json(reading.at_offset(offset)).into_response(),
        None => Json(serde_json::json!({ "error": "No data available" })).into_response(),
    })
}

/// Acknowledgement of a stored image.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub filename: String,
}

async fn upload_image(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let mut content: Option<Bytes> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        if field.file_name().is_none_or(str::is_empty) {
            return Err(AppError::BadRequest("No selected file".to_string()));
        }
        content = Some(field.bytes().await.map_err(multipart_error)?);
        break;
    }
    let content = content.ok_or_else(|| AppError::BadRequest("No image file".to_string()))?;

    let images = state.images.clone();
    let filename = run_blocking(move || images.put(&device_id, &content)).await?;

    Ok(Json(UploadResponse {
        status: "success",
        filename,
    }))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    match e.status() {
        StatusCode::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge(e.body_text()),
        _ => AppError::BadRequest(format!("Failed to read multipart body: {}", e.body_text())),
    }
}

/// Most recent image of one device.
#[derive(Debug, Serialize)]
pub struct LatestImage {
    pub filename: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub url: String,
}

async fn latest_images(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<DeviceId, LatestImage>>, AppError> {
    let images = state.images.clone();
    let offset = images.offset();
    let latest = run_blocking(move || images.latest_all()).await?;

    let body = latest
        .into_iter()
        .map(|(device, info)| {
            let image = LatestImage {
                url: info.url(),
                timestamp: info.captured_at.to_offset(offset),
                filename: info.filename,
            };
            (device, image)
        })
        .collect();
    Ok(Json(body))
}

async fn serve_image(
    State(state): State<Arc<AppState>>,
    Path((device_id, filename)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let images = state.images.clone();
    let image = run_blocking(move || images.read(&device_id, &filename)).await?;

    Ok(([(header::CONTENT_TYPE, image.kind.content_type())], image.content).into_response())
}

async fn download_readings(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let export = {
        let readings = state.readings.lock().await;
        state.exporter.readings_csv(&readings)?
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(header::CONTENT_DISPOSITION, attachment(&export.filename))
        .body(Body::from(export.content))
        .map_err(response_error)
}

/// Stream the image archive from its staged file.
///
/// The archive handle moves into the body stream, so the staged file is
/// deleted once the body is finished or dropped on disconnect.
async fn download_images(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let images = state.images.clone();
    let exporter = state.exporter.clone();
    let archive = run_blocking(move || exporter.images_zip(&images)).await?;

    let file = archive.open().map_err(|e| {
        error!(error = %e, path = %archive.path().display(), "Failed to reopen staged archive");
        AppError::Internal("Export failed".to_string())
    })?;
    let filename = archive.filename().to_string();
    let size = archive.len();

    let stream = ReaderStream::new(tokio::fs::File::from_std(file)).map(move |chunk| {
        let _staged = &archive;
        chunk
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_DISPOSITION, attachment(&filename))
        .header(header::CONTENT_LENGTH, size)
        .body(Body::from_stream(stream))
        .map_err(response_error)
}

fn attachment(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", filename)
}

fn response_error(e: axum::http::Error) -> AppError {
    error!(error = %e, "Failed to build response");
    AppError::Internal("Internal server error".to_string())
}

/// Run a filesystem-bound store call on the blocking pool.
async fn run_blocking<T, F>(task: F) -> Result<T, AppError>
where
    F: FnOnce() -> envcam_store::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(task).await.map_err(|e| {
        error!(error = %e, "Blocking task failed");
        AppError::Internal("Internal server error".to_string())
    })?;
    Ok(result?)
}

/// API error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    PayloadTooLarge(String),
    Store(StoreError),
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Store(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::Store(StoreError::Validation(e)) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Store(e @ StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()),
            // Already logged with its cause by the exporter.
            AppError::Store(StoreError::ExportFailed(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Export failed".to_string(),
            ),
            AppError::Store(e) => {
                error!(error = %e, "Storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
