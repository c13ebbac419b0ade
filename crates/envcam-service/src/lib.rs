//! HTTP ingestion and export service for envcam sensor nodes and cameras.
//!
//! This crate provides a service that:
//! - Accepts environmental sensor readings and stores them in SQLite
//! - Accepts camera image uploads into per-device directories
//! - Serves the latest reading, the latest image per device and stored images
//! - Exports all readings as CSV and all images as a ZIP archive
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `POST /api/sensor_data` - Record a reading (JSON body)
//! - `GET /api/latest_sensor_data` - Most recent reading
//! - `POST /api/camera_upload/{device_id}` - Upload an image (multipart field `image`)
//! - `GET /api/latest_images` - Latest image of every device
//! - `GET /images/{device_id}/{filename}` - Raw image bytes
//! - `GET /download/sensor_data` - CSV export of all readings
//! - `GET /download/images` - ZIP export of all images
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/envcam/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:5000"
//! max_upload_bytes = 16777216
//!
//! [storage]
//! database = "~/.local/share/envcam/sensor_data.db"
//! images = "~/.local/share/envcam/camera_images"
//!
//! [export]
//! utc_offset = "+05:30"
//! staging_dir = "/var/tmp/envcam"
//! ```

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod state;

pub use config::{Config, ConfigError, ExportConfig, ServerConfig, StorageConfig};
pub use state::AppState;

/// Build the complete application: routes, upload limit, tracing and CORS.
pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .merge(api::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
