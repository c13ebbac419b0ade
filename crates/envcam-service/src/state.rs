//! Application state shared across handlers.
//!
//! The reading store owns a single SQLite connection and sits behind an async
//! [`Mutex`]; each handler holds the lock only for the duration of one store
//! call. The image store and exporter are plain values over paths and are
//! cloned into blocking tasks as needed.

use std::sync::Arc;

use envcam_store::{Exporter, ImageStore, ReadingStore};
use tokio::sync::Mutex;

use crate::config::{Config, ConfigError};

/// Shared application state.
pub struct AppState {
    /// The readings database.
    pub readings: Mutex<ReadingStore>,
    /// Per-device camera image directories.
    pub images: ImageStore,
    /// CSV and ZIP export.
    pub exporter: Exporter,
    /// Configuration the service was started with.
    pub config: Config,
}

impl AppState {
    /// Create new application state.
    ///
    /// Fails only when the export offset in `config` does not parse.
    pub fn new(readings: ReadingStore, config: Config) -> Result<Arc<Self>, ConfigError> {
        let settings = config.export.settings()?;
        let images = ImageStore::new(config.storage.images.clone(), settings.offset);
        let exporter = Exporter::new(settings);

        Ok(Arc::new(Self {
            readings: Mutex::new(readings),
            images,
            exporter,
            config,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envcam_types::NewReading;

    #[tokio::test]
    async fn test_app_state_new() {
        let store = ReadingStore::open_in_memory().unwrap();
        let state = AppState::new(store, Config::default()).unwrap();

        assert_eq!(state.config.server.bind, "0.0.0.0:5000");
        assert_eq!(state.images.offset().whole_minutes(), 330);
        assert_eq!(state.exporter.settings().offset, state.images.offset());
    }

    #[test]
    fn test_app_state_rejects_bad_offset() {
        let store = ReadingStore::open_in_memory().unwrap();
        let mut config = Config::default();
        config.export.utc_offset = "IST".to_string();

        assert!(matches!(
            AppState::new(store, config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_app_state_image_root_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.images = dir.path().join("camera_images");

        let state = AppState::new(ReadingStore::open_in_memory().unwrap(), config).unwrap();
        assert_eq!(state.images.root(), dir.path().join("camera_images"));
    }

    #[tokio::test]
    async fn test_app_state_store_access() {
        let store = ReadingStore::open_in_memory().unwrap();
        let state = AppState::new(store, Config::default()).unwrap();

        {
            let readings = state.readings.lock().await;
            readings
                .record(&NewReading::new(21.0, 40.0, 1000.0, 1500.0))
                .unwrap();
        }

        let readings = state.readings.lock().await;
        assert_eq!(readings.count().unwrap(), 1);
    }
}
