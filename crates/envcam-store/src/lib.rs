//! Storage and export for envcam sensor readings and camera images.
//!
//! This crate provides the persistence layer of the envcam backend:
//!
//! - [`ReadingStore`]: append-only SQLite table of sensor samples
//! - [`ImageStore`]: per-device directories of timestamped camera images
//! - [`Exporter`]: CSV snapshot of all readings and ZIP archive of all images
//!
//! # Example
//!
//! ```no_run
//! use envcam_store::{ExportSettings, Exporter, ImageStore, ReadingStore};
//! use envcam_store::clock::DEFAULT_DISPLAY_OFFSET;
//! use envcam_types::NewReading;
//!
//! let readings = ReadingStore::open_default()?;
//! readings.record(&NewReading::new(22.5, 45.0, 1013.2, 2500.0))?;
//!
//! let images = ImageStore::new(envcam_store::default_image_root(), DEFAULT_DISPLAY_OFFSET);
//! images.put("porch", b"...jpeg bytes...")?;
//!
//! let exporter = Exporter::new(ExportSettings {
//!     offset: DEFAULT_DISPLAY_OFFSET,
//!     staging_dir: std::env::temp_dir(),
//! });
//! let csv = exporter.readings_csv(&readings)?;
//! println!("{} rows in {}", csv.rows, csv.filename);
//! # Ok::<(), envcam_store::Error>(())
//! ```

pub mod clock;
mod error;
mod export;
mod images;
mod schema;
mod store;

pub use error::{Error, Result};
pub use export::{CSV_HEADER, CsvExport, ExportSettings, Exporter, ImageArchive};
pub use images::{ImageStore, StoredImage, UPLOAD_EXTENSION};
pub use store::ReadingStore;

/// Default data directory following platform conventions.
///
/// - Linux: `~/.local/share/envcam`
/// - macOS: `~/Library/Application Support/envcam`
/// - Windows: `C:\Users\<user>\AppData\Local\envcam`
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("envcam")
}

/// Default database path: `<data dir>/sensor_data.db`.
pub fn default_db_path() -> std::path::PathBuf {
    default_data_dir().join("sensor_data.db")
}

/// Default image root: `<data dir>/camera_images`.
pub fn default_image_root() -> std::path::PathBuf {
    default_data_dir().join("camera_images")
}
