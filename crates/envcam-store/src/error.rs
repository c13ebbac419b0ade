//! Error types for envcam-store.

use std::path::PathBuf;

use envcam_types::ValidationError;

/// Result type for envcam-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in envcam-store.
///
/// Callers only ever need to tell three kinds apart: [`Error::Validation`]
/// (bad input), [`Error::NotFound`] and everything else, which is a server-side
/// failure. See [`Error::is_client_error`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller input was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The requested device, image or export content does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// CSV or ZIP generation failed. Details are logged, not carried.
    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create a storage directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stored timestamp could not be parsed.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A timestamp could not be formatted.
    #[error("Timestamp formatting error: {0}")]
    Format(#[from] time::error::Format),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller can fix this error by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::NotFound(_))
    }
}
