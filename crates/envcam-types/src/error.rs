//! Input validation errors for envcam-types.

use thiserror::Error;

/// Errors raised when caller-supplied input is rejected.
///
/// These are always user-correctable: the HTTP boundary reports them as
/// `400 Bad Request`.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The device identifier was empty.
    #[error("device identifier cannot be empty")]
    EmptyDeviceId,

    /// The device identifier is unusable as a directory name.
    #[error("invalid device identifier '{id}': {reason}")]
    InvalidDeviceId { id: String, reason: &'static str },

    /// A measurement was NaN or infinite.
    #[error("field '{0}' must be a finite number")]
    NonFiniteField(&'static str),

    /// An image upload carried no bytes.
    #[error("image payload is empty")]
    EmptyImage,
}

/// Result type alias using envcam-types' ValidationError type.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;
