//! Core types for envcam sensor readings and camera images.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{ValidationError, ValidationResult};

/// Maximum length of a device identifier in bytes.
pub const MAX_DEVICE_ID_LEN: usize = 64;

/// Prefix of every device directory under the image root.
pub const DEVICE_DIR_PREFIX: &str = "camera_";

/// File extensions (lowercase) accepted for listing, serving and export.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// A sensor sample as submitted by a device.
///
/// All four measurements are required. The derived air-quality index is never
/// accepted from callers; it starts unset on every stored [`Reading`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NewReading {
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity percentage.
    pub humidity: f64,
    /// Atmospheric pressure in hPa.
    pub pressure: f64,
    /// Gas sensor resistance in ohms.
    pub gas_resistance: f64,
}

impl NewReading {
    /// Create a new reading from its four measurements.
    pub fn new(temperature: f64, humidity: f64, pressure: f64, gas_resistance: f64) -> Self {
        Self {
            temperature,
            humidity,
            pressure,
            gas_resistance,
        }
    }

    /// Check that every measurement is a finite number.
    ///
    /// # Examples
    ///
    /// ```
    /// use envcam_types::NewReading;
    ///
    /// assert!(NewReading::new(22.5, 45.0, 1013.2, 2500.0).validate().is_ok());
    /// assert!(NewReading::new(f64::NAN, 45.0, 1013.2, 2500.0).validate().is_err());
    /// ```
    pub fn validate(&self) -> ValidationResult<()> {
        let fields = [
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("pressure", self.pressure),
            ("gas_resistance", self.gas_resistance),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(ValidationError::NonFiniteField(name));
            }
        }
        Ok(())
    }
}

/// A stored sensor sample.
///
/// `timestamp` is assigned by the store at insert time and is always UTC.
/// Measurements recorded through [`NewReading`] are always present; rows
/// written by older tooling may carry SQL `NULL`, which reads back as `None`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// Store-assigned identifier, strictly increasing in insertion order.
    pub id: i64,
    /// When the reading was stored.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    /// Temperature in degrees Celsius.
    pub temperature: Option<f64>,
    /// Relative humidity percentage.
    pub humidity: Option<f64>,
    /// Atmospheric pressure in hPa.
    pub pressure: Option<f64>,
    /// Gas sensor resistance in ohms.
    pub gas_resistance: Option<f64>,
    /// Derived indoor air-quality index, if a derivation pipeline set one.
    pub iaq: Option<f64>,
}

impl Reading {
    /// Return a copy with the timestamp shifted to `offset`.
    ///
    /// The instant is unchanged; only its presentation moves.
    #[must_use]
    pub fn at_offset(&self, offset: time::UtcOffset) -> Self {
        Self {
            timestamp: self.timestamp.to_offset(offset),
            ..self.clone()
        }
    }
}

/// A validated device identifier.
///
/// Device identifiers become path segments on disk, so anything that could
/// escape the device's directory is rejected at construction.
///
/// # Examples
///
/// ```
/// use envcam_types::DeviceId;
///
/// let id = DeviceId::parse("porch").unwrap();
/// assert_eq!(id.dir_name(), "camera_porch");
///
/// assert!(DeviceId::parse("").is_err());
/// assert!(DeviceId::parse("../etc").is_err());
/// assert!(DeviceId::parse("a/b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DeviceId(String);

impl DeviceId {
    /// Validate a caller-supplied device identifier.
    pub fn parse(raw: &str) -> ValidationResult<Self> {
        let invalid = |reason| ValidationError::InvalidDeviceId {
            id: raw.to_string(),
            reason,
        };

        if raw.is_empty() {
            return Err(ValidationError::EmptyDeviceId);
        }
        if raw.len() > MAX_DEVICE_ID_LEN {
            return Err(invalid("too long"));
        }
        if raw.contains("..") {
            return Err(invalid("contains a traversal sequence"));
        }
        if raw == "." {
            return Err(invalid("reserved name"));
        }
        if raw.chars().any(|c| matches!(c, '/' | '\\' | ':')) {
            return Err(invalid("contains a path separator"));
        }
        if raw.chars().any(char::is_control) {
            return Err(invalid("contains a control character"));
        }

        Ok(Self(raw.to_string()))
    }

    /// Recover a device identifier from a device directory name.
    ///
    /// Returns `None` for directories that do not follow the naming convention
    /// or whose suffix is not a valid identifier.
    ///
    /// ```
    /// use envcam_types::DeviceId;
    ///
    /// assert_eq!(DeviceId::from_dir_name("camera_1").unwrap().as_str(), "1");
    /// assert!(DeviceId::from_dir_name("thumbnails").is_none());
    /// ```
    pub fn from_dir_name(name: &str) -> Option<Self> {
        name.strip_prefix(DEVICE_DIR_PREFIX)
            .and_then(|id| Self::parse(id).ok())
    }

    /// Name of the directory holding this device's images.
    pub fn dir_name(&self) -> String {
        format!("{}{}", DEVICE_DIR_PREFIX, self.0)
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Image formats accepted by the image store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Classify a file name by its extension, case-insensitively.
    ///
    /// Returns `None` for names outside [`ALLOWED_EXTENSIONS`].
    ///
    /// ```
    /// use envcam_types::ImageKind;
    ///
    /// assert_eq!(ImageKind::from_file_name("20240101_120000.JPG"), Some(ImageKind::Jpeg));
    /// assert_eq!(ImageKind::from_file_name("shot.png"), Some(ImageKind::Png));
    /// assert_eq!(ImageKind::from_file_name("notes.txt"), None);
    /// assert_eq!(ImageKind::from_file_name("jpg"), None);
    /// ```
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            _ => None,
        }
    }

    /// MIME type used when serving the image.
    pub fn content_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }
}

/// The most recent image of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ImageInfo {
    /// Owning device.
    pub device_id: DeviceId,
    /// File name inside the device directory.
    pub filename: String,
    /// Filesystem creation time of the file.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub captured_at: OffsetDateTime,
}

impl ImageInfo {
    /// Path under which the HTTP boundary serves this image.
    pub fn url(&self) -> String {
        format!("/images/{}/{}", self.device_id, self.filename)
    }
}
