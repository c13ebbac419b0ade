//! Shared types for the envcam telemetry backend.
//!
//! This crate holds the plain data types that flow between the storage layer
//! (envcam-store) and the HTTP service (envcam-service).
//!
//! # Features
//!
//! - Sensor readings, both as submitted ([`NewReading`]) and as stored ([`Reading`])
//! - Validated device identifiers that are safe to use as path segments
//! - The image extension allow-list and content-type mapping
//!
//! # Example
//!
//! ```
//! use envcam_types::{DeviceId, NewReading};
//!
//! let reading = NewReading::new(22.5, 45.0, 1013.2, 2500.0);
//! reading.validate()?;
//!
//! let device = DeviceId::parse("garden")?;
//! assert_eq!(device.dir_name(), "camera_garden");
//! # Ok::<(), envcam_types::ValidationError>(())
//! ```

pub mod error;
pub mod types;

pub use error::{ValidationError, ValidationResult};
pub use types::{
    ALLOWED_EXTENSIONS, DEVICE_DIR_PREFIX, DeviceId, ImageInfo, ImageKind, MAX_DEVICE_ID_LEN,
    NewReading, Reading,
};

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    // --- NewReading validation tests ---

    #[test]
    fn test_new_reading_validate_accepts_finite_values() {
        let reading = NewReading::new(-12.0, 0.0, 980.5, 1000.0);
        assert!(reading.validate().is_ok());
    }

    #[test]
    fn test_new_reading_validate_rejects_each_field() {
        let base = NewReading::new(22.0, 40.0, 1000.0, 2000.0);

        let mut r = base;
        r.temperature = f64::NAN;
        assert_eq!(
            r.validate(),
            Err(ValidationError::NonFiniteField("temperature"))
        );

        let mut r = base;
        r.humidity = f64::INFINITY;
        assert_eq!(r.validate(), Err(ValidationError::NonFiniteField("humidity")));

        let mut r = base;
        r.pressure = f64::NEG_INFINITY;
        assert_eq!(r.validate(), Err(ValidationError::NonFiniteField("pressure")));

        let mut r = base;
        r.gas_resistance = f64::NAN;
        assert_eq!(
            r.validate(),
            Err(ValidationError::NonFiniteField("gas_resistance"))
        );
    }

    #[test]
    fn test_new_reading_deserialize_ignores_iaq() {
        let json = r#"{"temperature": 21.5, "humidity": 40, "pressure": 1001.2,
                       "gas_resistance": 3000.0, "iaq": 120.0}"#;
        let reading: NewReading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.humidity, 40.0);
    }

    #[test]
    fn test_new_reading_deserialize_missing_field() {
        let json = r#"{"temperature": 21.5, "humidity": 40, "pressure": 1001.2}"#;
        let result: Result<NewReading, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_new_reading_deserialize_non_numeric_field() {
        let json = r#"{"temperature": "warm", "humidity": 40, "pressure": 1001.2,
                       "gas_resistance": 3000.0}"#;
        let result: Result<NewReading, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    // --- Reading tests ---

    #[test]
    fn test_reading_at_offset_keeps_instant() {
        let reading = Reading {
            id: 1,
            timestamp: datetime!(2024-03-01 20:00:00 UTC),
            temperature: Some(22.0),
            humidity: Some(40.0),
            pressure: Some(1000.0),
            gas_resistance: Some(2000.0),
            iaq: None,
        };

        let shifted = reading.at_offset(offset!(+5:30));
        assert_eq!(shifted.timestamp, reading.timestamp);
        assert_eq!(shifted.timestamp.hour(), 1);
        assert_eq!(shifted.timestamp.minute(), 30);
        assert_eq!(shifted.timestamp.day(), 2);
    }

    #[test]
    fn test_reading_serializes_null_iaq() {
        let reading = Reading {
            id: 7,
            timestamp: datetime!(2024-03-01 20:00:00 UTC),
            temperature: Some(22.0),
            humidity: Some(40.0),
            pressure: Some(1000.0),
            gas_resistance: Some(2000.0),
            iaq: None,
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["id"], 7);
        assert!(json["iaq"].is_null());
        assert_eq!(json["timestamp"], "2024-03-01T20:00:00Z");
    }

    #[test]
    fn test_reading_serializes_missing_measurement_as_null() {
        let reading = Reading {
            id: 8,
            timestamp: datetime!(2024-03-01 20:00:00 UTC),
            temperature: None,
            humidity: Some(40.0),
            pressure: Some(1000.0),
            gas_resistance: Some(2000.0),
            iaq: None,
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert!(json["temperature"].is_null());
        assert_eq!(json["humidity"], 40.0);
    }

    // --- DeviceId tests ---

    #[test]
    fn test_device_id_accepts_plain_names() {
        for id in ["1", "porch", "cam-02", "garden_west", "Front.Door"] {
            assert!(DeviceId::parse(id).is_ok(), "{id} should be accepted");
        }
    }

    #[test]
    fn test_device_id_rejects_traversal_and_separators() {
        for id in ["..", ".", "../x", "a/b", "a\\b", "..hidden", "c:", "a\0b", "x\ny"] {
            assert!(
                matches!(
                    DeviceId::parse(id),
                    Err(ValidationError::InvalidDeviceId { .. })
                ),
                "{id:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_device_id_rejects_empty() {
        assert_eq!(DeviceId::parse(""), Err(ValidationError::EmptyDeviceId));
    }

    #[test]
    fn test_device_id_rejects_overlong() {
        let long = "x".repeat(MAX_DEVICE_ID_LEN + 1);
        assert!(DeviceId::parse(&long).is_err());
        let max = "x".repeat(MAX_DEVICE_ID_LEN);
        assert!(DeviceId::parse(&max).is_ok());
    }

    #[test]
    fn test_device_id_dir_name_round_trip() {
        let id = DeviceId::parse("attic").unwrap();
        assert_eq!(DeviceId::from_dir_name(&id.dir_name()), Some(id));
        assert_eq!(DeviceId::from_dir_name("camera_"), None);
        assert_eq!(DeviceId::from_dir_name("attic"), None);
    }

    // --- ImageKind tests ---

    #[test]
    fn test_image_kind_is_case_insensitive() {
        assert_eq!(ImageKind::from_file_name("a.JpEg"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_file_name("a.PNG"), Some(ImageKind::Png));
    }

    #[test]
    fn test_image_kind_rejects_other_files() {
        assert_eq!(ImageKind::from_file_name("a.gif"), None);
        assert_eq!(ImageKind::from_file_name("a.jpg.tmp"), None);
        assert_eq!(ImageKind::from_file_name(".png"), None);
        assert_eq!(ImageKind::from_file_name("README"), None);
    }

    #[test]
    fn test_image_kind_content_type() {
        assert_eq!(ImageKind::Jpeg.content_type(), "image/jpeg");
        assert_eq!(ImageKind::Png.content_type(), "image/png");
    }

    #[test]
    fn test_image_info_url() {
        let info = ImageInfo {
            device_id: DeviceId::parse("2").unwrap(),
            filename: "20240101_000000.jpg".to_string(),
            captured_at: datetime!(2024-01-01 00:00:00 UTC),
        };
        assert_eq!(info.url(), "/images/2/20240101_000000.jpg");
    }
}
