//! Server configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::UtcOffset;
use tracing::warn;

use envcam_store::ExportSettings;
use envcam_store::clock::parse_utc_offset;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Export settings.
    pub export: ExportConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults.
    pub fn load_default() -> Self {
        Self::load_or_default(default_config_path())
    }

    /// Load configuration from `path` if it exists.
    ///
    /// A missing file yields the defaults silently; a file that cannot be
    /// read or parsed is logged and also yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            warn!("Ignoring config file, using defaults: {}", e);
            Self::default()
        })
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return every problem found.
    ///
    /// This checks:
    /// - Server bind address is valid (host:port format)
    /// - Upload limit is non-zero
    /// - Database and image paths are not empty
    /// - Export offset parses as `+HH:MM` / `-HH:MM`
    ///
    /// # Example
    ///
    /// ```
    /// use envcam_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.export.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Default upload body limit (16 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind: String,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: "bind address cannot be empty".to_string(),
            });
        } else {
            match self.bind.rsplit_once(':') {
                None => errors.push(ValidationError {
                    field: "server.bind".to_string(),
                    message: format!(
                        "invalid bind address '{}': expected format 'host:port'",
                        self.bind
                    ),
                }),
                Some((_, port)) => match port.parse::<u16>() {
                    Ok(0) => errors.push(ValidationError {
                        field: "server.bind".to_string(),
                        message: "port cannot be 0".to_string(),
                    }),
                    Err(_) => errors.push(ValidationError {
                        field: "server.bind".to_string(),
                        message: format!("invalid port '{}': must be a number 1-65535", port),
                    }),
                    Ok(_) => {}
                },
            }
        }

        if self.max_upload_bytes == 0 {
            errors.push(ValidationError {
                field: "server.max_upload_bytes".to_string(),
                message: "upload limit cannot be 0".to_string(),
            });
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Readings database file.
    pub database: PathBuf,
    /// Root directory of the per-device image folders.
    pub images: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: envcam_store::default_db_path(),
            images: envcam_store::default_image_root(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.database.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.database".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }
        if self.images.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.images".to_string(),
                message: "image directory cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Display offset for timestamps and generated file names, as `+HH:MM`.
    pub utc_offset: String,
    /// Where ZIP archives are staged; the system temp dir when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            utc_offset: "+05:30".to_string(),
            staging_dir: None,
        }
    }
}

impl ExportConfig {
    /// Validate export configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Err(e) = parse_utc_offset(&self.utc_offset) {
            errors.push(ValidationError {
                field: "export.utc_offset".to_string(),
                message: format!(
                    "invalid offset '{}': expected '+HH:MM' or '-HH:MM' ({})",
                    self.utc_offset, e
                ),
            });
        }
        if let Some(dir) = &self.staging_dir
            && dir.as_os_str().is_empty()
        {
            errors.push(ValidationError {
                field: "export.staging_dir".to_string(),
                message: "staging directory cannot be empty string (omit instead)".to_string(),
            });
        }

        errors
    }

    /// The parsed display offset.
    pub fn offset(&self) -> Result<UtcOffset, ConfigError> {
        parse_utc_offset(&self.utc_offset).map_err(|e| {
            ConfigError::Validation(vec![ValidationError {
                field: "export.utc_offset".to_string(),
                message: format!("invalid offset '{}': {}", self.utc_offset, e),
            }])
        })
    }

    /// Settings for the exporter.
    pub fn settings(&self) -> Result<ExportSettings, ConfigError> {
        Ok(ExportSettings {
            offset: self.offset()?,
            staging_dir: self
                .staging_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `export.utc_offset`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("envcam")
        .join("server.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "0.0.0.0:5000");
        assert_eq!(config.server.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.export.utc_offset, "+05:30");
        assert!(config.export.staging_dir.is_none());
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.database, envcam_store::default_db_path());
        assert_eq!(config.images, envcam_store::default_image_root());
    }

    #[test]
    fn test_export_settings_default_offset() {
        let settings = ExportConfig::default().settings().unwrap();
        assert_eq!(settings.offset.whole_minutes(), 330);
        assert_eq!(settings.staging_dir, std::env::temp_dir());
    }

    #[test]
    fn test_export_settings_custom_staging() {
        let export = ExportConfig {
            utc_offset: "-03:00".to_string(),
            staging_dir: Some(PathBuf::from("/var/tmp/envcam")),
        };
        let settings = export.settings().unwrap();
        assert_eq!(settings.offset.whole_hours(), -3);
        assert_eq!(settings.staging_dir, PathBuf::from("/var/tmp/envcam"));
    }

    #[test]
    fn test_config_load_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("server.toml");
        std::fs::write(
            &config_path,
            r#"
                [server]
                bind = "127.0.0.1:9090"
                max_upload_bytes = 1024

                [export]
                staging_dir = "/tmp/staging"
            "#,
        )
        .unwrap();

        let loaded = Config::load(&config_path).unwrap();

        assert_eq!(loaded.server.bind, "127.0.0.1:9090");
        assert_eq!(loaded.server.max_upload_bytes, 1024);
        assert_eq!(loaded.export.utc_offset, "+05:30");
        assert_eq!(
            loaded.export.staging_dir,
            Some(PathBuf::from("/tmp/staging"))
        );
    }

    #[test]
    fn test_load_or_default_reads_existing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("server.toml");
        std::fs::write(&config_path, "[server]\nbind = \"127.0.0.1:7000\"\n").unwrap();

        let config = Config::load_or_default(&config_path);
        assert_eq!(config.server.bind, "127.0.0.1:7000");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(temp_dir.path().join("absent.toml"));
        assert_eq!(config.server.bind, "0.0.0.0:5000");
    }

    #[test]
    fn test_load_or_default_malformed_file_falls_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("server.toml");
        std::fs::write(&config_path, "[server\nbind = 5000").unwrap();

        let config = Config::load_or_default(&config_path);
        assert_eq!(config.server.bind, "0.0.0.0:5000");
        assert_eq!(config.export.utc_offset, "+05:30");
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_config_partial_toml_uses_defaults() {
        let toml = r#"
            [storage]
            images = "/srv/camera_images"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:5000");
        assert_eq!(config.storage.images, PathBuf::from("/srv/camera_images"));
        assert_eq!(config.storage.database, envcam_store::default_db_path());
        assert_eq!(config.export.utc_offset, "+05:30");
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [server]
            bind = "192.168.1.1:8888"
            max_upload_bytes = 4096

            [storage]
            database = "/data/sensor_data.db"
            images = "/data/camera_images"

            [export]
            utc_offset = "+00:00"
            staging_dir = "/var/tmp/envcam"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "192.168.1.1:8888");
        assert_eq!(config.server.max_upload_bytes, 4096);
        assert_eq!(config.storage.database, PathBuf::from("/data/sensor_data.db"));
        assert_eq!(config.export.offset().unwrap(), UtcOffset::UTC);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("envcam/server.toml"));
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_server_bind_validation() {
        let with_bind = |bind: &str| ServerConfig {
            bind: bind.to_string(),
            ..ServerConfig::default()
        };

        assert!(with_bind("127.0.0.1:8080").validate().is_empty());
        assert!(with_bind("[::1]:8080").validate().is_empty());
        assert!(with_bind("localhost:5000").validate().is_empty());

        let errors = with_bind("").validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot be empty"));

        let errors = with_bind("127.0.0.1").validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("host:port"));

        let errors = with_bind("127.0.0.1:0").validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot be 0"));

        let errors = with_bind("127.0.0.1:abc").validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("must be a number"));
    }

    #[test]
    fn test_zero_upload_limit_rejected() {
        let server = ServerConfig {
            max_upload_bytes: 0,
            ..ServerConfig::default()
        };
        let errors = server.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "server.max_upload_bytes");
    }

    #[test]
    fn test_storage_path_validation() {
        let empty = StorageConfig {
            database: PathBuf::new(),
            images: PathBuf::new(),
        };
        let errors = empty.validate();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "storage.database");
        assert_eq!(errors[1].field, "storage.images");
    }

    #[test]
    fn test_export_offset_validation() {
        for bad in ["IST", "5:30", "+5", "+05:75", ""] {
            let export = ExportConfig {
                utc_offset: bad.to_string(),
                staging_dir: None,
            };
            let errors = export.validate();
            assert_eq!(errors.len(), 1, "{bad:?} should be rejected");
            assert_eq!(errors[0].field, "export.utc_offset");
            assert!(export.settings().is_err());
        }
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let config = Config {
            server: ServerConfig {
                bind: "nope".to_string(),
                max_upload_bytes: 0,
            },
            storage: StorageConfig {
                database: PathBuf::new(),
                images: PathBuf::from("/data/images"),
            },
            export: ExportConfig {
                utc_offset: "bogus".to_string(),
                staging_dir: None,
            },
        };

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(
                    fields,
                    vec![
                        "server.bind",
                        "server.max_upload_bytes",
                        "storage.database",
                        "export.utc_offset"
                    ]
                );
            }
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::Read {
            path: PathBuf::from("/test/path"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        let display = format!("{}", error);
        assert!(display.contains("/test/path"));
        assert!(display.contains("not found"));
    }

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError {
            field: "server.bind".to_string(),
            message: "invalid port".to_string(),
        };
        assert_eq!(format!("{}", error), "server.bind: invalid port");
    }
}
