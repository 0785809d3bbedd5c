//! Configuration management for checkin.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Application directory name under the user config dir.
const APP_DIR_NAME: &str = "checkin";

/// Largest accepted QR module size in pixels.
const MAX_MODULE_SIZE: u32 = 64;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CHECKIN_`, `__` separates sections)
/// 2. TOML config file at `~/.config/checkin/config.toml`
/// 3. Default values
///
/// Relative paths are resolved against the working directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Scanner configuration.
    pub scanner: ScannerConfig,
    /// QR generation configuration.
    pub qr: QrConfig,
    /// Display configuration.
    pub display: DisplayConfig,
}

/// Where the roster and the attendance ledger live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the JSON roster of known names.
    pub roster_path: PathBuf,
    /// Path to the `SQLite` attendance database.
    pub database_path: PathBuf,
}

/// Camera scanning configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Directory the camera reads frames from.
    pub frames_dir: PathBuf,
    /// Pause between two frame cycles in milliseconds.
    pub frame_interval_ms: u64,
}

/// QR generation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// Directory generated images are written to.
    pub output_dir: PathBuf,
    /// Edge length of one QR module in pixels.
    pub module_size: u32,
}

/// Display configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Number of check-ins shown in history views.
    pub history_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            roster_path: PathBuf::from("names_list.json"),
            database_path: PathBuf::from("attendance.db"),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("frames"),
            frame_interval_ms: 10,
        }
    }
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("qr_codes"),
            module_size: 10,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { history_limit: 20 }
    }
}

impl Config {
    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("CHECKIN_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.scanner.frame_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "frame_interval_ms must be greater than 0".to_string(),
            });
        }

        if self.qr.module_size == 0 || self.qr.module_size > MAX_MODULE_SIZE {
            return Err(Error::ConfigValidation {
                message: format!(
                    "module_size ({}) must be between 1 and {MAX_MODULE_SIZE}",
                    self.qr.module_size
                ),
            });
        }

        if self.storage.roster_path.as_os_str().is_empty() {
            return Err(Error::ConfigValidation {
                message: "roster_path must not be empty".to_string(),
            });
        }

        if self.storage.database_path.as_os_str().is_empty() {
            return Err(Error::ConfigValidation {
                message: "database_path must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the roster path.
    #[must_use]
    pub fn roster_path(&self) -> PathBuf {
        self.storage.roster_path.clone()
    }

    /// Get the database path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage.database_path.clone()
    }

    /// Get the frame interval as a Duration.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.scanner.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.roster_path(), PathBuf::from("names_list.json"));
        assert_eq!(config.database_path(), PathBuf::from("attendance.db"));
        assert_eq!(config.scanner.frames_dir, PathBuf::from("frames"));
        assert_eq!(config.qr.output_dir, PathBuf::from("qr_codes"));
        assert_eq!(config.qr.module_size, 10);
        assert_eq!(config.display.history_limit, 20);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_frame_interval() {
        let mut config = Config::default();
        config.scanner.frame_interval_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("frame_interval_ms"));
    }

    #[test]
    fn test_validate_module_size_bounds() {
        let mut config = Config::default();
        config.qr.module_size = 0;
        assert!(config.validate().is_err());

        config.qr.module_size = MAX_MODULE_SIZE + 1;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("module_size"));

        config.qr.module_size = MAX_MODULE_SIZE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_paths() {
        let mut config = Config::default();
        config.storage.roster_path = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.storage.database_path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_frame_interval() {
        let config = Config::default();
        assert_eq!(config.frame_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("checkin"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[storage]\nroster_path = \"party.json\"\n\n[display]\nhistory_limit = 5\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.roster_path(), PathBuf::from("party.json"));
        assert_eq!(config.display.history_limit, 5);
        assert_eq!(config.database_path(), PathBuf::from("attendance.db"));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scanner]\nframe_interval_ms = 0\n").unwrap();

        let result = Config::load_from(Some(path));
        assert!(matches!(result, Err(Error::ConfigValidation { .. })));
    }

    #[test]
    fn test_storage_config_deserialize() {
        let json = r#"{"database_path": "/srv/party.db"}"#;
        let storage: StorageConfig = serde_json::from_str(json).unwrap();
        assert_eq!(storage.database_path, PathBuf::from("/srv/party.db"));
        assert_eq!(storage.roster_path, PathBuf::from("names_list.json"));
    }
}
