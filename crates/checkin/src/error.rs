//! Error types for checkin.
//!
//! This module defines all error types used throughout the checkin crate,
//! providing detailed context for debugging and operator-facing messages.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// The main error type for checkin operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Ledger Errors ===
    /// Failed to open or create the attendance database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// The attendee already has a check-in on this calendar date.
    #[error("{name} is already registered for {date}")]
    DuplicateCheckIn {
        /// Name that was checked in.
        name: String,
        /// Local calendar date of the existing check-in.
        date: NaiveDate,
    },

    // === Roster Errors ===
    /// The roster file exists but could not be parsed.
    #[error("failed to parse roster at {path}: {source}")]
    RosterParse {
        /// Path to the roster file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The roster file is required but does not exist.
    #[error("roster not found at {path}; run a check-in command first to create it")]
    RosterMissing {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// An attendee name was rejected before any persistence happened.
    #[error("invalid name: {message}")]
    Validation {
        /// Why the name was rejected.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Scanner Errors ===
    /// The camera device could not be opened.
    #[error("camera unavailable at {device}: {message}")]
    CameraUnavailable {
        /// Device or frame source that was opened.
        device: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// Reading a frame from an open camera failed.
    #[error("frame capture failed: {message}")]
    FrameCapture {
        /// Description of what went wrong.
        message: String,
    },

    /// A command was issued in a scanner state that does not accept it.
    #[error("invalid scanner state: {0}")]
    InvalidState(String),

    // === QR Errors ===
    /// A name could not be encoded as a QR symbol.
    #[error("failed to encode QR code for '{name}': {message}")]
    QrEncode {
        /// The name being encoded.
        name: String,
        /// Description of what went wrong.
        message: String,
    },

    /// Image encoding or decoding failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for checkin operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a camera unavailable error.
    #[must_use]
    pub fn camera_unavailable(device: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CameraUnavailable {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a frame capture error.
    #[must_use]
    pub fn frame_capture(message: impl Into<String>) -> Self {
        Self::FrameCapture {
            message: message.into(),
        }
    }

    /// Create a new invalid state error.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Check if this error is a duplicate same-day check-in.
    #[must_use]
    pub fn is_duplicate_check_in(&self) -> bool {
        matches!(self, Self::DuplicateCheckIn { .. })
    }

    /// Check if this error is a rejected name.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error means the camera could not be opened.
    #[must_use]
    pub fn is_camera_unavailable(&self) -> bool {
        matches!(self, Self::CameraUnavailable { .. })
    }

    /// Check if this error is a persistence failure (disk, permissions, corruption).
    #[must_use]
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            Self::DatabaseOpen { .. }
                | Self::DatabaseQuery(_)
                | Self::DatabaseMigration { .. }
                | Self::RosterParse { .. }
                | Self::RosterMissing { .. }
                | Self::Io(_)
                | Self::DirectoryCreate { .. }
                | Self::Json(_)
                | Self::Image(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::validation("name must not be empty");
        assert_eq!(err.to_string(), "invalid name: name must not be empty");

        let err = Error::invalid_state("scanner is not running");
        assert_eq!(err.to_string(), "invalid scanner state: scanner is not running");
    }

    #[test]
    fn test_duplicate_check_in_display() {
        let err = Error::DuplicateCheckIn {
            name: "Alice".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 12, 20).unwrap(),
        };
        assert_eq!(err.to_string(), "Alice is already registered for 2024-12-20");
        assert!(err.is_duplicate_check_in());
        assert!(!err.is_storage_error());
    }

    #[test]
    fn test_error_is_validation_error() {
        assert!(Error::validation("blank").is_validation_error());
        assert!(!Error::invalid_state("x").is_validation_error());
    }

    #[test]
    fn test_camera_unavailable_display() {
        let err = Error::camera_unavailable("/dev/video0", "no such device");
        let msg = err.to_string();
        assert!(msg.contains("/dev/video0"));
        assert!(msg.contains("no such device"));
        assert!(err.is_camera_unavailable());
        assert!(!err.is_storage_error());
    }

    #[test]
    fn test_frame_capture_error() {
        let err = Error::frame_capture("truncated image");
        assert_eq!(err.to_string(), "frame capture failed: truncated image");
    }

    #[test]
    fn test_invalid_state_error() {
        let err = Error::invalid_state("scanner already running");
        assert_eq!(
            err.to_string(),
            "invalid scanner state: scanner already running"
        );
    }

    #[test]
    fn test_roster_missing_display() {
        let err = Error::RosterMissing {
            path: PathBuf::from("names_list.json"),
        };
        assert!(err.to_string().contains("names_list.json"));
        assert!(err.is_storage_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
        assert!(err.is_storage_error());
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
            assert!(err.is_storage_error());
        }
    }

    #[test]
    fn test_roster_parse_error_display() {
        let json_err = serde_json::from_str::<Vec<String>>("{not json").unwrap_err();
        let err = Error::RosterParse {
            path: PathBuf::from("/tmp/names_list.json"),
            source: json_err,
        };
        assert!(err.to_string().contains("/tmp/names_list.json"));
        assert!(err.is_storage_error());
    }

    #[test]
    fn test_database_migration_error_display() {
        let err = Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "invalid interval".to_string(),
        };
        assert!(err.to_string().contains("invalid interval"));
        assert!(!err.is_storage_error());
    }

    #[test]
    fn test_qr_encode_error_display() {
        let err = Error::QrEncode {
            name: "Bob".to_string(),
            message: "data too long".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Bob"));
        assert!(msg.contains("data too long"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
