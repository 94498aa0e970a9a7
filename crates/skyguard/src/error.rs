//! Error types for skyguard.
//!
//! This module defines all error types used throughout the skyguard crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for skyguard operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Fetch Errors ===
    /// The air-quality API could not be reached.
    #[error("network error requesting {url}: {message}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The API answered with an unexpected HTTP status.
    #[error("request to {url} failed with status {status}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// The URL that was requested.
        url: String,
    },

    /// The API rejected our credentials.
    #[error("unauthorized by {provider}: check the configured API key")]
    Unauthorized {
        /// Name of the data provider.
        provider: &'static str,
    },

    /// The API returned a body we could not interpret.
    #[error("invalid response from {provider}: {message}")]
    InvalidResponse {
        /// Name of the data provider.
        provider: &'static str,
        /// Description of what was invalid.
        message: String,
    },

    /// No reading is available for the requested location.
    #[error("no air quality data available for {location}")]
    NoData {
        /// The location that was queried.
        location: String,
    },

    // === Domain Errors ===
    /// A concentration cannot be classified.
    #[error("cannot classify reading: {message}")]
    Classification {
        /// Description of the invalid input.
        message: String,
    },

    /// A location identifier could not be parsed.
    #[error("invalid location '{input}': {message}")]
    InvalidLocation {
        /// The identifier as given.
        input: String,
        /// Description of what was wrong.
        message: String,
    },

    // === Cache Errors ===
    /// Failed to open or create the cache database.
    #[error("failed to open cache database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A cache query failed.
    #[error("cache query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run cache schema migrations.
    #[error("cache migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
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

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for skyguard operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new network error.
    #[must_use]
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a new no-data error.
    #[must_use]
    pub fn no_data(location: impl std::fmt::Display) -> Self {
        Self::NoData {
            location: location.to_string(),
        }
    }

    /// Create a new classification error.
    #[must_use]
    pub fn classification(message: impl Into<String>) -> Self {
        Self::Classification {
            message: message.into(),
        }
    }

    /// Create an invalid response error for a provider.
    #[must_use]
    pub fn invalid_response(provider: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider,
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means the data source could not be reached.
    ///
    /// Server-side (5xx) statuses count as network failures; client errors do not.
    #[must_use]
    pub fn is_network_error(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if this error means there was simply nothing to report.
    #[must_use]
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::no_data("Quito");
        assert_eq!(err.to_string(), "no air quality data available for Quito");

        let err = Error::classification("negative concentration");
        assert_eq!(
            err.to_string(),
            "cannot classify reading: negative concentration"
        );
    }

    #[test]
    fn test_network_error_display() {
        let err = Error::network("https://api.openaq.org/v3/locations", "connection refused");
        let msg = err.to_string();
        assert!(msg.contains("api.openaq.org"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_is_network_error() {
        assert!(Error::network("u", "m").is_network_error());
        assert!(Error::HttpStatus {
            status: 503,
            url: "u".to_string()
        }
        .is_network_error());
        assert!(!Error::HttpStatus {
            status: 400,
            url: "u".to_string()
        }
        .is_network_error());
        assert!(!Error::no_data("x").is_network_error());
    }

    #[test]
    fn test_is_no_data() {
        assert!(Error::no_data("x").is_no_data());
        assert!(!Error::internal("x").is_no_data());
    }

    #[test]
    fn test_unauthorized_display() {
        let err = Error::Unauthorized { provider: "OpenAQ" };
        assert!(err.to_string().contains("OpenAQ"));
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn test_invalid_location_display() {
        let err = Error::InvalidLocation {
            input: "91,0".to_string(),
            message: "latitude out of range".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("91,0"));
        assert!(msg.contains("latitude"));
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/cache.db",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "radius_km must be between 1 and 25".to_string(),
        };
        assert!(err.to_string().contains("radius_km"));
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
