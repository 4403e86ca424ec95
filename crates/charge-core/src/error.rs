use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by chargelog.
///
/// Problems with a single session record are never surfaced here; the
/// normalizer drops such records and keeps going.
#[derive(Error, Debug)]
pub enum ChargeError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The uploaded document is not valid JSON.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The document parsed, but its top-level value is not an array of sessions.
    #[error("Cannot process document: expected a JSON array of sessions, found {found}")]
    NotAnArray { found: &'static str },

    /// The document exceeds the configured size cap.
    #[error("Document is {size} bytes, larger than the {limit} byte limit")]
    DocumentTooLarge { size: u64, limit: u64 },

    /// A timestamp string did not match any recognised format.
    #[error("Invalid timestamp format: {0}")]
    TimestampParse(String),

    /// The date-range bounds are unusable (e.g. start after end).
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A worker job of the analysis pool panicked or was cancelled.
    #[error("Analysis task failed: {0}")]
    Task(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the chargelog crates.
pub type Result<T> = std::result::Result<T, ChargeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = ChargeError::FileRead {
            path: PathBuf::from("/exports/BMW-CarData-Ladehistorie.json"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("Ladehistorie.json"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_not_an_array() {
        let err = ChargeError::NotAnArray { found: "object" };
        assert_eq!(
            err.to_string(),
            "Cannot process document: expected a JSON array of sessions, found object"
        );
    }

    #[test]
    fn test_error_display_document_too_large() {
        let err = ChargeError::DocumentTooLarge {
            size: 6_000_000,
            limit: 5_242_880,
        };
        assert_eq!(
            err.to_string(),
            "Document is 6000000 bytes, larger than the 5242880 byte limit"
        );
    }

    #[test]
    fn test_error_display_invalid_date_range() {
        let err = ChargeError::InvalidDateRange("start after end".to_string());
        assert_eq!(err.to_string(), "Invalid date range: start after end");
    }

    #[test]
    fn test_error_display_config() {
        let err = ChargeError::Config("workers must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: workers must be at least 1"
        );
    }

    #[test]
    fn test_error_display_task() {
        let err = ChargeError::Task("soc_stats panicked".to_string());
        assert_eq!(err.to_string(), "Analysis task failed: soc_stats panicked");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ChargeError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("[{").unwrap_err();
        let err: ChargeError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
