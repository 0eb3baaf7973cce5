//! Error types module
//!
//! This module provides the core error taxonomy used throughout Cumulus.
//! All errors are unified under the `AppError` enum, which can represent
//! database, storage, validation, and domain-specific rejections.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx`
//! feature so that consumers who only need the taxonomy can build without a
//! database driver.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected rejections like duplicate names
    Debug,
    /// Warning level - for capacity and quota rejections
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented.
///
/// Every rejected operation carries a stable machine-readable code plus a
/// human-readable reason (the `Display` impl); callers map these onto their
/// transport of choice.
pub trait ErrorMetadata {
    /// HTTP status code an edge layer would return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "QUOTA_EXCEEDED")
    fn error_code(&self) -> &'static str;

    /// Whether the operation can be retried as-is (after resending chunks,
    /// waiting out transient storage trouble, and so on)
    fn is_retryable(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Upload incomplete: chunk {missing_index} was never received")]
    IncompleteUpload { missing_index: u32 },

    #[error("Storage quota exceeded: {used} bytes used of {cap} cap, {requested} more requested")]
    QuotaExceeded { used: i64, cap: i64, requested: i64 },

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("Insufficient role: {0}")]
    InsufficientRole(String),

    #[error("Cyclic move rejected: {0}")]
    CyclicMove(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already pending: {0}")]
    AlreadyPending(String),

    #[error("Already shared: {0}")]
    AlreadyShared(String),

    #[error("Not owner: {0}")]
    NotOwner(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata per variant: (http_status, error_code, retryable, log_level).
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, LogLevel) {
    match err {
        AppError::Database(_) => (500, "DATABASE_ERROR", true, LogLevel::Error),
        AppError::IncompleteUpload { .. } => (409, "INCOMPLETE_UPLOAD", true, LogLevel::Debug),
        AppError::QuotaExceeded { .. } => (507, "QUOTA_EXCEEDED", false, LogLevel::Warn),
        AppError::CapacityExceeded(_) => (507, "CAPACITY_EXCEEDED", false, LogLevel::Warn),
        AppError::DuplicateName(_) => (409, "DUPLICATE_NAME", false, LogLevel::Debug),
        AppError::InsufficientRole(_) => (403, "INSUFFICIENT_ROLE", false, LogLevel::Debug),
        AppError::CyclicMove(_) => (409, "CYCLIC_MOVE", false, LogLevel::Debug),
        AppError::NotFound(_) => (404, "NOT_FOUND", false, LogLevel::Debug),
        AppError::AlreadyPending(_) => (409, "ALREADY_PENDING", false, LogLevel::Debug),
        AppError::AlreadyShared(_) => (409, "ALREADY_SHARED", false, LogLevel::Debug),
        AppError::NotOwner(_) => (403, "NOT_OWNER", false, LogLevel::Debug),
        AppError::Storage(_) => (500, "STORAGE_ERROR", true, LogLevel::Error),
        AppError::InvalidInput(_) => (400, "INVALID_INPUT", false, LogLevel::Debug),
        AppError::Internal(_) => (500, "INTERNAL_ERROR", true, LogLevel::Error),
        AppError::InternalWithSource { .. } => (500, "INTERNAL_ERROR", true, LogLevel::Error),
    }
}

impl AppError {
    /// Get detailed error information including the source chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_retryable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_retryable());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_quota_exceeded() {
        let err = AppError::QuotaExceeded {
            used: 90,
            cap: 100,
            requested: 20,
        };
        assert_eq!(err.http_status_code(), 507);
        assert_eq!(err.error_code(), "QUOTA_EXCEEDED");
        assert!(!err.is_retryable());
        assert_eq!(err.log_level(), LogLevel::Warn);
        assert!(err.to_string().contains("90"));
        assert!(err.to_string().contains("20"));
    }

    #[test]
    fn test_error_metadata_incomplete_upload_is_retryable() {
        let err = AppError::IncompleteUpload { missing_index: 3 };
        assert_eq!(err.error_code(), "INCOMPLETE_UPLOAD");
        assert!(err.is_retryable());
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_error_metadata_validation_rejections() {
        let cyclic = AppError::CyclicMove("album 4 is a descendant of album 2".into());
        assert_eq!(cyclic.error_code(), "CYCLIC_MOVE");
        assert_eq!(cyclic.http_status_code(), 409);

        let role = AppError::InsufficientRole("collaborators cannot change roles".into());
        assert_eq!(role.error_code(), "INSUFFICIENT_ROLE");
        assert_eq!(role.http_status_code(), 403);

        let dup = AppError::DuplicateName("photo.jpg".into());
        assert_eq!(dup.error_code(), "DUPLICATE_NAME");
        assert!(!dup.is_retryable());
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let source = anyhow::anyhow!("disk unplugged");
        let err = AppError::InternalWithSource {
            message: "cleanup failed".into(),
            source,
        };
        let details = err.detailed_message();
        assert!(details.contains("Caused by: disk unplugged"));
    }
}
