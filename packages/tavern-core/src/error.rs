//! # Error Handling
//!
//! Error types shared by every Tavern core operation.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Access Errors (100-199)                                           │
//! │  │   ├── Unauthenticated       - No or invalid credential              │
//! │  │   └── Forbidden             - Not a participant of the resource     │
//! │  │                                                                      │
//! │  ├── Lookup Errors (200-299)                                           │
//! │  │   └── NotFound              - Match or user does not exist          │
//! │  │                                                                      │
//! │  ├── Match Errors (300-399)                                            │
//! │  │   ├── DuplicateMatch        - Pair already connected                │
//! │  │   └── InvalidTarget         - Self-match or unknown target          │
//! │  │                                                                      │
//! │  ├── Validation Errors (400-499)                                       │
//! │  │   └── ValidationError       - Empty content, bad kind or status     │
//! │  │                                                                      │
//! │  ├── Storage Errors (500-599)                                          │
//! │  │   └── StorageError          - Transient backend failure             │
//! │  │                                                                      │
//! │  └── Internal Errors (900-999)                                         │
//! │      └── Internal              - Should not happen                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ERROR HANDLING FLOW                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Core (Rust)                 Server boundary            Client         │
//! │  ──────────────────────────────────────────────────────────────────     │
//! │                                                                         │
//! │  Result<T, Error>  ──────►  HTTP status + body  ──────►  message       │
//! │                              { ok, error, code }                        │
//! │                                                                         │
//! │  Storage details are logged here and never rendered; clients only      │
//! │  learn that the operation may be retried.                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for Tavern core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Tavern core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Access Errors (100-199)
    // ========================================================================

    /// No credential, or a credential that does not resolve to a user
    #[error("Authentication required.")]
    Unauthenticated,

    /// Authenticated, but not allowed to touch this resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // ========================================================================
    // Lookup Errors (200-299)
    // ========================================================================

    /// Referenced match or user does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    // ========================================================================
    // Match Errors (300-399)
    // ========================================================================

    /// A match already connects this pair of users, in either order
    #[error("A match already exists between these users.")]
    DuplicateMatch,

    /// Target is the requester or does not exist
    #[error("Invalid match target: {0}")]
    InvalidTarget(String),

    // ========================================================================
    // Validation Errors (400-499)
    // ========================================================================

    /// Input rejected before reaching storage
    #[error("Validation failed: {0}")]
    ValidationError(String),

    // ========================================================================
    // Storage Errors (500-599)
    // ========================================================================

    /// Backend failure. The payload is for logs only.
    #[error("Storage is temporarily unavailable. Please retry.")]
    StorageError(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Numeric error code, grouped by category:
    /// - 100-199: Access
    /// - 200-299: Lookup
    /// - 300-399: Match
    /// - 400-499: Validation
    /// - 500-599: Storage
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            Error::Unauthenticated => 100,
            Error::Forbidden(_) => 101,

            Error::NotFound(_) => 200,

            Error::DuplicateMatch => 300,
            Error::InvalidTarget(_) => 301,

            Error::ValidationError(_) => 400,

            Error::StorageError(_) => 500,

            Error::Internal(_) => 900,
        }
    }

    /// Whether the client may safely retry the same request.
    ///
    /// Only storage failures qualify; everything else is a definitive answer.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::StorageError(_))
    }

    /// Short machine-readable kind, used in logs and response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthenticated => "unauthenticated",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::DuplicateMatch => "duplicate_match",
            Error::InvalidTarget(_) => "invalid_target",
            Error::ValidationError(_) => "validation_error",
            Error::StorageError(_) => "storage_error",
            Error::Internal(_) => "internal",
        }
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        tracing::error!(error = %err, "SQLite operation failed");
        Error::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("serialization: {}", err))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::Unauthenticated.code(), 100);
        assert_eq!(Error::Forbidden("x".into()).code(), 101);
        assert_eq!(Error::NotFound("match".into()).code(), 200);
        assert_eq!(Error::DuplicateMatch.code(), 300);
        assert_eq!(Error::InvalidTarget("self".into()).code(), 301);
        assert_eq!(Error::ValidationError("empty".into()).code(), 400);
        assert_eq!(Error::StorageError("disk".into()).code(), 500);
        assert_eq!(Error::Internal("test".into()).code(), 900);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::StorageError("locked".into()).is_recoverable());
        assert!(!Error::DuplicateMatch.is_recoverable());
        assert!(!Error::Forbidden("x".into()).is_recoverable());
    }

    #[test]
    fn test_storage_error_hides_backend_detail() {
        let err = Error::StorageError("database is locked at /var/tavern.db".into());
        let rendered = err.to_string();
        assert!(!rendered.contains("/var/tavern.db"));
        assert!(rendered.contains("retry"));
    }

    #[test]
    fn test_rusqlite_conversion() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.kind(), "storage_error");
    }
}
