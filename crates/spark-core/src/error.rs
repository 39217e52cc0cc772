//! Error types for Spark

use thiserror::Error;

use crate::payload::PayloadError;
use crate::types::InterestError;

/// Main error type for storage and plumbing operations
#[derive(Error, Debug)]
pub enum SparkError {
    /// Error during storage operations (redb)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A profile store operation was rejected
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Expected, user-facing outcomes of profile store operations.
///
/// None of these indicate a bug; the UI is expected to show them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Another profile already uses this username (case-sensitive)
    #[error("Username already taken: {0}")]
    DuplicateUsername(String),

    /// Username/password pair did not match any profile
    #[error("Authentication failed for user: {0}")]
    AuthFailed(String),

    /// Username is empty after trimming
    #[error("Username must not be empty")]
    InvalidUsername,

    /// The operation needs a logged-in user
    #[error("No user is logged in")]
    NoCurrentUser,

    /// An interest edit was rejected
    #[error(transparent)]
    Interest(#[from] InterestError),
}

/// Terminal reasons a tag session ended without completing.
///
/// Every failure is final for its session; the transport has already been
/// released by the time one of these reaches the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    /// The device has no usable tag radio
    #[error("Tag reading is not available on this device")]
    UnsupportedHardware,

    /// Discovery finished without any tag
    #[error("Failed to detect any tags")]
    NoTag,

    /// The radio reported an error while polling for tags
    #[error("Tag discovery failed: {0}")]
    DiscoveryError(String),

    /// Connecting to the detected tag failed
    #[error("Unable to connect to tag: {0}")]
    ConnectError(String),

    /// Asking the tag for its capability failed
    #[error("Unable to query the status of tag: {0}")]
    CapabilityQueryError(String),

    /// The tag does not speak the message format
    #[error("Tag is not compatible")]
    Incompatible,

    /// A write was requested but the tag is read-only
    #[error("Tag is read only")]
    ReadOnlyTag,

    /// Writing the message failed
    #[error("Write message failed: {0}")]
    WriteError(String),

    /// Reading the message failed
    #[error("Read message failed: {0}")]
    ReadError(String),

    /// The tag held a message that is not a valid payload
    #[error("Could not decode tag payload: {0}")]
    DecodeError(#[from] PayloadError),

    /// The tag held no message
    #[error("No message found on tag")]
    NoMessage,

    /// Discovery did not find a tag in time
    #[error("Session timed out")]
    Timeout,

    /// The user dismissed the session
    #[error("Session cancelled by user")]
    UserCancelled,

    /// The caller invalidated the session
    #[error("Session invalidated")]
    Cancelled,
}

impl SessionFailure {
    /// Whether this outcome is a normal way for a session to end.
    ///
    /// User and caller cancellations are logged but not surfaced as errors.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::UserCancelled | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SparkError::Storage("disk full".to_string());
        assert_eq!(format!("{}", err), "Storage error: disk full");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let spark_err: SparkError = io_err.into();
        assert!(matches!(spark_err, SparkError::Io(_)));
    }

    #[test]
    fn test_store_error_is_transparent() {
        let err: SparkError = StoreError::DuplicateUsername("alice".to_string()).into();
        assert_eq!(err.to_string(), "Username already taken: alice");
    }

    #[test]
    fn test_cancellation_classification() {
        assert!(SessionFailure::UserCancelled.is_cancellation());
        assert!(SessionFailure::Cancelled.is_cancellation());
        assert!(!SessionFailure::Timeout.is_cancellation());
        assert!(!SessionFailure::ReadOnlyTag.is_cancellation());
    }
}
