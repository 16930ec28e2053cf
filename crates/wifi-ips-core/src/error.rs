//! Error types for the positioning core.
//!
//! - [`CoreError`]: top-level error for core operations
//! - [`StorageError`]: failures reported by a storage collaborator
//!
//! Offline and online crates wrap these in their own error enums via
//! [`From`], so the taxonomy stays in one place.

use thiserror::Error;

/// A specialized `Result` type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Top-level error type for the positioning core.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    /// An input record could not be interpreted.
    ///
    /// Raised per record; callers reject the record and continue with the
    /// rest of the batch.
    #[error("Malformed {field}: {reason}")]
    MalformedInput {
        /// Name of the offending field (e.g. `"bssid"`, `"timestamp"`).
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A storage collaborator failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A reference-frame operation was attempted without any reference data.
    #[error("Empty input: {0}")]
    EmptyInput(&'static str),
}

impl CoreError {
    /// Construct a [`CoreError::MalformedInput`].
    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            field,
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error only invalidates a single record.
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::MalformedInput { .. })
    }
}

/// Errors from a storage collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum StorageError {
    /// A batch write was rejected; nothing from the batch was applied.
    #[error("Batch for '{batch}' aborted: {message}")]
    BatchAborted {
        /// Identifier of the batch (usually the session name).
        batch: String,
        /// Underlying reason.
        message: String,
    },

    /// A single write failed.
    #[error("Write failed during {operation}: {message}")]
    WriteFailed {
        /// Operation being performed.
        operation: &'static str,
        /// Underlying reason.
        message: String,
    },

    /// A read failed.
    #[error("Read failed during {operation}: {message}")]
    ReadFailed {
        /// Operation being performed.
        operation: &'static str,
        /// Underlying reason.
        message: String,
    },

    /// The backing store is not reachable.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Construct a [`StorageError::BatchAborted`].
    pub fn batch_aborted(batch: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BatchAborted {
            batch: batch.into(),
            message: message.into(),
        }
    }

    /// Construct a [`StorageError::WriteFailed`].
    pub fn write_failed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            operation,
            message: message.into(),
        }
    }
}
