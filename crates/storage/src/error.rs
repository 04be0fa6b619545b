//! Error types for storage and upload operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::SessionState;

/// Errors returned by a `StorageClient` backend.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// Object, bucket or multipart upload not found.
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Access denied (bad credentials or missing permissions).
    #[error("Access denied to s3://{bucket}/{key}: {message}")]
    AccessDenied {
        bucket: String,
        key: String,
        message: String,
    },

    /// Network or service error.
    #[error("Network error: {message}")]
    NetworkError { message: String, retryable: bool },

    /// Local I/O error.
    #[error("I/O error for {path}: {message}")]
    IoError { path: String, message: String },

    /// Operation cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Object did not become visible within the wait bound.
    #[error("s3://{bucket}/{key} not visible after {waited:?}")]
    VisibilityTimeout {
        bucket: String,
        key: String,
        waited: Duration,
    },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl StorageError {
    /// Check if this error is retryable.
    ///
    /// The upload core never retries; this is for callers that wrap it.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::NetworkError { retryable, .. } => *retryable,
            StorageError::VisibilityTimeout { .. } => true,
            StorageError::NotFound { .. }
            | StorageError::AccessDenied { .. }
            | StorageError::IoError { .. }
            | StorageError::Cancelled
            | StorageError::InvalidConfig { .. }
            | StorageError::Other { .. } => false,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError {
            path: String::new(),
            message: err.to_string(),
        }
    }
}

/// Errors returned by `UploadOrchestrator::upload`.
///
/// Every variant names the stage that failed so the caller can tell a local
/// read problem from a backend failure or a dangling multipart session.
#[derive(Error, Debug)]
pub enum UploadError {
    /// Upload options rejected before any work started.
    #[error("Invalid upload options: {message}")]
    InvalidOptions { message: String },

    /// Source file metadata could not be read.
    #[error("failed to stat {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source file could not be opened.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Single-request upload failed.
    #[error("put object s3://{bucket}/{key}: {source}")]
    PutObject {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },

    /// Multipart session could not be created.
    #[error("create multipart upload s3://{bucket}/{key}: {source}")]
    CreateSession {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },

    /// File needs more parts than a multipart upload allows.
    #[error("{} needs {parts} parts, more than the limit of {max}; use a larger part size", path.display())]
    TooManyParts { path: PathBuf, parts: u64, max: u64 },

    /// Positional read for a part failed.
    #[error("part {part_number}: read {}: {source}", path.display())]
    PartRead {
        part_number: u32,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backend rejected a part.
    #[error("upload part #{part_number}: {source}")]
    PartUpload {
        part_number: u32,
        #[source]
        source: StorageError,
    },

    /// A part task ended without reporting (panic or runtime shutdown).
    #[error("part task failed: {message}")]
    PartTask { message: String },

    /// Completion call failed. The session is left open on the backend.
    #[error("complete multipart upload {upload_id}: {source}")]
    Complete {
        upload_id: String,
        #[source]
        source: StorageError,
    },

    /// The session was aborted after `source` failed.
    #[error("multipart upload {upload_id} aborted: {source}")]
    Aborted {
        upload_id: String,
        #[source]
        source: Box<UploadError>,
    },

    /// Abort itself failed, leaving parts on the backend. `original` is the
    /// failure that triggered the abort.
    #[error("abort multipart upload {upload_id}: {source}")]
    AbortFailed {
        upload_id: String,
        #[source]
        source: StorageError,
        original: Box<UploadError>,
    },

    /// Cancelled by the caller or by a failing sibling part.
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation attempted on a session in the wrong state.
    #[error("multipart upload {upload_id} is {state:?}, cannot {operation}")]
    InvalidSessionState {
        upload_id: String,
        state: SessionState,
        operation: &'static str,
    },
}

impl UploadError {
    /// True for cancellation, which is reported only when no real failure was seen.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::Cancelled)
    }

    /// Part number of the failing part, looking through abort wrappers.
    pub fn part_number(&self) -> Option<u32> {
        match self {
            UploadError::PartRead { part_number, .. }
            | UploadError::PartUpload { part_number, .. } => Some(*part_number),
            UploadError::Aborted { source, .. } => source.part_number(),
            UploadError::AbortFailed { original, .. } => original.part_number(),
            _ => None,
        }
    }
}
