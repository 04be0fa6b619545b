//! Error types for SDK storage operations.

use std::error::Error as StdError;
use std::fmt::Debug;

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use s3_uploader_storage::StorageError;
use thiserror::Error;

/// Errors raised by the SDK client itself rather than by S3.
#[derive(Error, Debug)]
pub enum SdkClientError {
    /// Settings the client cannot be built from.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Request body could not be built from the source file.
    #[error("Request body error: {0}")]
    BodyError(String),

    /// S3 answered without a field the operation depends on.
    #[error("Missing {field} in {operation} response")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },
}

impl From<SdkClientError> for StorageError {
    fn from(err: SdkClientError) -> Self {
        match err {
            SdkClientError::ConfigError(message) => StorageError::InvalidConfig { message },
            SdkClientError::BodyError(message) => StorageError::IoError {
                path: String::new(),
                message,
            },
            err @ SdkClientError::MissingField { .. } => StorageError::Other {
                message: err.to_string(),
            },
        }
    }
}

/// Broad class of an S3 error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorClass {
    NotFound,
    AccessDenied,
    Throttled,
    Other,
}

/// Classify an S3 error code.
pub(crate) fn classify_code(code: Option<&str>) -> ErrorClass {
    match code {
        Some("NoSuchKey" | "NoSuchBucket" | "NoSuchUpload" | "NotFound") => ErrorClass::NotFound,
        Some(
            "AccessDenied" | "Forbidden" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"
            | "ExpiredToken" | "InvalidToken",
        ) => ErrorClass::AccessDenied,
        Some(
            "SlowDown" | "Throttling" | "RequestTimeout" | "InternalError" | "ServiceUnavailable",
        ) => ErrorClass::Throttled,
        _ => ErrorClass::Other,
    }
}

/// Map an SDK error to a `StorageError`.
///
/// # Arguments
/// * `err` - Error returned by an operation's `send()`
/// * `bucket` - Bucket the request targeted
/// * `key` - Object key the request targeted (empty for bucket operations)
pub(crate) fn from_sdk_error<E, R>(err: SdkError<E, R>, bucket: &str, key: &str) -> StorageError
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: Debug,
{
    let message: String = DisplayErrorContext(&err).to_string();

    if matches!(err, SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)) {
        return StorageError::NetworkError {
            message,
            retryable: true,
        };
    }

    match classify_code(err.code()) {
        ErrorClass::NotFound => StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        ErrorClass::AccessDenied => StorageError::AccessDenied {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        },
        ErrorClass::Throttled => StorageError::NetworkError {
            message,
            retryable: true,
        },
        ErrorClass::Other => StorageError::NetworkError {
            message,
            retryable: false,
        },
    }
}
