//! Upload of local files to S3-compatible object storage.
//!
//! Files up to the configured part size go up in a single request. Larger
//! files are uploaded as a multipart session whose parts are read with
//! positional reads into pooled buffers and sent concurrently under a fixed
//! concurrency limit. A session is either completed with the ordered part
//! manifest or aborted; never both.
//!
//! The crate has no dependency on a vendor SDK. Backends implement
//! [`StorageClient`]; the AWS SDK backend lives in `s3-uploader-storage-sdk`.

mod buffer_pool;
pub mod cleanup;
mod error;
mod parts;
mod planner;
mod traits;
mod types;
mod upload;

pub use buffer_pool::{BufferPool, PooledBuffer};
pub use cleanup::{cleanup_bucket, teardown_bucket};
pub use error::{StorageError, UploadError};
pub use parts::ConcurrentPartUploader;
pub use planner::{part_count, plan_parts, upload_strategy, UploadStrategy, MAX_PARTS};
pub use traits::{ObjectInfo, StorageClient, VISIBILITY_POLL_INTERVAL};
pub use types::{
    AwsCredentials, CompletedPart, PartDescriptor, RetrySettings, SessionState, StorageSettings,
    UploadOutcome, UploadRequest, UploadSession, DEFAULT_REGION,
};
pub use upload::{
    UploadOptions, UploadOrchestrator, DEFAULT_CONCURRENCY_LIMIT, DEFAULT_PART_SIZE,
    VISIBILITY_WAIT_TIMEOUT,
};
