//! Storage traits/interfaces for S3 operations.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::fs::File;

use crate::error::StorageError;
use crate::types::CompletedPart;

/// Interval between `head_object` polls in the default visibility wait.
pub const VISIBILITY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Information about an S3 object from list/head operations.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// S3 object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modified timestamp (Unix epoch seconds).
    pub last_modified: Option<i64>,
    /// ETag (usually MD5 hash for non-multipart uploads).
    pub etag: Option<String>,
}

/// Low-level S3 operations - implemented by each backend.
///
/// The upload core only talks to this trait, so it can run against the
/// AWS SDK backend or an in-memory double.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Check if an object exists and return its size.
    /// Returns None if object doesn't exist.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<u64>, StorageError>;

    /// Upload an open file as a single object.
    ///
    /// # Arguments
    /// * `file` - Handle positioned at the start of the content
    /// * `length` - Number of bytes to send
    ///
    /// # Returns
    /// The ETag of the stored object.
    async fn put_object_from_file(
        &self,
        bucket: &str,
        key: &str,
        file: File,
        length: u64,
    ) -> Result<String, StorageError>;

    /// Start a multipart upload session and return its upload id.
    async fn create_multipart_upload(&self, bucket: &str, key: &str)
        -> Result<String, StorageError>;

    /// Upload one part of a multipart session.
    ///
    /// # Returns
    /// The ETag the backend assigned to the part.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: &[u8],
    ) -> Result<String, StorageError>;

    /// Merge uploaded parts into the final object. `parts` is ordered 1..N.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError>;

    /// Discard a multipart session and every part uploaded to it.
    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), StorageError>;

    /// Create a bucket.
    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    /// Delete an empty bucket.
    async fn delete_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    /// List objects with prefix.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectInfo>, StorageError>;

    /// Delete a single object.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError>;

    /// Wait until an object is visible to reads.
    ///
    /// Default implementation polls `head_object` until the object shows up,
    /// a lookup fails, or `timeout` elapses.
    async fn wait_until_exists(
        &self,
        bucket: &str,
        key: &str,
        timeout: Duration,
    ) -> Result<(), StorageError> {
        let started: Instant = Instant::now();
        loop {
            if self.head_object(bucket, key).await?.is_some() {
                return Ok(());
            }

            let waited: Duration = started.elapsed();
            if waited >= timeout {
                return Err(StorageError::VisibilityTimeout {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    waited,
                });
            }
            tokio::time::sleep(VISIBILITY_POLL_INTERVAL.min(timeout - waited)).await;
        }
    }
}
