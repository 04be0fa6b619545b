//! Bucket cleanup helpers.
//!
//! Used around uploads (tests, `--create-bucket` runs) rather than by the
//! upload path itself.

use crate::error::StorageError;
use crate::traits::{ObjectInfo, StorageClient};

/// Delete every object in a bucket.
///
/// # Arguments
/// * `client` - Storage client
/// * `bucket` - Bucket to empty
///
/// # Returns
/// Number of objects deleted. Stops at the first failed delete.
pub async fn cleanup_bucket<C: StorageClient + ?Sized>(
    client: &C,
    bucket: &str,
) -> Result<usize, StorageError> {
    let objects: Vec<ObjectInfo> = client.list_objects(bucket, "").await?;

    for object in &objects {
        if let Err(err) = client.delete_object(bucket, &object.key).await {
            log::error!("Failed to delete object {}: {}", object.key, err);
            return Err(err);
        }
    }

    log::debug!("Deleted {} objects from {}", objects.len(), bucket);
    Ok(objects.len())
}

/// Empty a bucket and then delete it.
pub async fn teardown_bucket<C: StorageClient + ?Sized>(
    client: &C,
    bucket: &str,
) -> Result<(), StorageError> {
    cleanup_bucket(client, bucket).await?;
    client.delete_bucket(bucket).await
}
