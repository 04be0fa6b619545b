//! Upload orchestration.
//!
//! This module provides the single entry point for uploading a local file
//! with any `StorageClient` implementation. It handles:
//!
//! - Choosing between one `put_object` request and a multipart session
//! - Creating, completing and aborting the multipart session
//! - Cancellation from the caller
//!
//! # Upload Strategy
//!
//! - Files up to `part_size` bytes (inclusive, empty files included) are
//!   sent in one request, followed by a bounded wait for the object to
//!   become readable. A failed wait is logged, never returned.
//! - Larger files are split by `plan_parts` and uploaded concurrently by
//!   `ConcurrentPartUploader`. If every part succeeds the ordered manifest
//!   is submitted; otherwise the session is aborted.
//!
//! # Example
//!
//! ```ignore
//! use s3_uploader_storage::{UploadOptions, UploadOrchestrator, UploadRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = UploadOrchestrator::new(client, UploadOptions::default())?;
//! let request = UploadRequest::new("my-bucket", "/data/big.bin", "backups/big.bin");
//! let outcome = orchestrator.upload(&CancellationToken::new(), &request).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio_util::sync::CancellationToken;

use crate::buffer_pool::BufferPool;
use crate::error::{StorageError, UploadError};
use crate::parts::ConcurrentPartUploader;
use crate::planner::{part_count, plan_parts, upload_strategy, UploadStrategy, MAX_PARTS};
use crate::traits::StorageClient;
use crate::types::{CompletedPart, PartDescriptor, UploadOutcome, UploadRequest, UploadSession};

/// Default part size (5 MiB, the smallest non-final part S3 accepts).
pub const DEFAULT_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Default number of parts in flight.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;

/// Bound on the read-after-write check after a single-request upload.
pub const VISIBILITY_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Options for upload operations.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Part size in bytes; also the single-request threshold.
    pub part_size: u64,
    /// Maximum parts in flight. 0 means no explicit bound: every part of a
    /// file is read into memory at once, so peak memory equals the file size.
    pub concurrency_limit: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
        }
    }
}

impl UploadOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the part size in bytes.
    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size;
        self
    }

    /// Set maximum parts in flight (0 = unbounded, whole file in memory).
    pub fn with_concurrency_limit(mut self, concurrency_limit: usize) -> Self {
        self.concurrency_limit = concurrency_limit;
        self
    }

    /// Free part buffers kept between uploads.
    pub fn idle_buffers(&self) -> usize {
        if self.concurrency_limit == 0 {
            DEFAULT_CONCURRENCY_LIMIT
        } else {
            self.concurrency_limit
        }
    }

    /// Reject options the orchestrator cannot run with.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.part_size == 0 {
            return Err(UploadError::InvalidOptions {
                message: "part size must be greater than zero".to_string(),
            });
        }
        if usize::try_from(self.part_size).is_err() {
            return Err(UploadError::InvalidOptions {
                message: format!("part size {} does not fit in memory", self.part_size),
            });
        }
        Ok(())
    }
}

/// Uploads local files to S3 through a `StorageClient`.
///
/// Buffers are pooled per orchestrator and reused across uploads. The pool
/// keeps at most `UploadOptions::idle_buffers` of them once parts finish.
pub struct UploadOrchestrator<C: StorageClient> {
    /// The storage client for S3 operations.
    client: Arc<C>,
    /// Upload options.
    options: UploadOptions,
    /// Part buffers, one part long each.
    pool: Arc<BufferPool>,
}

impl<C: StorageClient + 'static> UploadOrchestrator<C> {
    /// Create a new upload orchestrator.
    ///
    /// # Arguments
    /// * `client` - Storage client for S3 operations
    /// * `options` - Part size and concurrency limit
    pub fn new(client: Arc<C>, options: UploadOptions) -> Result<Self, UploadError> {
        options.validate()?;
        let pool: Arc<BufferPool> =
            BufferPool::with_max_idle(options.part_size as usize, options.idle_buffers());
        Ok(Self {
            client,
            options,
            pool,
        })
    }

    /// The upload options in use.
    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// The part buffer pool.
    pub fn buffer_pool(&self) -> &BufferPool {
        &self.pool
    }

    /// The storage client.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Upload one file.
    ///
    /// # Arguments
    /// * `cancel` - Cancelling stops the upload; an open multipart session is aborted
    /// * `request` - Bucket, local path and key
    ///
    /// # Returns
    /// A summary of what was uploaded, or the error of the stage that failed.
    pub async fn upload(
        &self,
        cancel: &CancellationToken,
        request: &UploadRequest,
    ) -> Result<UploadOutcome, UploadError> {
        let metadata: std::fs::Metadata = tokio::fs::metadata(&request.source_path)
            .await
            .map_err(|source| UploadError::Stat {
                path: request.source_path.clone(),
                source,
            })?;
        let size: u64 = metadata.len();

        match upload_strategy(size, self.options.part_size) {
            UploadStrategy::SingleObject => {
                log::info!(
                    "Uploading {} ({} bytes) to s3://{}/{} in one request",
                    request.source_path.display(),
                    size,
                    request.bucket,
                    request.key
                );
                self.upload_single(cancel, request, size).await
            }
            UploadStrategy::Multipart => {
                let parts: u64 = part_count(size, self.options.part_size);
                if parts > MAX_PARTS {
                    return Err(UploadError::TooManyParts {
                        path: request.source_path.clone(),
                        parts,
                        max: MAX_PARTS,
                    });
                }
                log::info!(
                    "Uploading {} ({} bytes) to s3://{}/{} in {}-byte parts",
                    request.source_path.display(),
                    size,
                    request.bucket,
                    request.key,
                    self.options.part_size
                );
                self.upload_multipart(cancel, request, size).await
            }
        }
    }

    /// Send the whole file with one `put_object` request.
    async fn upload_single(
        &self,
        cancel: &CancellationToken,
        request: &UploadRequest,
        size: u64,
    ) -> Result<UploadOutcome, UploadError> {
        let file: File = File::open(&request.source_path)
            .await
            .map_err(|source| UploadError::Open {
                path: request.source_path.clone(),
                source,
            })?;

        let etag: String = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            result = self.client.put_object_from_file(&request.bucket, &request.key, file, size) => {
                result.map_err(|source| {
                    log::error!("Couldn't upload {}: {}", request.source_path.display(), source);
                    UploadError::PutObject {
                        bucket: request.bucket.clone(),
                        key: request.key.clone(),
                        source,
                    }
                })?
            }
        };

        // Advisory only: the write was acknowledged, so the upload succeeded.
        let visible: Result<(), StorageError> = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StorageError::Cancelled),
            result = self.client.wait_until_exists(&request.bucket, &request.key, VISIBILITY_WAIT_TIMEOUT) => result,
        };
        if let Err(err) = visible {
            log::warn!(
                "Failed attempt to wait for s3://{}/{} to exist: {}",
                request.bucket,
                request.key,
                err
            );
        }

        Ok(UploadOutcome {
            strategy: UploadStrategy::SingleObject,
            bytes: size,
            parts: 1,
            etag: Some(etag),
            upload_id: None,
        })
    }

    /// Upload through a multipart session, completing or aborting it.
    async fn upload_multipart(
        &self,
        cancel: &CancellationToken,
        request: &UploadRequest,
        size: u64,
    ) -> Result<UploadOutcome, UploadError> {
        let file: std::fs::File = File::open(&request.source_path)
            .await
            .map_err(|source| UploadError::Open {
                path: request.source_path.clone(),
                source,
            })?
            .into_std()
            .await;

        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        // Not raced against the token: once sent, the session may exist on
        // the backend and needs its upload id to be aborted.
        let upload_id: String = self
            .client
            .create_multipart_upload(&request.bucket, &request.key)
            .await
            .map_err(|source| UploadError::CreateSession {
                bucket: request.bucket.clone(),
                key: request.key.clone(),
                source,
            })?;
        let mut session = UploadSession::new(upload_id, &request.bucket, &request.key);
        log::debug!("Created multipart upload {}", session.upload_id());

        if cancel.is_cancelled() {
            return Err(self.abort(&mut session, UploadError::Cancelled).await);
        }

        let parts: Vec<PartDescriptor> = plan_parts(size, self.options.part_size);
        let uploaded: Result<Vec<CompletedPart>, UploadError> = self
            .upload_parts(cancel, &mut session, file, request, &parts)
            .await;

        match uploaded {
            Ok(completed) => self.complete(&mut session, completed, size).await,
            Err(err) => Err(self.abort(&mut session, err).await),
        }
    }

    async fn upload_parts(
        &self,
        cancel: &CancellationToken,
        session: &mut UploadSession,
        file: std::fs::File,
        request: &UploadRequest,
        parts: &[PartDescriptor],
    ) -> Result<Vec<CompletedPart>, UploadError> {
        session.begin_parts()?;

        let uploader = ConcurrentPartUploader::new(
            Arc::clone(&self.client),
            Arc::clone(&self.pool),
            self.options.concurrency_limit,
        );
        let completed: Vec<CompletedPart> = uploader
            .upload_parts(cancel, session, Arc::new(file), &request.source_path, parts)
            .await?;

        // Parts all landed but the caller gave up before completion.
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        Ok(completed)
    }

    /// Submit the ordered manifest.
    ///
    /// A failed completion is returned as-is without an abort: the backend
    /// may have merged the object even if the response was lost.
    async fn complete(
        &self,
        session: &mut UploadSession,
        parts: Vec<CompletedPart>,
        size: u64,
    ) -> Result<UploadOutcome, UploadError> {
        self.client
            .complete_multipart_upload(session.bucket(), session.key(), session.upload_id(), &parts)
            .await
            .map_err(|source| UploadError::Complete {
                upload_id: session.upload_id().to_string(),
                source,
            })?;

        let part_count: u32 = parts.len() as u32;
        session.complete(parts)?;
        log::info!(
            "Completed multipart upload {} ({} parts)",
            session.upload_id(),
            part_count
        );

        Ok(UploadOutcome {
            strategy: UploadStrategy::Multipart,
            bytes: size,
            parts: part_count,
            etag: None,
            upload_id: Some(session.upload_id().to_string()),
        })
    }

    /// Abort after `cause` and pick the error to report.
    ///
    /// Not raced against the caller's token: a cancelled upload still has
    /// to release the session.
    async fn abort(&self, session: &mut UploadSession, cause: UploadError) -> UploadError {
        if cause.is_cancelled() {
            log::warn!("Multipart upload {} cancelled, aborting", session.upload_id());
        } else {
            log::warn!("Multipart upload {} failed: {}, aborting", session.upload_id(), cause);
        }

        let upload_id: String = session.upload_id().to_string();
        if let Err(source) = self
            .client
            .abort_multipart_upload(session.bucket(), session.key(), &upload_id)
            .await
        {
            log::error!("Failed to abort multipart upload {}: {}", upload_id, source);
            return UploadError::AbortFailed {
                upload_id,
                source,
                original: Box::new(cause),
            };
        }

        if let Err(err) = session.abort() {
            return err;
        }
        UploadError::Aborted {
            upload_id,
            source: Box::new(cause),
        }
    }
}
