//! Concurrent part uploads for a multipart session.
//!
//! Every part runs as its own tokio task. A semaphore bounds how many
//! tasks are reading or talking to the backend at once, and a shared
//! cancellation token stops the siblings as soon as one part fails.
//!
//! ```text
//! part task:  permit -> buffer -> read_at(offset) -> upload_part -> slot[n-1]
//!                 \________ cancelled? stop, release buffer ________/
//! ```
//!
//! Completed parts land in a pre-sized slot vector indexed by part number,
//! so the manifest comes out ordered without sorting or locking.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::buffer_pool::{BufferPool, PooledBuffer};
use crate::error::UploadError;
use crate::traits::StorageClient;
use crate::types::{CompletedPart, PartDescriptor, UploadSession};

/// Uploads the parts of one multipart session in parallel.
pub struct ConcurrentPartUploader<C: StorageClient> {
    client: Arc<C>,
    pool: Arc<BufferPool>,
    concurrency_limit: usize,
}

impl<C: StorageClient + 'static> ConcurrentPartUploader<C> {
    /// Create an uploader.
    ///
    /// # Arguments
    /// * `client` - Backend used for `upload_part`
    /// * `pool` - Buffer pool sized to the part size
    /// * `concurrency_limit` - Max parts in flight; 0 means unbounded
    pub fn new(client: Arc<C>, pool: Arc<BufferPool>, concurrency_limit: usize) -> Self {
        Self {
            client,
            pool,
            concurrency_limit,
        }
    }

    /// Upload every part and return the ordered manifest.
    ///
    /// Waits for all part tasks to settle before returning. On failure the
    /// first real error is returned; cancellation is only reported when
    /// nothing else went wrong.
    ///
    /// # Arguments
    /// * `cancel` - Caller's token; cancelling it stops outstanding parts
    /// * `session` - Session the parts belong to (must be in progress)
    /// * `file` - Source file, read with positional reads only
    /// * `source_path` - Path of `file`, for error context
    /// * `parts` - Descriptors from `plan_parts`
    pub async fn upload_parts(
        &self,
        cancel: &CancellationToken,
        session: &UploadSession,
        file: Arc<File>,
        source_path: &Path,
        parts: &[PartDescriptor],
    ) -> Result<Vec<CompletedPart>, UploadError> {
        let permits: usize = effective_concurrency(self.concurrency_limit, parts.len());
        let token: CancellationToken = cancel.child_token();
        let slots: Arc<Vec<OnceLock<CompletedPart>>> =
            Arc::new((0..parts.len()).map(|_| OnceLock::new()).collect());

        let shared = Arc::new(PartContext {
            client: Arc::clone(&self.client),
            pool: Arc::clone(&self.pool),
            semaphore: Semaphore::new(permits),
            token: token.clone(),
            slots: Arc::clone(&slots),
            file,
            path: source_path.to_path_buf(),
            bucket: session.bucket().to_string(),
            key: session.key().to_string(),
            upload_id: session.upload_id().to_string(),
        });

        log::debug!(
            "Uploading {} parts for {} with {} permits",
            parts.len(),
            session.upload_id(),
            permits
        );

        let mut tasks: JoinSet<Result<(), UploadError>> = JoinSet::new();
        for descriptor in parts.iter().copied() {
            let ctx: Arc<PartContext<C>> = Arc::clone(&shared);
            tasks.spawn(async move {
                let result: Result<(), UploadError> = ctx.upload_one(descriptor).await;
                if result.is_err() {
                    ctx.token.cancel();
                }
                result
            });
        }

        let mut failure: Option<UploadError> = None;
        while let Some(joined) = tasks.join_next().await {
            let result: Result<(), UploadError> = joined.unwrap_or_else(|err| {
                Err(UploadError::PartTask {
                    message: err.to_string(),
                })
            });
            if let Err(err) = result {
                token.cancel();
                failure = match failure {
                    Some(existing) if existing.is_cancelled() && !err.is_cancelled() => Some(err),
                    Some(existing) => Some(existing),
                    None => Some(err),
                };
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        slots
            .iter()
            .map(|slot| slot.get().cloned())
            .collect::<Option<Vec<CompletedPart>>>()
            .ok_or_else(|| UploadError::PartTask {
                message: "part finished without recording a result".to_string(),
            })
    }
}

/// Permits to hand out. 0 means one per part.
fn effective_concurrency(limit: usize, part_count: usize) -> usize {
    let limit: usize = if limit == 0 { part_count } else { limit };
    limit.clamp(1, Semaphore::MAX_PERMITS)
}

/// State shared by all part tasks of one session.
struct PartContext<C: StorageClient> {
    client: Arc<C>,
    pool: Arc<BufferPool>,
    semaphore: Semaphore,
    token: CancellationToken,
    slots: Arc<Vec<OnceLock<CompletedPart>>>,
    file: Arc<File>,
    path: PathBuf,
    bucket: String,
    key: String,
    upload_id: String,
}

impl<C: StorageClient + 'static> PartContext<C> {
    async fn upload_one(&self, descriptor: PartDescriptor) -> Result<(), UploadError> {
        let part_number: u32 = descriptor.part_number;

        let _permit = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Err(UploadError::Cancelled),
            permit = self.semaphore.acquire() => permit.map_err(|_| UploadError::Cancelled)?,
        };

        let buffer: PooledBuffer = self.read_part(descriptor).await?;
        let length: usize = descriptor.length as usize;

        let etag: String = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Err(UploadError::Cancelled),
            result = self.client.upload_part(
                &self.bucket,
                &self.key,
                &self.upload_id,
                part_number,
                &buffer[..length],
            ) => result.map_err(|source| UploadError::PartUpload { part_number, source })?,
        };
        drop(buffer);

        log::debug!("Uploaded part {} of {} ({} bytes)", part_number, self.upload_id, length);

        self.slots[descriptor.index()]
            .set(CompletedPart { part_number, etag })
            .map_err(|_| UploadError::PartTask {
                message: format!("part {} recorded twice", part_number),
            })
    }

    /// Fill a pooled buffer with this part's bytes.
    async fn read_part(&self, descriptor: PartDescriptor) -> Result<PooledBuffer, UploadError> {
        let mut buffer: PooledBuffer = self.pool.acquire();
        let file: Arc<File> = Arc::clone(&self.file);
        let length: usize = descriptor.length as usize;

        let (buffer, read) = tokio::task::spawn_blocking(move || {
            let read = read_exact_at(&file, &mut buffer[..length], descriptor.offset);
            (buffer, read)
        })
        .await
        .map_err(|err| UploadError::PartTask {
            message: err.to_string(),
        })?;

        read.map_err(|source| UploadError::PartRead {
            part_number: descriptor.part_number,
            path: self.path.clone(),
            source,
        })?;
        Ok(buffer)
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(std::io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buf = &mut std::mem::take(&mut buf)[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
