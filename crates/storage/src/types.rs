//! Shared data structures for upload operations.

use std::path::PathBuf;

use crate::error::UploadError;
use crate::planner::UploadStrategy;

/// Default region when none is configured.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Configuration settings for the S3 backend.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// AWS region.
    pub region: String,
    /// Custom endpoint (MinIO, localstack, ...). None uses AWS.
    pub endpoint_url: Option<String>,
    /// Static credentials. None falls back to the default provider chain.
    pub credentials: Option<AwsCredentials>,
    /// Use path-style addressing (`endpoint/bucket/key`).
    pub force_path_style: bool,
    /// Retry policy applied by the backend client.
    pub retry: RetrySettings,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.into(),
            endpoint_url: None,
            credentials: None,
            force_path_style: false,
            retry: RetrySettings::default(),
        }
    }
}

/// AWS credentials.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .finish()
    }
}

/// Retry settings handed to the backend client.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial backoff delay in milliseconds.
    pub initial_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 20_000,
        }
    }
}

/// A resolved request to upload one local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Destination bucket.
    pub bucket: String,
    /// Local file to upload.
    pub source_path: PathBuf,
    /// Destination object key.
    pub key: String,
}

impl UploadRequest {
    /// Create a new upload request.
    pub fn new(
        bucket: impl Into<String>,
        source_path: impl Into<PathBuf>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            source_path: source_path.into(),
            key: key.into(),
        }
    }
}

/// Byte range of the source file uploaded as one part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartDescriptor {
    /// One-based part number.
    pub part_number: u32,
    /// Byte offset within the file.
    pub offset: u64,
    /// Length of this part in bytes.
    pub length: u64,
}

impl PartDescriptor {
    /// Slot of this part in the ordered manifest.
    pub fn index(&self) -> usize {
        self.part_number as usize - 1
    }
}

/// A part the backend acknowledged, as sent back on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// One-based part number.
    pub part_number: u32,
    /// ETag returned by `upload_part`, passed back verbatim.
    pub etag: String,
}

/// Lifecycle of a multipart session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    InProgress,
    Completed,
    Aborted,
}

impl SessionState {
    /// Completed and Aborted accept no further operations.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Aborted)
    }
}

/// A multipart session owned by exactly one orchestration flow.
///
/// Tracks local state only; the backend calls are made by the orchestrator,
/// which moves the session through `begin_parts` and then exactly one of
/// `complete` or `abort`.
#[derive(Debug)]
pub struct UploadSession {
    upload_id: String,
    bucket: String,
    key: String,
    state: SessionState,
    parts: Vec<CompletedPart>,
}

impl UploadSession {
    /// Wrap a freshly created backend session.
    pub fn new(
        upload_id: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            upload_id: upload_id.into(),
            bucket: bucket.into(),
            key: key.into(),
            state: SessionState::Created,
            parts: Vec::new(),
        }
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Parts recorded on completion, ordered 1..N.
    pub fn parts(&self) -> &[CompletedPart] {
        &self.parts
    }

    /// Created -> InProgress, on first part dispatch.
    pub fn begin_parts(&mut self) -> Result<(), UploadError> {
        match self.state {
            SessionState::Created | SessionState::InProgress => {
                self.state = SessionState::InProgress;
                Ok(())
            }
            state => Err(self.invalid(state, "upload parts")),
        }
    }

    /// InProgress -> Completed with the ordered manifest.
    pub fn complete(&mut self, parts: Vec<CompletedPart>) -> Result<(), UploadError> {
        match self.state {
            SessionState::InProgress => {
                self.parts = parts;
                self.state = SessionState::Completed;
                Ok(())
            }
            state => Err(self.invalid(state, "complete")),
        }
    }

    /// Any non-terminal state -> Aborted.
    pub fn abort(&mut self) -> Result<(), UploadError> {
        if self.state.is_terminal() {
            return Err(self.invalid(self.state, "abort"));
        }
        self.parts.clear();
        self.state = SessionState::Aborted;
        Ok(())
    }

    fn invalid(&self, state: SessionState, operation: &'static str) -> UploadError {
        UploadError::InvalidSessionState {
            upload_id: self.upload_id.clone(),
            state,
            operation,
        }
    }
}

/// Summary of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Path taken for this file.
    pub strategy: UploadStrategy,
    /// Bytes uploaded.
    pub bytes: u64,
    /// Number of parts (1 for a single-request upload).
    pub parts: u32,
    /// ETag of a single-request upload.
    pub etag: Option<String>,
    /// Upload id of a multipart upload.
    pub upload_id: Option<String>,
}
