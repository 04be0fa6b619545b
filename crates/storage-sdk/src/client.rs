//! AWS SDK S3 client implementation.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::client::Waiters;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, Length};
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart as SdkCompletedPart,
    CreateBucketConfiguration,
};
use aws_sdk_s3::Client as S3Client;
use tokio::fs::File;

use s3_uploader_storage::{
    CompletedPart, ObjectInfo, RetrySettings, StorageClient, StorageError, StorageSettings,
};

use crate::error::{from_sdk_error, SdkClientError};

/// Region whose buckets are created without a location constraint.
const US_EAST_1: &str = "us-east-1";

/// Provider name attached to static credentials.
const CREDENTIALS_PROVIDER: &str = "s3-uploader";

/// StorageClient implementation using AWS SDK for Rust.
///
/// Retries, connection pooling and request signing are handled by the SDK.
/// Works against AWS or any S3-compatible endpoint such as MinIO.
pub struct SdkStorageClient {
    /// The underlying S3 client.
    s3_client: S3Client,
    /// Region buckets are created in.
    region: String,
}

impl SdkStorageClient {
    /// Create a new SDK storage client.
    ///
    /// Static credentials from `settings` take precedence over the default
    /// credential chain.
    ///
    /// # Arguments
    /// * `settings` - Region, endpoint, credentials and retry policy
    ///
    /// # Returns
    /// A new SDK storage client.
    pub async fn new(settings: StorageSettings) -> Result<Self, StorageError> {
        if settings.region.trim().is_empty() {
            return Err(SdkClientError::ConfigError("region must not be empty".into()).into());
        }

        let config_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));

        let config_loader = if let Some(ref creds) = settings.credentials {
            let credentials = Credentials::new(
                &creds.access_key_id,
                &creds.secret_access_key,
                creds.session_token.clone(),
                None,
                CREDENTIALS_PROVIDER,
            );
            config_loader.credentials_provider(credentials)
        } else {
            config_loader
        };

        let sdk_config = config_loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .retry_config(retry_config(&settings.retry))
            .force_path_style(settings.force_path_style);
        if let Some(ref endpoint) = settings.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        log::debug!(
            "S3 client for region {} (endpoint: {})",
            settings.region,
            settings.endpoint_url.as_deref().unwrap_or("default")
        );

        Ok(Self {
            s3_client: S3Client::from_conf(builder.build()),
            region: settings.region,
        })
    }
}

/// Standard SDK retry policy from our settings.
fn retry_config(settings: &RetrySettings) -> RetryConfig {
    RetryConfig::standard()
        .with_max_attempts(settings.max_attempts.max(1))
        .with_initial_backoff(Duration::from_millis(settings.initial_backoff_ms))
        .with_max_backoff(Duration::from_millis(settings.max_backoff_ms))
}

/// Location constraint for a bucket in `region`, if one is needed.
fn location_constraint(region: &str) -> Option<BucketLocationConstraint> {
    if region == US_EAST_1 {
        None
    } else {
        Some(BucketLocationConstraint::from(region))
    }
}

#[async_trait]
impl StorageClient for SdkStorageClient {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<u64>, StorageError> {
        match self.s3_client.head_object().bucket(bucket).key(key).send().await {
            Ok(output) => Ok(Some(output.content_length().map(|l| l as u64).unwrap_or(0))),
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|service_err| service_err.is_not_found())
                    .unwrap_or(false)
                {
                    Ok(None)
                } else {
                    Err(from_sdk_error(err, bucket, key))
                }
            }
        }
    }

    async fn put_object_from_file(
        &self,
        bucket: &str,
        key: &str,
        file: File,
        length: u64,
    ) -> Result<String, StorageError> {
        let body: ByteStream = ByteStream::read_from()
            .file(file)
            .length(Length::Exact(length))
            .build()
            .await
            .map_err(|e| SdkClientError::BodyError(e.to_string()))?;

        let response = self
            .s3_client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(length as i64)
            .body(body)
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;

        Ok(response.e_tag().unwrap_or_default().to_string())
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<String, StorageError> {
        let response = self
            .s3_client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;

        response.upload_id().map(str::to_string).ok_or_else(|| {
            SdkClientError::MissingField {
                operation: "CreateMultipartUpload",
                field: "upload id",
            }
            .into()
        })
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: &[u8],
    ) -> Result<String, StorageError> {
        let response = self
            .s3_client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number as i32)
            .content_length(data.len() as i64)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;

        response.e_tag().map(str::to_string).ok_or_else(|| {
            SdkClientError::MissingField {
                operation: "UploadPart",
                field: "ETag",
            }
            .into()
        })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError> {
        let completed: Vec<SdkCompletedPart> = parts
            .iter()
            .map(|part| {
                SdkCompletedPart::builder()
                    .part_number(part.part_number as i32)
                    .e_tag(&part.etag)
                    .build()
            })
            .collect();

        self.s3_client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;

        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), StorageError> {
        self.s3_client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;

        Ok(())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let mut request = self.s3_client.create_bucket().bucket(bucket);

        if let Some(constraint) = location_constraint(&self.region) {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(constraint)
                    .build(),
            );
        }

        request
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, ""))?;

        log::info!("Created bucket {} in {}", bucket, self.region);
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        self.s3_client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, ""))?;

        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectInfo>, StorageError> {
        let mut objects: Vec<ObjectInfo> = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .s3_client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix);

            if let Some(ref token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|err| from_sdk_error(err, bucket, prefix))?;

            for obj in response.contents() {
                let last_modified: Option<i64> = obj
                    .last_modified()
                    .and_then(|dt| dt.to_millis().ok())
                    .map(|ms| ms / 1000);

                objects.push(ObjectInfo {
                    key: obj.key().unwrap_or_default().to_string(),
                    size: obj.size().map(|s| s as u64).unwrap_or(0),
                    last_modified,
                    etag: obj.e_tag().map(|s| s.to_string()),
                });
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(objects)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.s3_client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;

        Ok(())
    }

    /// Uses the SDK's `ObjectExists` waiter instead of the polling default.
    async fn wait_until_exists(
        &self,
        bucket: &str,
        key: &str,
        timeout: Duration,
    ) -> Result<(), StorageError> {
        self.s3_client
            .wait_until_object_exists()
            .bucket(bucket)
            .key(key)
            .wait(timeout)
            .await
            .map_err(|err| StorageError::NetworkError {
                message: format!(
                    "waiting for s3://{}/{}: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&err)
                ),
                retryable: false,
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdk_client_implements_storage_client() {
        // Compile-time check that the trait is implemented.
        fn assert_storage_client<T: StorageClient>() {}
        assert_storage_client::<SdkStorageClient>();
    }

    #[test]
    fn test_location_constraint() {
        assert!(location_constraint("us-east-1").is_none());
        assert_eq!(
            location_constraint("us-west-2"),
            Some(BucketLocationConstraint::UsWest2)
        );
    }

    #[test]
    fn test_retry_config_from_settings() {
        let config: RetryConfig = retry_config(&RetrySettings {
            max_attempts: 0,
            initial_backoff_ms: 250,
            max_backoff_ms: 5_000,
        });
        assert_eq!(config.max_attempts(), 1);
        assert_eq!(config.initial_backoff(), Duration::from_millis(250));
        assert_eq!(config.max_backoff(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_new_rejects_empty_region() {
        let settings = StorageSettings {
            region: " ".into(),
            ..Default::default()
        };
        let result = SdkStorageClient::new(settings).await;
        assert!(matches!(result, Err(StorageError::InvalidConfig { .. })));
    }
}
