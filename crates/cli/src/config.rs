//! Command-line flags and environment configuration.

use std::path::PathBuf;

use clap::Parser;
use s3_uploader_storage::{
    AwsCredentials, StorageSettings, UploadError, UploadOptions, DEFAULT_CONCURRENCY_LIMIT,
    DEFAULT_PART_SIZE, DEFAULT_REGION,
};
use thiserror::Error;

pub const ENV_REGION: &str = "S3_REGION";
pub const ENV_ACCESS_KEY: &str = "S3_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "S3_SECRET_KEY";
pub const ENV_URL: &str = "S3_URL";

/// Configuration errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing S3_ACCESS_KEY or S3_SECRET_KEY environment variables")]
    MissingCredentials,

    #[error("S3_URL must start with http:// or https://, got {0:?}")]
    InvalidEndpoint(String),
}

/// Upload a local file to S3.
#[derive(Debug, Parser)]
#[command(name = "s3-uploader", version)]
pub struct Args {
    /// S3 bucket name
    #[arg(short = 'b', long = "bucket")]
    pub bucket: String,

    /// Path to the file to upload
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// Object key in S3 (defaults to the file path)
    #[arg(short = 'k', long = "key")]
    pub key: Option<String>,

    /// Create the bucket before uploading
    #[arg(long = "create-bucket")]
    pub create_bucket: bool,

    /// Part size in bytes; files up to this size go up in one request
    #[arg(long = "part-size", default_value_t = DEFAULT_PART_SIZE)]
    pub part_size: u64,

    /// Parts uploaded at once; each holds one part in memory (0 = no limit,
    /// the whole file is buffered at once)
    #[arg(long = "concurrency", default_value_t = DEFAULT_CONCURRENCY_LIMIT)]
    pub concurrency: usize,
}

impl Args {
    /// Destination key, falling back to the file path.
    pub fn object_key(&self) -> String {
        match self.key.as_deref() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => self.file.to_string_lossy().into_owned(),
        }
    }

    /// Upload options from the flags, rejected before any backend call.
    pub fn upload_options(&self) -> Result<UploadOptions, UploadError> {
        let options = UploadOptions::new()
            .with_part_size(self.part_size)
            .with_concurrency_limit(self.concurrency);
        options.validate()?;
        Ok(options)
    }
}

/// Connection settings read from `S3_*` environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub endpoint_url: Option<String>,
}

impl EnvConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`.
    ///
    /// Unset and empty variables are treated the same.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let (access_key, secret_key) = match (get(ENV_ACCESS_KEY), get(ENV_SECRET_KEY)) {
            (Some(access_key), Some(secret_key)) => (access_key, secret_key),
            _ => return Err(ConfigError::MissingCredentials),
        };

        let endpoint_url: Option<String> = get(ENV_URL);
        if let Some(ref url) = endpoint_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidEndpoint(url.clone()));
            }
        }

        Ok(Self {
            region: get(ENV_REGION).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            access_key,
            secret_key,
            endpoint_url,
        })
    }

    /// Backend settings. A custom endpoint implies path-style addressing.
    pub fn storage_settings(&self) -> StorageSettings {
        StorageSettings {
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            credentials: Some(AwsCredentials {
                access_key_id: self.access_key.clone(),
                secret_access_key: self.secret_key.clone(),
                session_token: None,
            }),
            force_path_style: self.endpoint_url.is_some(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_config_defaults() {
        let config = EnvConfig::from_lookup(lookup(&[
            (ENV_ACCESS_KEY, "minioadmin"),
            (ENV_SECRET_KEY, "minioadmin"),
        ]))
        .unwrap();

        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.endpoint_url, None);

        let settings: StorageSettings = config.storage_settings();
        assert!(!settings.force_path_style);
        assert_eq!(
            settings.credentials.map(|c| c.access_key_id),
            Some("minioadmin".to_string())
        );
    }

    #[test]
    fn test_env_config_custom_endpoint() {
        let config = EnvConfig::from_lookup(lookup(&[
            (ENV_REGION, "eu-central-1"),
            (ENV_ACCESS_KEY, "key"),
            (ENV_SECRET_KEY, "secret"),
            (ENV_URL, "http://127.0.0.1:9000"),
        ]))
        .unwrap();

        let settings: StorageSettings = config.storage_settings();
        assert_eq!(settings.region, "eu-central-1");
        assert_eq!(settings.endpoint_url.as_deref(), Some("http://127.0.0.1:9000"));
        assert!(settings.force_path_style);
    }

    #[test]
    fn test_env_config_missing_credentials() {
        assert_eq!(
            EnvConfig::from_lookup(lookup(&[(ENV_ACCESS_KEY, "key")])).unwrap_err(),
            ConfigError::MissingCredentials
        );
        assert_eq!(
            EnvConfig::from_lookup(lookup(&[(ENV_ACCESS_KEY, "key"), (ENV_SECRET_KEY, "")]))
                .unwrap_err(),
            ConfigError::MissingCredentials
        );
    }

    #[test]
    fn test_env_config_rejects_bad_endpoint() {
        let err = EnvConfig::from_lookup(lookup(&[
            (ENV_ACCESS_KEY, "key"),
            (ENV_SECRET_KEY, "secret"),
            (ENV_URL, "127.0.0.1:9000"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_args_key_defaults_to_file_path() {
        let args =
            Args::try_parse_from(["s3-uploader", "-b", "bucket", "-f", "data/file.bin"]).unwrap();
        assert_eq!(args.object_key(), "data/file.bin");
        assert!(!args.create_bucket);
        assert_eq!(args.part_size, DEFAULT_PART_SIZE);
        assert_eq!(args.concurrency, DEFAULT_CONCURRENCY_LIMIT);

        let args = Args::try_parse_from([
            "s3-uploader",
            "-b",
            "bucket",
            "-f",
            "data/file.bin",
            "-k",
            "backups/file.bin",
            "--create-bucket",
            "--part-size",
            "8388608",
            "--concurrency",
            "0",
        ])
        .unwrap();
        assert_eq!(args.object_key(), "backups/file.bin");
        assert!(args.create_bucket);

        let options: UploadOptions = args.upload_options().unwrap();
        assert_eq!(options.part_size, 8 * 1024 * 1024);
        assert_eq!(options.concurrency_limit, 0);
    }

    #[test]
    fn test_args_reject_zero_part_size() {
        let args = Args::try_parse_from([
            "s3-uploader",
            "-b",
            "bucket",
            "-f",
            "file.bin",
            "--create-bucket",
            "--part-size",
            "0",
        ])
        .unwrap();
        assert!(matches!(
            args.upload_options(),
            Err(UploadError::InvalidOptions { .. })
        ));
    }

    #[test]
    fn test_args_require_bucket_and_file() {
        assert!(Args::try_parse_from(["s3-uploader", "-f", "file.bin"]).is_err());
        assert!(Args::try_parse_from(["s3-uploader", "-b", "bucket"]).is_err());
    }
}
