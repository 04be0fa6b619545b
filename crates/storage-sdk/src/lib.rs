//! AWS SDK S3 backend for s3-uploader.
//!
//! This crate provides a `StorageClient` implementation using the AWS SDK for
//! Rust. It talks to AWS or to any S3-compatible endpoint (MinIO, ...).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use s3_uploader_storage::{StorageSettings, UploadOptions, UploadOrchestrator};
//! use s3_uploader_storage_sdk::SdkStorageClient;
//!
//! let client = SdkStorageClient::new(StorageSettings::default()).await?;
//! let orchestrator = UploadOrchestrator::new(Arc::new(client), UploadOptions::default())?;
//! ```

mod client;
mod error;

pub use client::SdkStorageClient;
pub use error::SdkClientError;
