//! `s3-uploader`: upload one local file to S3 or an S3-compatible store.
//!
//! ```text
//! S3_ACCESS_KEY=... S3_SECRET_KEY=... s3-uploader -b <bucket> -f <file> [-k key] [--create-bucket]
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use s3_uploader_storage::{
    StorageClient, StorageError, UploadError, UploadOptions, UploadOrchestrator, UploadOutcome,
    UploadRequest,
};
use s3_uploader_storage_sdk::SdkStorageClient;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

mod config;

use config::{Args, ConfigError, EnvConfig};

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Error initializing uploader: {0}")]
    Client(#[source] StorageError),

    #[error("Failed to create bucket: {0}")]
    CreateBucket(#[source] StorageError),

    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(args).await {
        Ok(()) => {
            println!("Done!");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let env: EnvConfig = EnvConfig::from_env()?;
    let options: UploadOptions = args.upload_options()?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancel.clone()));

    let client: Arc<SdkStorageClient> = Arc::new(
        SdkStorageClient::new(env.storage_settings())
            .await
            .map_err(CliError::Client)?,
    );

    let orchestrator = UploadOrchestrator::new(client, options)?;

    if args.create_bucket {
        println!("Creating bucket: {}...", args.bucket);
        orchestrator
            .client()
            .create_bucket(&args.bucket)
            .await
            .map_err(CliError::CreateBucket)?;
        println!("Bucket {} created successfully.", args.bucket);
    }

    let request = UploadRequest::new(&args.bucket, &args.file, args.object_key());
    let outcome: UploadOutcome = orchestrator.upload(&cancel, &request).await?;

    log::info!(
        "Uploaded {} bytes to s3://{}/{} ({} part(s))",
        outcome.bytes,
        request.bucket,
        request.key,
        outcome.parts
    );
    Ok(())
}

/// Cancel `cancel` on SIGINT or SIGTERM.
async fn cancel_on_shutdown(cancel: CancellationToken) {
    match shutdown_signal().await {
        Ok(()) => {
            println!("Received shutdown signal, canceling upload...");
            cancel.cancel();
        }
        Err(err) => log::warn!("Couldn't listen for shutdown signals: {}", err),
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
