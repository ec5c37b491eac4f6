//! Object Fetcher: key-addressed GET against the blob store (S3 / MinIO).
//!
//! A single attempt per call; the worker bounds it with a timeout.

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use bytes::Bytes;
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("get {key}: {message}")]
    Get { key: String, message: String },

    #[error("read body of {key}: {message}")]
    Body { key: String, message: String },
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes, FetchError>;
}

#[derive(Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes, FetchError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| FetchError::Get {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let body = output.body.collect().await.map_err(|e| FetchError::Body {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        Ok(body.into_bytes())
    }
}

/// Constructs an S3 client configured for MinIO (local) or any S3-compatible
/// endpoint. Path-style addressing keeps bucket names out of the hostname.
pub async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "jobmatch-static",
    );

    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
