//! S3-compatible uploader
//!
//! Uses path-style addressing against a configurable endpoint. The SDK's
//! own retries are disabled; every call goes through `retry::retry`.

use super::CloudUploader;
use crate::error::{Error, Result};
use crate::models::{collect_stream, VideoStream};
use crate::retry::{retry, RetryPolicy};
use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

/// Default endpoint (GCS interoperability API)
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Default signing region
pub const DEFAULT_REGION: &str = "auto";

/// Object store settings
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Optional key prefix, e.g. `dashcam/`
    pub prefix: Option<String>,
}

impl S3Config {
    pub fn new(bucket: String, access_key_id: String, secret_access_key: String) -> Self {
        Self {
            bucket,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            region: DEFAULT_REGION.to_string(),
            access_key_id,
            secret_access_key,
            prefix: None,
        }
    }

    /// Object key for a staged file name
    pub fn key_for(&self, name: &str) -> String {
        match self.prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => {
                format!("{}/{}", prefix.trim_end_matches('/'), name)
            }
            _ => name.to_string(),
        }
    }
}

/// S3-compatible uploader
pub struct S3Uploader {
    client: S3Client,
    config: S3Config,
    retry: RetryPolicy,
}

impl S3Uploader {
    pub fn new(config: S3Config, retry: RetryPolicy) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "dashcam-sync",
        );

        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .build();

        Self {
            client: S3Client::from_conf(s3_config),
            config,
            retry,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    async fn head(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) {
                    return Ok(false);
                }
                Err(map_sdk_error("head_object", e))
            }
        }
    }
}

#[async_trait]
impl CloudUploader for S3Uploader {
    async fn exists(&self, name: &str) -> Result<bool> {
        let key = self.config.key_for(name);
        let key = key.as_str();
        retry(&self.retry, move || self.head(key)).await
    }

    async fn upload(&self, name: &str, stream: VideoStream, mimetype: &str) -> Result<()> {
        let key = self.config.key_for(name);
        let data = collect_stream(stream).await?;

        tracing::debug!(
            bucket = %self.config.bucket,
            key = %key,
            size_bytes = data.len(),
            "Uploading object"
        );

        let client = &self.client;
        let bucket = self.config.bucket.as_str();
        let key_ref = key.as_str();
        let data_ref = &data;

        let result = retry(&self.retry, move || async move {
            client
                .put_object()
                .bucket(bucket)
                .key(key_ref)
                .content_type(mimetype)
                .body(ByteStream::from(data_ref.clone()))
                .send()
                .await
                .map_err(|e| map_sdk_error("put_object", e))
        })
        .await?;

        tracing::debug!(
            key = %key,
            etag = result.e_tag().unwrap_or_default(),
            "Object stored"
        );
        Ok(())
    }
}

/// Map an SDK failure to a structured error carrying the HTTP status
fn map_sdk_error<E>(operation: &'static str, err: SdkError<E>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let message = match (err.code(), err.message()) {
        (Some(code), Some(msg)) => format!("{} failed: {} ({})", operation, msg, code),
        (Some(code), None) => format!("{} failed: {}", operation, code),
        _ => format!("{} failed: {}", operation, DisplayErrorContext(&err)),
    };

    match status {
        Some(status) => Error::cloud_status(status, message),
        None => Error::Cloud(message),
    }
}
