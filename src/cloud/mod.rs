//! Cloud - upload target for staged videos
//!
//! ## Responsibilities
//!
//! - Existence check by object name
//! - Upload by name + byte stream + content type
//!
//! `s3` talks to any S3-compatible object store (AWS, GCS interoperability
//! endpoint, Storj, MinIO).

pub mod s3;

pub use s3::{S3Config, S3Uploader};

use crate::error::Result;
use crate::models::VideoStream;
use async_trait::async_trait;

/// Cloud upload target
#[async_trait]
pub trait CloudUploader: Send + Sync {
    /// Whether an object with this name already exists
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Upload one object; returns only after the store confirmed it
    async fn upload(&self, name: &str, stream: VideoStream, mimetype: &str) -> Result<()>;
}
