//! HttpCamera - camera web server client
//!
//! - `GET <folder>`: HTML listing
//! - `GET <path>`: file bytes + Content-Type
//! - `GET <path>?del=1`: delete (404 = already gone)

use super::listing::{check_status, parse_listing};
use super::types::RemoteVideoFile;
use super::CameraApi;
use crate::error::{Error, Result};
use crate::models::{VideoContent, DEFAULT_MIMETYPE};
use crate::retry::{retry, RetryPolicy};
use async_trait::async_trait;
use futures::future::try_join_all;
use futures::StreamExt;
use std::time::Duration;

/// HTTP camera client
pub struct HttpCamera {
    client: reqwest::Client,
    base_url: String,
    locked_folders: Vec<String>,
    retry: RetryPolicy,
}

impl HttpCamera {
    /// Create a client for the camera at `host`
    pub fn new(
        host: &str,
        locked_folders: Vec<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;

        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", host.trim_end_matches('/'))
        };

        Ok(Self {
            client,
            base_url,
            locked_folders,
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// List one folder
    pub async fn list_folder(&self, folder: &str) -> Result<Vec<RemoteVideoFile>> {
        let url = self.url_for(folder);
        let client = &self.client;
        let url = url.as_str();

        let files = retry(&self.retry, move || async move {
            let resp = client.get(url).send().await?;
            check_status(resp.status(), &[])?;
            let html = resp.text().await?;
            parse_listing(&html)
        })
        .await?;

        tracing::debug!(folder = %folder, count = files.len(), "Listed camera folder");
        Ok(files)
    }
}

#[async_trait]
impl CameraApi for HttpCamera {
    async fn list_locked_files(&self) -> Result<Vec<RemoteVideoFile>> {
        let listings = try_join_all(self.locked_folders.iter().map(|f| self.list_folder(f))).await?;
        Ok(listings.into_iter().flatten().collect())
    }

    async fn fetch(&self, file: &RemoteVideoFile) -> Result<VideoContent> {
        let resp = self.client.get(self.url_for(&file.path)).send().await?;
        check_status(resp.status(), &[])?;

        let mimetype = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_MIMETYPE)
            .to_string();

        tracing::debug!(path = %file.path, mimetype = %mimetype, "Fetching camera file");

        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::from))
            .boxed();

        Ok(VideoContent { stream, mimetype })
    }

    async fn delete_remote(&self, file: &RemoteVideoFile) -> Result<()> {
        let url = format!("{}?del=1", self.url_for(&file.path));
        let resp = self.client.get(url).send().await?;
        check_status(resp.status(), &[404])?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(path = %file.path, "Camera file already deleted");
        } else {
            tracing::info!(path = %file.path, "Deleted camera file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let camera = HttpCamera::new(
            "192.168.1.254",
            vec!["/CARDV/EMR/".to_string()],
            Duration::from_secs(10),
            RetryPolicy::none(),
        )
        .unwrap();

        assert_eq!(camera.base_url(), "http://192.168.1.254");
        assert_eq!(
            camera.url_for("/CARDV/EMR/a.MP4"),
            "http://192.168.1.254/CARDV/EMR/a.MP4"
        );
        assert_eq!(camera.url_for("CARDV/EMR/"), "http://192.168.1.254/CARDV/EMR/");

        let explicit = HttpCamera::new(
            "http://10.0.0.1/",
            vec![],
            Duration::from_secs(10),
            RetryPolicy::none(),
        )
        .unwrap();
        assert_eq!(explicit.base_url(), "http://10.0.0.1");
    }

    #[tokio::test]
    async fn test_no_folders_lists_nothing() {
        let camera = HttpCamera::new(
            "192.168.1.254",
            vec![],
            Duration::from_secs(1),
            RetryPolicy::none(),
        )
        .unwrap();
        assert!(camera.list_locked_files().await.unwrap().is_empty());
    }
}
