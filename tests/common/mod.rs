//! In-memory collaborators for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use dashcam_sync::camera::{CameraApi, RemoteVideoFile};
use dashcam_sync::cloud::CloudUploader;
use dashcam_sync::error::{Error, Result};
use dashcam_sync::file_storage::StagingStore;
use dashcam_sync::models::{collect_stream, stream_from_bytes, VideoContent, VideoStream};
use dashcam_sync::wifi::{ConnectivityEvent, WifiManager};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

pub const CAMERA_SSID: &str = "DASHCAM-0001";
pub const HOME_SSID: &str = "Home";

/// Wi-Fi that switches instantly and counts joins/releases
pub struct FakeWifi {
    current: Mutex<Option<String>>,
    /// Network the radio falls back to after a release
    home: Option<String>,
    known: Vec<String>,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub fail_disconnect: AtomicBool,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl FakeWifi {
    pub fn new(current: Option<&str>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            current: Mutex::new(current.map(str::to_string)),
            home: Some(HOME_SSID.to_string()),
            known: vec![CAMERA_SSID.to_string(), HOME_SSID.to_string()],
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            fail_disconnect: AtomicBool::new(false),
            events,
        }
    }

    pub fn current(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }

    pub fn set_current(&self, ssid: Option<&str>) {
        *self.current.lock().unwrap() = ssid.map(str::to_string);
    }

    /// Change association and publish the matching event
    pub fn emit(&self, event: ConnectivityEvent) {
        match &event {
            ConnectivityEvent::Connected(ssid) => self.set_current(Some(ssid)),
            ConnectivityEvent::Disconnected => self.set_current(None),
        }
        let _ = self.events.send(event);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WifiManager for FakeWifi {
    async fn current_ssid(&self) -> Result<Option<String>> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn connect_known_network(&self, ssid: &str) -> Result<()> {
        if !self.known.iter().any(|k| k == ssid) {
            return Err(Error::Config(format!("Network '{}' is not provisioned", ssid)));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.set_current(Some(ssid));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(Error::Wifi("reconfigure failed".to_string()));
        }
        *self.current.lock().unwrap() = self.home.clone();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }
}

/// Camera holding files in memory and journaling every call
pub struct FakeCamera {
    files: Mutex<Vec<(RemoteVideoFile, Bytes)>>,
    failing: HashSet<String>,
    journal: Mutex<Vec<String>>,
}

impl FakeCamera {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self {
            files: Mutex::new(
                files
                    .iter()
                    .map(|(path, data)| {
                        (RemoteVideoFile::from_path(path), Bytes::copy_from_slice(data.as_bytes()))
                    })
                    .collect(),
            ),
            failing: HashSet::new(),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Make `fetch` fail for this file name
    pub fn failing_fetch(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn remaining(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .files
            .lock()
            .unwrap()
            .iter()
            .map(|(f, _)| f.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

#[async_trait]
impl CameraApi for FakeCamera {
    async fn list_locked_files(&self) -> Result<Vec<RemoteVideoFile>> {
        self.journal.lock().unwrap().push("list".to_string());
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .map(|(f, _)| f.clone())
            .collect())
    }

    async fn fetch(&self, file: &RemoteVideoFile) -> Result<VideoContent> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("fetch:{}", file.name));

        if self.failing.contains(&file.name) {
            return Err(Error::camera_status(500, "Internal Server Error"));
        }

        let data = self
            .files
            .lock()
            .unwrap()
            .iter()
            .find(|(f, _)| f.path == file.path)
            .map(|(_, d)| d.clone())
            .ok_or_else(|| Error::camera_status(404, "Not Found"))?;

        Ok(VideoContent {
            stream: stream_from_bytes(data),
            mimetype: "video/mp4".to_string(),
        })
    }

    async fn delete_remote(&self, file: &RemoteVideoFile) -> Result<()> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("delete:{}", file.name));
        self.files.lock().unwrap().retain(|(f, _)| f.path != file.path);
        Ok(())
    }
}

/// Bucket in memory
#[derive(Default)]
pub struct FakeCloud {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    failing: HashSet<String>,
    pub uploads: AtomicUsize,
    pub exists_calls: AtomicUsize,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, name: &str, data: &[u8]) -> Self {
        self.objects.lock().unwrap().insert(
            name.to_string(),
            (Bytes::copy_from_slice(data), "video/mp4".to_string()),
        );
        self
    }

    /// Make `upload` fail for this object name
    pub fn failing_upload(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn object(&self, name: &str) -> Option<(Bytes, String)> {
        self.objects.lock().unwrap().get(name).cloned()
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CloudUploader for FakeCloud {
    async fn exists(&self, name: &str) -> Result<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.objects.lock().unwrap().contains_key(name))
    }

    async fn upload(&self, name: &str, stream: VideoStream, mimetype: &str) -> Result<()> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let data = collect_stream(stream).await?;

        if self.failing.contains(name) {
            return Err(Error::cloud_status(503, "Service Unavailable"));
        }

        self.objects
            .lock()
            .unwrap()
            .insert(name.to_string(), (data, mimetype.to_string()));
        Ok(())
    }
}

/// Staging store in a fresh temp dir with the capacity guard disabled
pub async fn open_store() -> (tempfile::TempDir, StagingStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = StagingStore::open(dir.path(), 0).await.unwrap();
    (dir, store)
}

/// Stage `name` with `data`
pub async fn stage(store: &StagingStore, name: &str, data: &[u8]) {
    let data = Bytes::copy_from_slice(data);
    store
        .store(name, || async move { Ok(stream_from_bytes(data)) })
        .await
        .unwrap();
}
