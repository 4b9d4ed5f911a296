//! Camera type definitions

use crate::models::parse_capture_timestamp;
use chrono::NaiveDateTime;
use serde::Serialize;

/// Locked video folders on the camera's SD card
pub const DEFAULT_LOCKED_FOLDERS: [&str; 2] = ["/CARDV/EMR/", "/CARDV/EMR_E/"];

/// Camera address on its own access point
pub const DEFAULT_CAMERA_HOST: &str = "192.168.1.254";

/// Video file as listed by the camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteVideoFile {
    /// Path on the camera web server, identity
    pub path: String,
    /// Final path segment
    pub name: String,
    /// Capture time from the name prefix, if well-formed
    pub timestamp: Option<NaiveDateTime>,
}

impl RemoteVideoFile {
    pub fn from_path(path: &str) -> Self {
        let name = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(path)
            .to_string();
        let timestamp = parse_capture_timestamp(&name);
        Self {
            path: path.to_string(),
            name,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        let file = RemoteVideoFile::from_path("/CARDV/EMR/20230101000500_000123F.MP4");
        assert_eq!(file.name, "20230101000500_000123F.MP4");
        assert!(file.timestamp.is_some());

        let odd = RemoteVideoFile::from_path("/CARDV/EMR/clip.MP4");
        assert_eq!(odd.name, "clip.MP4");
        assert!(odd.timestamp.is_none());
    }
}
