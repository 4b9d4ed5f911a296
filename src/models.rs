//! Shared video types
//!
//! Byte streams passed between the camera, the staging store and the
//! cloud uploader, plus file-name helpers.

use crate::error::Result;
use bytes::Bytes;
use chrono::NaiveDateTime;
use futures::stream::{self, BoxStream, StreamExt};

/// Chunked video content
pub type VideoStream = BoxStream<'static, Result<Bytes>>;

/// Fallback content type
pub const DEFAULT_MIMETYPE: &str = "application/octet-stream";

/// Width of the `YYYYMMDDHHMMSS` prefix carried by camera file names
pub const TIMESTAMP_PREFIX_LEN: usize = 14;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Content plus the content type reported by its source
pub struct VideoContent {
    pub stream: VideoStream,
    pub mimetype: String,
}

/// Wrap an in-memory buffer as a single-chunk stream
pub fn stream_from_bytes(data: impl Into<Bytes>) -> VideoStream {
    let data = data.into();
    stream::once(async move { Ok(data) }).boxed()
}

/// Drain a stream into one contiguous buffer
pub async fn collect_stream(mut stream: VideoStream) -> Result<Bytes> {
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(Bytes::from(buf))
}

/// Parse the capture time encoded in the first 14 characters of a file name.
///
/// Lexicographic order of names equals capture order only while this
/// prefix is present and zero padded.
pub fn parse_capture_timestamp(name: &str) -> Option<NaiveDateTime> {
    let prefix = name.get(..TIMESTAMP_PREFIX_LEN)?;
    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(prefix, TIMESTAMP_FORMAT).ok()
}

/// Content type for a staged file, from its extension
pub fn mimetype_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" => "video/mp4",
        "ts" => "video/mp2t",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "jpg" | "jpeg" => "image/jpeg",
        _ => DEFAULT_MIMETYPE,
    }
}
