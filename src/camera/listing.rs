//! Camera directory listing
//!
//! The camera web server answers a folder GET with an HTML table; the
//! anchor in the first cell of each row points at the file.

use super::types::RemoteVideoFile;
use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

fn row_anchor_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<tr[^>]*>\s*<td[^>]*>\s*<a\b([^>]*)>").expect("valid row regex")
    })
}

fn href_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
            .expect("valid href regex")
    })
}

/// Extract the files of one folder listing
pub fn parse_listing(html: &str) -> Result<Vec<RemoteVideoFile>> {
    row_anchor_regex()
        .captures_iter(html)
        .map(|row| {
            let attrs = row.get(1).map(|m| m.as_str()).unwrap_or_default();
            let path = href_regex()
                .captures(attrs)
                .and_then(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
                .map(|m| m.as_str().trim())
                .filter(|p| !p.is_empty())
                .ok_or_else(|| Error::Parse("Empty video path in camera listing".to_string()))?;
            Ok(RemoteVideoFile::from_path(path))
        })
        .collect()
}

/// Accept 2xx plus any explicitly allowed status
pub fn check_status(status: reqwest::StatusCode, allowed: &[u16]) -> Result<()> {
    if status.is_success() || allowed.contains(&status.as_u16()) {
        Ok(())
    } else {
        Err(Error::camera_status(
            status.as_u16(),
            status.canonical_reason().unwrap_or("unknown status"),
        ))
    }
}
