//! Error handling for dashcam-sync

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit status for configuration errors
pub const EXIT_CONFIG: i32 = 1;

/// Process exit status when the staging directory cannot be prepared
pub const EXIT_STAGING_DIR: i32 = 2;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or malformed setting, or an SSID that is not provisioned
    #[error("Config error: {0}")]
    Config(String),

    /// Joining a provisioned network failed
    #[error("Connection to network with SSID {ssid} failed")]
    WifiConnection { ssid: String },

    /// Camera or cloud answered with a status outside the accepted set
    #[error("{service} responded with HTTP {status}: {message}")]
    RemoteProtocol {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// Staging directory holds fewer entries than the configured minimum
    #[error("Staging directory below minimum occupancy ({occupancy} < {minimum})")]
    CapacityGuard { occupancy: usize, minimum: usize },

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// File name without a sortable capture timestamp prefix
    #[error("Invalid video file name: {0}")]
    InvalidFileName(String),

    /// Parse error (camera listing, supplicant output)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Object storage SDK failure without an HTTP status
    #[error("Cloud error: {0}")]
    Cloud(String),

    /// Wi-Fi tooling failure (wpa_cli missing, unexpected output)
    #[error("Wi-Fi error: {0}")]
    Wifi(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a camera protocol error
    pub fn camera_status(status: u16, message: impl Into<String>) -> Self {
        Error::RemoteProtocol {
            service: "camera",
            status,
            message: message.into(),
        }
    }

    /// Shorthand for a cloud protocol error
    pub fn cloud_status(status: u16, message: impl Into<String>) -> Self {
        Error::RemoteProtocol {
            service: "cloud",
            status,
            message: message.into(),
        }
    }

    /// Whether this error should stop the process at startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Exit status used by `main` when this error ends the process
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => EXIT_CONFIG,
            Error::Io(_) => EXIT_STAGING_DIR,
            _ => EXIT_CONFIG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_protocol_display() {
        let err = Error::camera_status(500, "Internal Server Error");
        assert_eq!(
            err.to_string(),
            "camera responded with HTTP 500: Internal Server Error"
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::Config("CAMERA_SSID not set".into()).exit_code(), 1);
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(Error::from(io).exit_code(), 2);
        assert!(Error::Config("x".into()).is_fatal());
        assert!(!Error::NotFound("x".into()).is_fatal());
    }
}
