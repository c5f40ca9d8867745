//! Error types for scan operations

use std::path::PathBuf;

use thiserror::Error;

/// Notice shown to the user when a scan cannot be completed.
pub const SCAN_FAILED_NOTICE: &str = "Scan failed; ensure the service is running";

#[derive(Error, Debug)]
pub enum ScanError {
    /// Nothing was picked. Callers treat this as a silent no-op.
    #[error("no file selected")]
    NoFileSelected,

    #[error("failed to read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Transport error, non-success status, or a body that is not a scan payload.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ScanError {
    fn from(e: reqwest::Error) -> Self {
        ScanError::NetworkFailure(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_path() {
        let err = ScanError::Unreadable {
            path: PathBuf::from("/tmp/missing.txt"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "failed to read /tmp/missing.txt: not found");
    }

    #[test]
    fn network_failure_display() {
        let err = ScanError::NetworkFailure("connection refused".into());
        assert!(err.to_string().contains("connection refused"));
    }
}
