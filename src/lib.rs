//! Library crate for attest-scan: license-compliance scan orchestration.
pub mod client;
pub mod error;
pub mod history;
pub mod progress;
pub mod score;
pub mod server;
pub mod session;
pub mod source;
pub mod types;

pub use client::{ClientConfig, RequestEncoding, ScanBackend, ScanClient};
pub use error::{ScanError, SCAN_FAILED_NOTICE};
pub use session::{ScanSession, Submission};
pub use types::{ScanReport, ScanRequest, ScanResult, SessionSnapshot, SessionState};
