use std::path::Path;

use tracing::debug;

use crate::error::{Result, ScanError};
use crate::types::ScanRequest;

/// Turn a file selection into a `ScanRequest`, reading the whole file as text.
///
/// - `None` (or an empty path) means the selection was dismissed: `NoFileSelected`.
/// - Invalid UTF-8 is replaced rather than rejected, so binary manifests still submit.
pub async fn read_request(selection: Option<&Path>) -> Result<ScanRequest> {
    let path = match selection {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => return Err(ScanError::NoFileSelected),
    };

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ScanError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    debug!(%file_name, bytes = bytes.len(), "file selected");

    Ok(ScanRequest {
        file_name,
        file_content: String::from_utf8_lossy(&bytes).into_owned(),
    })
}
