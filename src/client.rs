//! HTTP client for the external license scanning service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, ScanError};
use crate::types::{License, ScanRequest, ScanResult};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can turn a `ScanRequest` into a `ScanResult`.
#[async_trait]
pub trait ScanBackend: Send + Sync {
    async fn submit(&self, request: ScanRequest) -> Result<ServiceResponse>;
}

/// Wire format used for `POST /scan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RequestEncoding {
    /// `{ "file_name": .., "file_content": .. }` as `application/json`.
    #[default]
    Json,
    /// `multipart/form-data` with the raw file in the `file` field.
    Multipart,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub encoding: RequestEncoding,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            encoding: RequestEncoding::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ScanPayload<'a> {
    file_name: &'a str,
    file_content: &'a str,
}

/// Scan service reply. Missing or `null` lists decode as empty.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct ServiceResponse {
    #[serde(default)]
    detected: Option<Vec<License>>,
    #[serde(default)]
    violations: Option<Vec<License>>,
    #[serde(default)]
    compliance_score: Option<f64>,
}

impl ServiceResponse {
    pub fn new(result: ScanResult) -> Self {
        Self {
            detected: Some(result.detected),
            violations: Some(result.violations),
            compliance_score: None,
        }
    }

    /// Score computed by the service, if it sent one.
    pub fn reported_score(&self) -> Option<f64> {
        self.compliance_score
    }

    pub fn into_result(self) -> ScanResult {
        ScanResult::new(
            self.detected.unwrap_or_default(),
            self.violations.unwrap_or_default(),
        )
    }
}

impl From<ScanResult> for ServiceResponse {
    fn from(result: ScanResult) -> Self {
        Self::new(result)
    }
}

/// Sends scan requests to `<base_url>/scan`. No retries; failures go to the caller.
#[derive(Debug, Clone)]
pub struct ScanClient {
    http: Client,
    endpoint: Url,
    encoding: RequestEncoding,
}

impl ScanClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let endpoint = scan_endpoint(&config.base_url)?;
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScanError::Config(e.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            encoding: config.encoding,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ScanBackend for ScanClient {
    async fn submit(&self, request: ScanRequest) -> Result<ServiceResponse> {
        let builder = self.http.post(self.endpoint.clone());
        let builder = match self.encoding {
            RequestEncoding::Json => builder.json(&ScanPayload {
                file_name: &request.file_name,
                file_content: &request.file_content,
            }),
            RequestEncoding::Multipart => {
                let part = Part::bytes(request.file_content.into_bytes())
                    .file_name(request.file_name.clone());
                builder.multipart(Form::new().part("file", part))
            }
        };
        debug!(endpoint = %self.endpoint, file = %request.file_name, encoding = ?self.encoding, "submitting scan");

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "scan service rejected request");
            return Err(ScanError::NetworkFailure(format!(
                "service responded with {status}: {body}"
            )));
        }

        let body = response.bytes().await?;
        serde_json::from_slice::<ServiceResponse>(&body)
            .map_err(|e| ScanError::NetworkFailure(format!("malformed scan response: {e}")))
    }
}

fn scan_endpoint(base_url: &str) -> Result<Url> {
    let mut base = Url::parse(base_url.trim())
        .map_err(|e| ScanError::Config(format!("invalid base url {base_url:?}: {e}")))?;
    if base.cannot_be_a_base() {
        return Err(ScanError::Config(format!("{base_url:?} cannot be a base url")));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("scan")
        .map_err(|e| ScanError::Config(e.to_string()))
}
