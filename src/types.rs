use serde::{Deserialize, Serialize};

/// License identifier as reported by the scanning service (SPDX-style tag).
pub type License = String;

/// Licenses the dashboard knows how to explain when they show up as violations.
const FORBIDDEN_EXPLANATIONS: &[(&str, &str)] = &[
    (
        "GPL-3.0",
        "GPL-3.0 is copyleft; cannot be used in proprietary projects.",
    ),
    ("AGPL-3.0", "AGPL-3.0 requires server-side code sharing."),
];

/// Human-readable explanation for a violation, or `""` when none is known.
pub fn explain_violation(license: &str) -> &'static str {
    FORBIDDEN_EXPLANATIONS
        .iter()
        .find(|(id, _)| *id == license)
        .map(|(_, text)| *text)
        .unwrap_or("")
}

/// One file selected for scanning. Consumed by a single submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub file_name: String,
    pub file_content: String,
}

/// Licenses detected in a manifest and the subset flagged by policy.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub detected: Vec<License>,
    pub violations: Vec<License>,
}

impl ScanResult {
    pub fn new(detected: Vec<License>, violations: Vec<License>) -> Self {
        Self {
            detected,
            violations,
        }
    }

    /// Violations paired with their explanation text, in service order.
    pub fn violation_details(&self) -> Vec<ViolationDetail> {
        self.violations
            .iter()
            .map(|license| ViolationDetail {
                license: license.clone(),
                explanation: explain_violation(license).to_string(),
            })
            .collect()
    }
}

/// A flagged license plus the text shown next to it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ViolationDetail {
    pub license: License,
    pub explanation: String,
}

/// Everything shown for a completed scan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub file_name: String,
    pub detected: Vec<License>,
    pub violations: Vec<ViolationDetail>,
    /// Locally derived compliance score, 0..=100.
    pub score: u8,
    /// Score the service sent along, if any. Informational only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_score: Option<f64>,
    pub completed_at: String,
}

/// Lifecycle of the scan session. Exactly one is live at a time.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Scanning {
        file_name: String,
    },
    Displaying {
        report: ScanReport,
    },
    Failed {
        /// Message meant for the user.
        notice: String,
        /// Underlying cause, for logs and details views.
        reason: String,
    },
}

impl SessionState {
    pub fn is_scanning(&self) -> bool {
        matches!(self, SessionState::Scanning { .. })
    }
}

/// Point-in-time view of the session for rendering.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub state: SessionState,
    /// Displayed progress value (animated, 0..=100).
    pub progress: u8,
    /// Recently scanned file names, newest first.
    pub history: Vec<String>,
}
