use crate::types::ScanResult;

/// Percentage of detected licenses that are not violations, rounded half-up.
///
/// - No detected licenses scores 100.
/// - More violations than detections (an inconsistent payload) clamps to 0.
pub fn compliance_score(result: &ScanResult) -> u8 {
    let detected = result.detected.len() as u64;
    if detected == 0 {
        return 100;
    }
    let compliant = detected.saturating_sub(result.violations.len() as u64);
    // round(compliant / detected * 100) with halves going up
    let score = (compliant * 200 + detected) / (detected * 2);
    score.min(100) as u8
}
