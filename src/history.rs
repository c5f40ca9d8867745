use std::collections::VecDeque;

/// How many recent scans are kept.
pub const RECENT_SCANS_LIMIT: usize = 5;

/// Most-recent-first list of scanned file names, capped at `RECENT_SCANS_LIMIT`.
/// Re-scanning a name adds another entry; nothing is deduplicated.
#[derive(Debug, Clone, Default)]
pub struct ScanHistory {
    entries: VecDeque<String>,
}

impl ScanHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, file_name: impl Into<String>) {
        self.entries.push_front(file_name.into());
        self.entries.truncate(RECENT_SCANS_LIMIT);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
