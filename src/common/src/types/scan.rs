use crate::types::process::ProcessInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One location where a rule's sub-pattern matched. `data` holds the bytes
/// actually read from the process at `offset`, wildcards included.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StringMatch {
    pub string_id: String,
    pub offset: u64,
    pub data: Vec<u8>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule: String,
    pub string_matches: Vec<StringMatch>,
}

/// Scan outcome for a single process. `matches` is capped by the request;
/// truncation is deterministic (rule declaration order, then address).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProcessScanResult {
    pub process: ProcessInfo,
    pub matches: Vec<RuleMatch>,
    pub scan_time_us: u64,
    /// Set when the scan stopped before covering every region: cap reached,
    /// deadline expired, or the request was cancelled.
    pub truncated: bool,
    /// Regions skipped after a recoverable read failure.
    pub skipped_regions: u32,
    pub scanned_at: DateTime<Utc>,
}
