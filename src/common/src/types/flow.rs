use crate::target_process::NamePattern;
use crate::types::dump::{DumpFileRecord, DumpManifest};
use crate::types::scan::ProcessScanResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Parameters of one scan flow. The compiled signature set travels
/// alongside the request, shared read-only between per-process tasks.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ScanRequest {
    pub pattern: NamePattern,
    pub max_results_per_process: usize,
    #[serde(default)]
    pub deadline: Option<Duration>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DumpRequest {
    pub pattern: NamePattern,
    /// Rotate part files at this many bytes. `None` dumps each region into
    /// a single file regardless of size.
    #[serde(default)]
    pub byte_limit: Option<u64>,
    /// Skip regions larger than this many bytes.
    #[serde(default)]
    pub max_region_size: Option<u64>,
    pub output_dir: PathBuf,
}

/// One record on a flow's result stream. A scan emits one `Scan` record
/// per matched process; a dump emits `Manifest` then the matching
/// `FilePart` records, in manifest order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowResult {
    Scan(ProcessScanResult),
    Manifest(DumpManifest),
    FilePart(DumpFileRecord),
}
