use crate::types::process::{AddressRange, ProcessInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One part file produced by a dump. A part covers exactly one contiguous
/// slice of one region; `size == range.len()`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DumpFileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub range: AddressRange,
}

/// A region that could not be dumped. Recorded instead of the region's
/// files; never aborts the rest of the dump.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RegionDumpError {
    pub range: AddressRange,
    pub error: String,
}

/// Summary record for one process dump, emitted before any per-file record.
/// `errors` is empty on a fully successful dump.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DumpManifest {
    pub process: ProcessInfo,
    pub files: Vec<DumpFileRecord>,
    pub errors: Vec<RegionDumpError>,
    pub created_at: DateTime<Utc>,
}

impl DumpManifest {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    pub fn paths(&self) -> BTreeSet<&Path> {
        self.files.iter().map(|f| f.path.as_path()).collect()
    }
}
