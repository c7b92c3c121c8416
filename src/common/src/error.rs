use crate::types::process::AddressRange;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Process enumeration itself failed. Distinct from a pattern matching
/// zero processes, which is an ordinary empty result.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("process enumeration failed: {0}")]
    Enumeration(#[from] io::Error),
}

/// Fatal fault while scanning one process. Other processes matched by the
/// same request are unaffected.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to open memory of pid {pid}: {source}")]
    OpenProcess { pid: u32, source: io::Error },

    #[error("failed to enumerate regions of pid {pid}: {source}")]
    Regions { pid: u32, source: io::Error },

    #[error("process {pid} vanished during scan")]
    ProcessVanished { pid: u32 },
}

/// Recoverable per-region fault. Recorded and skipped; never propagated
/// past the region it occurred in.
#[derive(Debug, Error)]
#[error("failed to read region {range} of pid {pid}: {source}")]
pub struct RegionReadError {
    pub pid: u32,
    pub range: AddressRange,
    pub source: io::Error,
}

/// Fatal fault while dumping one process: the dump yields no manifest and
/// no files. Region-level faults go into the manifest's error list instead.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("failed to open memory of pid {pid}: {source}")]
    OpenProcess { pid: u32, source: io::Error },

    #[error("failed to enumerate regions of pid {pid}: {source}")]
    Regions { pid: u32, source: io::Error },

    #[error("failed to prepare dump directory {dir}: {source}")]
    OutputDir { dir: PathBuf, source: io::Error },
}
