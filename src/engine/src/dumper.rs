use crate::memory::ProcessMemory;
use chrono::Utc;
use memscan_common::constants::DEFAULT_CHUNK_SIZE;
use memscan_common::error::{DumpError, RegionReadError};
use memscan_common::types::dump::{DumpFileRecord, DumpManifest, RegionDumpError};
use memscan_common::types::process::{AddressRange, MemoryRegion, ProcessInfo};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct DumpOptions {
    /// Rotate part files at this many bytes. `None` keeps one file per
    /// region regardless of its size.
    pub byte_limit: Option<u64>,
    /// Skip regions larger than this many bytes.
    pub max_region_size: Option<u64>,
    pub output_dir: PathBuf,
    pub chunk_size: usize,
}

impl DumpOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        DumpOptions {
            byte_limit: None,
            max_region_size: None,
            output_dir: output_dir.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

enum RegionDump {
    Done(Vec<DumpFileRecord>),
    Cancelled,
}

/// Dumps every accessible region of one process to part files.
///
/// A region that fails to read contributes exactly one entry to the
/// manifest's `errors` and no files; the remaining regions are still
/// dumped. Zero accessible regions is a success with an empty manifest.
/// Part file names derive from process identity plus a sequence number,
/// so a later reader can correlate manifest entries without ambiguity.
pub fn dump(
    mem: &dyn ProcessMemory,
    process: &ProcessInfo,
    options: &DumpOptions,
    cancel: &CancellationToken,
) -> Result<DumpManifest, DumpError> {
    let pid = mem.pid();

    fs::create_dir_all(&options.output_dir).map_err(|source| DumpError::OutputDir {
        dir: options.output_dir.clone(),
        source,
    })?;

    let regions = mem
        .regions()
        .map_err(|source| DumpError::Regions { pid, source })?;

    let prefix = format!("{}_{}", sanitize_name(&process.name), pid);
    let mut files: Vec<DumpFileRecord> = Vec::new();
    let mut errors: Vec<RegionDumpError> = Vec::new();
    let mut seq = 0u32;

    for region in regions.iter().filter(|r| r.is_accessible()) {
        if cancel.is_cancelled() {
            break;
        }
        if let Some(cap) = options.max_region_size {
            if region.range.len() > cap {
                debug!(pid, region = %region.range, cap, "region over size cap, not dumped");
                continue;
            }
        }

        match dump_region(mem, region, options, &prefix, &mut seq, cancel) {
            Ok(RegionDump::Done(parts)) => files.extend(parts),
            Ok(RegionDump::Cancelled) => {
                errors.push(RegionDumpError {
                    range: region.range,
                    error: "dump cancelled".to_string(),
                });
                break;
            }
            Err(source) => {
                let err = RegionReadError {
                    pid,
                    range: region.range,
                    source,
                };
                warn!(error = %err, "region dump failed");
                errors.push(RegionDumpError {
                    range: region.range,
                    error: err.to_string(),
                });
            }
        }
    }

    Ok(DumpManifest {
        process: process.clone(),
        files,
        errors,
        created_at: Utc::now(),
    })
}

/// Writes one region into `ceil(len / byte_limit)` part files. On any
/// failure the region's already-written parts are removed, so the manifest
/// never references a file whose range it cannot vouch for.
fn dump_region(
    mem: &dyn ProcessMemory,
    region: &MemoryRegion,
    options: &DumpOptions,
    prefix: &str,
    seq: &mut u32,
    cancel: &CancellationToken,
) -> io::Result<RegionDump> {
    let part_limit = options.byte_limit.unwrap_or(region.range.len()).max(1);
    let chunk_size = options.chunk_size.max(1);

    let mut parts: Vec<DumpFileRecord> = Vec::new();
    let mut addr = region.range.start;

    while addr < region.range.end {
        let part_len = part_limit.min(region.range.end - addr);
        let path = options
            .output_dir
            .join(format!("{prefix}_{seq:04}.bin"));
        *seq += 1;

        match write_part(mem, addr, part_len, &path, chunk_size, cancel) {
            Ok(true) => {}
            Ok(false) => {
                let _ = fs::remove_file(&path);
                remove_parts(&parts);
                return Ok(RegionDump::Cancelled);
            }
            Err(e) => {
                let _ = fs::remove_file(&path);
                remove_parts(&parts);
                return Err(e);
            }
        }

        parts.push(DumpFileRecord {
            path,
            size: part_len,
            range: AddressRange::new(addr, addr + part_len),
        });
        addr += part_len;
    }

    Ok(RegionDump::Done(parts))
}

/// Returns Ok(false) when cancelled mid-part.
fn write_part(
    mem: &dyn ProcessMemory,
    start: u64,
    len: u64,
    path: &Path,
    chunk_size: usize,
    cancel: &CancellationToken,
) -> io::Result<bool> {
    let mut file = File::create(path)?;
    let mut buf = vec![0u8; chunk_size];
    let mut done = 0u64;

    while done < len {
        if cancel.is_cancelled() {
            return Ok(false);
        }
        let take = ((len - done) as usize).min(chunk_size);
        mem.read_exact_at(start + done, &mut buf[..take])?;
        file.write_all(&buf[..take])?;
        done += take as u64;
    }

    file.flush()?;
    Ok(true)
}

fn remove_parts(parts: &[DumpFileRecord]) {
    for part in parts {
        let _ = fs::remove_file(&part.path);
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_whitespace() {
                '_'
            } else {
                c
            }
        })
        .collect()
}
