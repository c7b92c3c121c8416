use crate::memory::{is_process_gone, ProcessMemory};
use crate::signature::{Condition, SignatureSet};
use chrono::Utc;
use memscan_common::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RESULTS_PER_PROCESS};
use memscan_common::error::{RegionReadError, ScanError};
use memscan_common::types::process::{MemoryRegion, ProcessInfo};
use memscan_common::types::scan::{ProcessScanResult, RuleMatch, StringMatch};
use std::io;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct ScanOptions {
    /// Rule matches retained per process; the scan stops once reached.
    pub max_results: usize,
    /// Bounds the whole per-process scan. Expiry yields the partial
    /// result collected so far.
    pub deadline: Option<Duration>,
    pub chunk_size: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            max_results: DEFAULT_MAX_RESULTS_PER_PROCESS,
            deadline: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Accumulates rule matches up to the cap and stamps identity and timing
/// onto the final record. Pure bookkeeping; all I/O stays in the scan loop.
struct ScanResultBuilder {
    matches: Vec<RuleMatch>,
    cap: usize,
    truncated: bool,
    skipped_regions: u32,
    started: Instant,
}

impl ScanResultBuilder {
    fn new(cap: usize, started: Instant) -> Self {
        ScanResultBuilder {
            matches: Vec::new(),
            cap: cap.max(1),
            truncated: false,
            skipped_regions: 0,
            started,
        }
    }

    fn push(&mut self, rule_match: RuleMatch) {
        if self.matches.len() < self.cap {
            self.matches.push(rule_match);
        }
    }

    fn is_full(&self) -> bool {
        self.matches.len() >= self.cap
    }

    fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    fn skip_region(&mut self) {
        self.skipped_regions += 1;
    }

    fn finish(self, process: ProcessInfo) -> ProcessScanResult {
        ProcessScanResult {
            process,
            matches: self.matches,
            scan_time_us: self.started.elapsed().as_micros() as u64,
            truncated: self.truncated,
            skipped_regions: self.skipped_regions,
            scanned_at: Utc::now(),
        }
    }
}

enum RegionScan {
    Completed,
    Stopped,
}

/// Scans one process against a compiled signature set.
///
/// Regions are walked in address order and read in chunks; given identical
/// memory content and options, the returned match set is identical down to
/// truncation (rules in declaration order, matches in address order). A
/// read failure inside one region skips the rest of that region only; the
/// process disappearing aborts the scan.
pub fn scan(
    mem: &dyn ProcessMemory,
    process: &ProcessInfo,
    signatures: &SignatureSet,
    options: &ScanOptions,
    cancel: &CancellationToken,
) -> Result<ProcessScanResult, ScanError> {
    let pid = mem.pid();
    let started = Instant::now();
    let mut builder = ScanResultBuilder::new(options.max_results, started);

    let regions = mem.regions().map_err(|e| {
        if is_process_gone(&e) {
            ScanError::ProcessVanished { pid }
        } else {
            ScanError::Regions { pid, source: e }
        }
    })?;

    for region in regions.iter().filter(|r| r.is_accessible()) {
        if stop_requested(started, options, cancel) {
            builder.mark_truncated();
            break;
        }
        match scan_region(mem, region, signatures, options, started, cancel, &mut builder) {
            Ok(RegionScan::Completed) => {}
            Ok(RegionScan::Stopped) => break,
            Err(e) if is_process_gone(&e) => return Err(ScanError::ProcessVanished { pid }),
            Err(source) => {
                let err = RegionReadError {
                    pid,
                    range: region.range,
                    source,
                };
                debug!(error = %err, "skipping unreadable region");
                builder.skip_region();
            }
        }
    }

    Ok(builder.finish(process.clone()))
}

fn scan_region(
    mem: &dyn ProcessMemory,
    region: &MemoryRegion,
    signatures: &SignatureSet,
    options: &ScanOptions,
    started: Instant,
    cancel: &CancellationToken,
    builder: &mut ScanResultBuilder,
) -> io::Result<RegionScan> {
    let overlap = signatures.max_pattern_len().saturating_sub(1);
    let chunk_size = options.chunk_size.max(1);

    // Per-string hits for `All` rules, settled once the region is done.
    let mut all_hits: Vec<Vec<Vec<StringMatch>>> = signatures
        .rules()
        .iter()
        .map(|rule| vec![Vec::new(); rule.strings().len()])
        .collect();

    let mut carry: Vec<u8> = Vec::new();
    let mut addr = region.range.start;

    while addr < region.range.end {
        if stop_requested(started, options, cancel) {
            builder.mark_truncated();
            return Ok(RegionScan::Stopped);
        }

        let want = ((region.range.end - addr) as usize).min(chunk_size);
        let carry_len = carry.len();
        let mut buf = std::mem::take(&mut carry);
        buf.resize(carry_len + want, 0);
        mem.read_exact_at(addr, &mut buf[carry_len..])?;

        // Address of buf[0]; the carried bytes sit just below `addr`.
        let base = addr - carry_len as u64;

        for (rule_idx, rule) in signatures.rules().iter().enumerate() {
            for (string_idx, pattern) in rule.strings().iter().enumerate() {
                for start in pattern.find_in(&buf) {
                    // Matches contained in the carried tail were already
                    // reported by the previous chunk.
                    if start + pattern.len() <= carry_len {
                        continue;
                    }
                    let string_match = StringMatch {
                        string_id: pattern.id().to_string(),
                        offset: base + start as u64,
                        data: buf[start..start + pattern.len()].to_vec(),
                    };
                    match rule.condition() {
                        Condition::Any => {
                            builder.push(RuleMatch {
                                rule: rule.name().to_string(),
                                string_matches: vec![string_match],
                            });
                            if builder.is_full() {
                                builder.mark_truncated();
                                return Ok(RegionScan::Stopped);
                            }
                        }
                        Condition::All => {
                            all_hits[rule_idx][string_idx].push(string_match);
                        }
                    }
                }
            }
        }

        let keep = overlap.min(buf.len());
        carry = buf[buf.len() - keep..].to_vec();
        addr += want as u64;
    }

    for (rule_idx, rule) in signatures.rules().iter().enumerate() {
        if rule.condition() != Condition::All {
            continue;
        }
        let hits = &all_hits[rule_idx];
        if hits.iter().all(|h| !h.is_empty()) {
            builder.push(RuleMatch {
                rule: rule.name().to_string(),
                string_matches: hits.concat(),
            });
            if builder.is_full() {
                builder.mark_truncated();
                return Ok(RegionScan::Stopped);
            }
        }
    }

    Ok(RegionScan::Completed)
}

fn stop_requested(started: Instant, options: &ScanOptions, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return true;
    }
    options
        .deadline
        .map_or(false, |deadline| started.elapsed() >= deadline)
}
