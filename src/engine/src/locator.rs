use memscan_common::error::LookupError;
use memscan_common::target_process::NamePattern;
use memscan_common::types::process::ProcessInfo;
use sysinfo::{ProcessRefreshKind, System};
use tracing::debug;

/// Resolves a name pattern to the live processes currently matching it.
/// Zero matches is an ordinary empty result; only a failure to enumerate
/// processes at all surfaces as [`LookupError`].
pub struct ProcessLocator {
    system: System,
}

impl ProcessLocator {
    pub fn new() -> Self {
        ProcessLocator {
            system: System::new(),
        }
    }

    pub fn locate(&mut self, pattern: &NamePattern) -> Result<Vec<ProcessInfo>, LookupError> {
        probe_enumeration_source()?;

        self.system
            .refresh_processes_specifics(ProcessRefreshKind::everything());

        let mut matched: Vec<ProcessInfo> = self
            .system
            .processes()
            .iter()
            .filter(|(_, process)| pattern.matches(process.name()))
            .map(|(pid, process)| ProcessInfo {
                pid: pid.as_u32(),
                name: process.name().to_string(),
                cmd: process.cmd().to_vec(),
            })
            .collect();

        // Stable output order regardless of process-table iteration order.
        matched.sort_by_key(|p| p.pid);

        debug!(
            pattern = %pattern,
            matched = matched.len(),
            "process lookup finished"
        );
        Ok(matched)
    }
}

impl Default for ProcessLocator {
    fn default() -> Self {
        Self::new()
    }
}

/// The process table itself can be unreadable (restricted /proc mounts,
/// hardened containers). sysinfo swallows that into an empty table, so the
/// source is probed directly to keep "no access" distinct from "no match".
#[cfg(target_os = "linux")]
fn probe_enumeration_source() -> Result<(), LookupError> {
    std::fs::read_dir("/proc")?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn probe_enumeration_source() -> Result<(), LookupError> {
    Ok(())
}
