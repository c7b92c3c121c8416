use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a live process captured at locate time. Attached to every
/// result record; never refreshed after the scan or dump it belongs to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cmd: Vec<String>,
}

/// Half-open span of a process's address space.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressRange {
    pub start: u64,
    pub end: u64,
}

impl AddressRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "inverted address range");
        AddressRange { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}-{:#x}", self.start, self.end)
    }
}

/// One mapped region as reported by the host, e.g. a `/proc/<pid>/maps` row.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MemoryRegion {
    pub range: AddressRange,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    pub shared: bool,
    /// Backing path or kernel label (`[heap]`, `[stack]`, ...), if any.
    pub label: Option<String>,
}

impl MemoryRegion {
    /// Whether the region can be read through the process memory interface.
    /// Kernel-owned pseudo mappings are excluded up front; reads against
    /// them either fault or return data that is not part of the process.
    pub fn is_accessible(&self) -> bool {
        if !self.readable {
            return false;
        }
        !matches!(self.label.as_deref(), Some("[vvar]") | Some("[vsyscall]"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_range_len_and_contains() {
        let range = AddressRange::new(0x1000, 0x3000);
        assert_eq!(range.len(), 0x2000);
        assert!(range.contains(0x1000));
        assert!(range.contains(0x2fff));
        assert!(!range.contains(0x3000));
        assert!(!range.contains(0xfff));
    }

    #[test]
    fn test_vvar_region_is_not_accessible() {
        let region = MemoryRegion {
            range: AddressRange::new(0x7fff_0000, 0x7fff_2000),
            readable: true,
            writable: false,
            executable: false,
            shared: false,
            label: Some("[vvar]".to_string()),
        };
        assert!(!region.is_accessible());
    }

    #[test]
    fn test_unreadable_region_is_not_accessible() {
        let region = MemoryRegion {
            range: AddressRange::new(0x1000, 0x2000),
            readable: false,
            writable: true,
            executable: false,
            shared: false,
            label: None,
        };
        assert!(!region.is_accessible());
    }
}
