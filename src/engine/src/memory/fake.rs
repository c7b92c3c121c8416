//! In-memory process double used by unit and integration tests.

use crate::memory::{MemorySource, ProcessMemory};
use memscan_common::types::process::{AddressRange, MemoryRegion, ProcessInfo};
use std::io;

#[derive(Clone)]
struct FakeRegion {
    region: MemoryRegion,
    bytes: Vec<u8>,
    fail_reads: bool,
}

/// A process whose "memory" is a handful of byte buffers at fixed
/// addresses. Regions read back exactly what was planted; a region marked
/// failing is enumerated but every read inside it errors, which is how
/// partial-failure paths are exercised.
#[derive(Clone)]
pub struct FakeProcessMemory {
    pid: u32,
    regions: Vec<FakeRegion>,
}

impl FakeProcessMemory {
    pub fn new(pid: u32) -> Self {
        FakeProcessMemory {
            pid,
            regions: Vec::new(),
        }
    }

    pub fn with_region(mut self, start: u64, bytes: Vec<u8>) -> Self {
        let range = AddressRange::new(start, start + bytes.len() as u64);
        self.regions.push(FakeRegion {
            region: MemoryRegion {
                range,
                readable: true,
                writable: true,
                executable: false,
                shared: false,
                label: None,
            },
            bytes,
            fail_reads: false,
        });
        self.regions.sort_by_key(|r| r.region.range.start);
        self
    }

    pub fn with_failing_region(mut self, start: u64, len: u64) -> Self {
        self.regions.push(FakeRegion {
            region: MemoryRegion {
                range: AddressRange::new(start, start + len),
                readable: true,
                writable: false,
                executable: false,
                shared: false,
                label: None,
            },
            bytes: Vec::new(),
            fail_reads: true,
        });
        self.regions.sort_by_key(|r| r.region.range.start);
        self
    }

    pub fn process_info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            name: format!("fake-{}", self.pid),
            cmd: vec![],
        }
    }
}

impl ProcessMemory for FakeProcessMemory {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn regions(&self) -> io::Result<Vec<MemoryRegion>> {
        Ok(self.regions.iter().map(|r| r.region.clone()).collect())
    }

    fn read_at(&self, addr: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Some(fake) = self.regions.iter().find(|r| r.region.range.contains(addr)) else {
            return Err(io::Error::from_raw_os_error(libc::EIO));
        };
        if fake.fail_reads {
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }

        let offset = (addr - fake.region.range.start) as usize;
        let available = fake.bytes.len() - offset;
        let n = buf.len().min(available);
        buf[..n].copy_from_slice(&fake.bytes[offset..offset + n]);
        Ok(n)
    }
}

/// [`MemorySource`] that hands out clones of one fake process regardless
/// of the pid asked for. Lets a full flow run against a real locator while
/// every memory read stays deterministic.
pub struct FakeMemorySource {
    template: FakeProcessMemory,
}

impl FakeMemorySource {
    pub fn new(template: FakeProcessMemory) -> Self {
        FakeMemorySource { template }
    }
}

impl MemorySource for FakeMemorySource {
    fn attach(&self, process: &ProcessInfo) -> io::Result<Box<dyn ProcessMemory>> {
        let mut fake = self.template.clone();
        fake.pid = process.pid;
        Ok(Box::new(fake))
    }
}
