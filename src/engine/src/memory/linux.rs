use crate::memory::ProcessMemory;
use memscan_common::types::process::{AddressRange, MemoryRegion};
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::fs::FileExt;

/// Live process memory backed by `/proc/<pid>/mem`, with regions taken
/// from `/proc/<pid>/maps`. Opening the mem file is the structural step:
/// if it fails, the process cannot be scanned or dumped at all.
pub struct LinuxProcessMemory {
    pid: u32,
    mem: File,
}

impl LinuxProcessMemory {
    pub fn open(pid: u32) -> io::Result<Self> {
        let mem = File::open(format!("/proc/{pid}/mem"))?;
        Ok(LinuxProcessMemory { pid, mem })
    }
}

impl ProcessMemory for LinuxProcessMemory {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn regions(&self) -> io::Result<Vec<MemoryRegion>> {
        let mut maps = String::new();
        File::open(format!("/proc/{}/maps", self.pid))?.read_to_string(&mut maps)?;

        let mut regions: Vec<MemoryRegion> = maps.lines().filter_map(parse_maps_line).collect();
        regions.sort_by_key(|r| r.range.start);
        Ok(regions)
    }

    fn read_at(&self, addr: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.mem.read_at(buf, addr)
    }
}

/// Parses one `/proc/<pid>/maps` row:
/// `55d3a8a000-55d3a8c000 r-xp 00002000 fd:01 1834033  /usr/bin/memscand`
fn parse_maps_line(line: &str) -> Option<MemoryRegion> {
    let mut fields = line.split_whitespace();
    let range = fields.next()?;
    let perms = fields.next()?;
    let _offset = fields.next()?;
    let _dev = fields.next()?;
    let _inode = fields.next()?;
    let label = {
        let rest: Vec<&str> = fields.collect();
        if rest.is_empty() {
            None
        } else {
            Some(rest.join(" "))
        }
    };

    let (start, end) = range.split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;

    let perms = perms.as_bytes();
    if perms.len() < 4 {
        return None;
    }

    Some(MemoryRegion {
        range: AddressRange::new(start, end),
        readable: perms[0] == b'r',
        writable: perms[1] == b'w',
        executable: perms[2] == b'x',
        shared: perms[3] == b's',
        label,
    })
}
