use memscan_common::types::process::{MemoryRegion, ProcessInfo};
use std::io;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "linux")]
pub use linux::LinuxProcessMemory;

#[cfg(any(test, feature = "testing"))]
pub mod fake;

#[cfg(any(test, feature = "testing"))]
pub use fake::{FakeMemorySource, FakeProcessMemory};

/// Read access to one live process's address space. Implementations must
/// report regions in ascending address order; scan determinism and the
/// dump round-trip law both depend on it.
pub trait ProcessMemory: Send {
    fn pid(&self) -> u32;

    fn regions(&self) -> io::Result<Vec<MemoryRegion>>;

    /// Read up to `buf.len()` bytes starting at `addr`. Short reads are
    /// allowed at region boundaries.
    fn read_at(&self, addr: u64, buf: &mut [u8]) -> io::Result<usize>;

    fn read_exact_at(&self, addr: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut done = 0usize;
        while done < buf.len() {
            match self.read_at(addr + done as u64, &mut buf[done..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("short read at {:#x}", addr + done as u64),
                    ));
                }
                Ok(n) => done += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Whether a read failure means the target process is gone rather than a
/// single region being unreadable.
pub fn is_process_gone(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ESRCH) || err.kind() == io::ErrorKind::NotFound
}

/// Attaches a [`ProcessMemory`] to a located process. The live source is
/// the default; tests substitute an in-memory double at the same seam.
pub trait MemorySource: Send + Sync + 'static {
    fn attach(&self, process: &ProcessInfo) -> io::Result<Box<dyn ProcessMemory>>;
}

/// Attaches to real processes through the host's process memory interface.
pub struct LiveMemorySource;

impl MemorySource for LiveMemorySource {
    #[cfg(target_os = "linux")]
    fn attach(&self, process: &ProcessInfo) -> io::Result<Box<dyn ProcessMemory>> {
        Ok(Box::new(LinuxProcessMemory::open(process.pid)?))
    }

    #[cfg(not(target_os = "linux"))]
    fn attach(&self, _process: &ProcessInfo) -> io::Result<Box<dyn ProcessMemory>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "live process memory access is only implemented for linux",
        ))
    }
}
