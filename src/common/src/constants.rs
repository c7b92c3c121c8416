/// Matches retained per process before a scan stops early.
pub const DEFAULT_MAX_RESULTS_PER_PROCESS: usize = 10;

/// Read granularity for both scanning and dumping.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Part files are rotated once they reach this many bytes.
pub const DEFAULT_DUMP_BYTE_LIMIT: u64 = 128 * 1024 * 1024;

pub const DEFAULT_OUTPUT_DIR: &str = "/tmp/memscan_dumps";

pub const DEFAULT_RESULT_CHANNEL_CAPACITY: usize = 100;

pub const DEFAULT_LINUX_BINARY_NAME: &str = "memscand";
pub const DEFAULT_WINDOWS_BINARY_NAME: &str = "MemscanService.exe";
pub const DEFAULT_DARWIN_BINARY_NAME: &str = "memscan";
