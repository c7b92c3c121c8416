pub mod dump;
pub mod flow;
pub mod process;
pub mod scan;

pub use dump::{DumpFileRecord, DumpManifest, RegionDumpError};
pub use flow::{DumpRequest, FlowResult, ScanRequest};
pub use process::{AddressRange, MemoryRegion, ProcessInfo};
pub use scan::{ProcessScanResult, RuleMatch, StringMatch};
