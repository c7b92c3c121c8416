use anyhow::Result;
use memscan_common::error::{DumpError, LookupError, ScanError};
use memscan_common::recorder::ResultRecorder;
use memscan_common::target_process::NamePattern;
use memscan_common::types::flow::{DumpRequest, ScanRequest};
use memscan_common::types::process::ProcessInfo;
use memscan_common::types::scan::ProcessScanResult;
use memscan_engine::dumper::{self, DumpOptions};
use memscan_engine::locator::ProcessLocator;
use memscan_engine::memory::{is_process_gone, LiveMemorySource, MemorySource};
use memscan_engine::scanner::{self, ScanOptions};
use memscan_engine::signature::SignatureSet;
use memscan_engine::stream;
use std::io;
use std::sync::Arc;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// What one flow did: processes matched by the pattern, result records put
/// on the stream, and per-process units that failed. A failed unit never
/// affects its siblings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowSummary {
    pub matched: usize,
    pub emitted: usize,
    pub failed: usize,
}

async fn locate(pattern: NamePattern) -> Result<Vec<ProcessInfo>, LookupError> {
    task::spawn_blocking(move || ProcessLocator::new().locate(&pattern))
        .await
        .map_err(|e| LookupError::Enumeration(io::Error::new(io::ErrorKind::Other, e)))?
}

/// Scans every process matching the request's pattern against one shared
/// compiled signature set, emitting a [`ProcessScanResult`] per process.
pub struct ScanFlow {
    flow_id: Uuid,
    signatures: Arc<SignatureSet>,
    request: ScanRequest,
    chunk_size: usize,
    recorder: ResultRecorder,
    cancel: CancellationToken,
    memory: Arc<dyn MemorySource>,
}

impl ScanFlow {
    pub fn new(
        signatures: Arc<SignatureSet>,
        request: ScanRequest,
        chunk_size: usize,
        recorder: ResultRecorder,
        cancel: CancellationToken,
    ) -> Self {
        ScanFlow {
            flow_id: Uuid::new_v4(),
            signatures,
            request,
            chunk_size,
            recorder,
            cancel,
            memory: Arc::new(LiveMemorySource),
        }
    }

    pub fn with_memory_source(mut self, memory: Arc<dyn MemorySource>) -> Self {
        self.memory = memory;
        self
    }

    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    pub async fn run(self) -> Result<FlowSummary, LookupError> {
        info!(
            flow_id = %self.flow_id,
            pattern = %self.request.pattern,
            cap = self.request.max_results_per_process,
            "starting scan flow"
        );
        let processes = locate(self.request.pattern.clone()).await?;
        let matched = processes.len();

        let options = ScanOptions {
            max_results: self.request.max_results_per_process,
            deadline: self.request.deadline,
            chunk_size: self.chunk_size,
        };

        let mut join_set = JoinSet::new();
        for process in processes {
            let signatures = Arc::clone(&self.signatures);
            let memory = Arc::clone(&self.memory);
            let recorder = self.recorder.clone();
            let cancel = self.cancel.clone();
            let options = options.clone();
            join_set.spawn(async move {
                scan_one_process(process, signatures, memory, options, cancel, recorder).await
            });
        }

        let (emitted, failed) = drain(&mut join_set, self.flow_id).await;
        info!(flow_id = %self.flow_id, matched, emitted, failed, "scan flow finished");
        Ok(FlowSummary {
            matched,
            emitted,
            failed,
        })
    }
}

async fn scan_one_process(
    process: ProcessInfo,
    signatures: Arc<SignatureSet>,
    memory: Arc<dyn MemorySource>,
    options: ScanOptions,
    cancel: CancellationToken,
    recorder: ResultRecorder,
) -> Result<usize> {
    let pid = process.pid;
    let scanned: Result<ProcessScanResult, ScanError> =
        task::spawn_blocking(move || {
            let mem = memory.attach(&process).map_err(|source| {
                if is_process_gone(&source) {
                    ScanError::ProcessVanished { pid }
                } else {
                    ScanError::OpenProcess { pid, source }
                }
            })?;
            scanner::scan(mem.as_ref(), &process, &signatures, &options, &cancel)
        })
        .await?;

    match scanned {
        Ok(result) => {
            stream::stream_scan(result, &recorder).await?;
            Ok(1)
        }
        Err(e) => {
            warn!(pid, error = %e, "scan failed for process");
            Err(e.into())
        }
    }
}

/// Dumps every process matching the request's pattern, emitting each
/// process's manifest followed by its file parts.
pub struct DumpFlow {
    flow_id: Uuid,
    request: DumpRequest,
    chunk_size: usize,
    recorder: ResultRecorder,
    cancel: CancellationToken,
    memory: Arc<dyn MemorySource>,
}

impl DumpFlow {
    pub fn new(
        request: DumpRequest,
        chunk_size: usize,
        recorder: ResultRecorder,
        cancel: CancellationToken,
    ) -> Self {
        DumpFlow {
            flow_id: Uuid::new_v4(),
            request,
            chunk_size,
            recorder,
            cancel,
            memory: Arc::new(LiveMemorySource),
        }
    }

    pub fn with_memory_source(mut self, memory: Arc<dyn MemorySource>) -> Self {
        self.memory = memory;
        self
    }

    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    pub async fn run(self) -> Result<FlowSummary, LookupError> {
        info!(
            flow_id = %self.flow_id,
            pattern = %self.request.pattern,
            byte_limit = ?self.request.byte_limit,
            "starting dump flow"
        );
        let processes = locate(self.request.pattern.clone()).await?;
        let matched = processes.len();

        let options = DumpOptions {
            byte_limit: self.request.byte_limit,
            max_region_size: self.request.max_region_size,
            output_dir: self.request.output_dir.clone(),
            chunk_size: self.chunk_size,
        };

        let mut join_set = JoinSet::new();
        for process in processes {
            let memory = Arc::clone(&self.memory);
            let recorder = self.recorder.clone();
            let cancel = self.cancel.clone();
            let options = options.clone();
            join_set.spawn(async move {
                dump_one_process(process, memory, options, cancel, recorder).await
            });
        }

        let (emitted, failed) = drain(&mut join_set, self.flow_id).await;
        info!(flow_id = %self.flow_id, matched, emitted, failed, "dump flow finished");
        Ok(FlowSummary {
            matched,
            emitted,
            failed,
        })
    }
}

async fn dump_one_process(
    process: ProcessInfo,
    memory: Arc<dyn MemorySource>,
    options: DumpOptions,
    cancel: CancellationToken,
    recorder: ResultRecorder,
) -> Result<usize> {
    let pid = process.pid;
    let dumped = task::spawn_blocking(move || {
        let mem = memory
            .attach(&process)
            .map_err(|source| DumpError::OpenProcess { pid, source })?;
        dumper::dump(mem.as_ref(), &process, &options, &cancel)
    })
    .await?;

    match dumped {
        Ok(manifest) => {
            let records = stream::stream_dump(manifest, &recorder).await?;
            Ok(records)
        }
        Err(e) => {
            warn!(pid, error = %e, "dump failed for process");
            Err(e.into())
        }
    }
}

/// Collects per-process units, counting emitted records and failures.
/// A unit failing, or panicking, never takes the flow down with it.
async fn drain(join_set: &mut JoinSet<Result<usize>>, flow_id: Uuid) -> (usize, usize) {
    let mut emitted = 0usize;
    let mut failed = 0usize;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Ok(records)) => emitted += records,
            Ok(Err(_)) => failed += 1,
            Err(e) => {
                error!(flow_id = %flow_id, error = %e, "process task aborted");
                failed += 1;
            }
        }
    }
    (emitted, failed)
}
