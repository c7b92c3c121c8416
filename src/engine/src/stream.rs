use anyhow::Result;
use memscan_common::recorder::ResultRecorder;
use memscan_common::types::dump::DumpManifest;
use memscan_common::types::flow::FlowResult;
use memscan_common::types::scan::ProcessScanResult;

/// Emits one dump onto the result stream: the manifest record first, then
/// one file-part record per manifest entry in manifest order. Downstream
/// verification correlates the two positionally and by path, so this
/// ordering is load-bearing.
pub async fn stream_dump(manifest: DumpManifest, recorder: &ResultRecorder) -> Result<usize> {
    let files = manifest.files.clone();
    recorder.emit(FlowResult::Manifest(manifest)).await?;

    let mut emitted = 1usize;
    for file in files {
        recorder.emit(FlowResult::FilePart(file)).await?;
        emitted += 1;
    }
    Ok(emitted)
}

pub async fn stream_scan(result: ProcessScanResult, recorder: &ResultRecorder) -> Result<()> {
    recorder.emit(FlowResult::Scan(result)).await
}
