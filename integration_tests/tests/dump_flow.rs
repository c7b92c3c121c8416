mod common;

use memscan_client::flows::DumpFlow;
use memscan_common::recorder::ResultRecorder;
use memscan_common::target_process::NamePattern;
use memscan_common::types::flow::{DumpRequest, FlowResult};
use memscan_engine::memory::{FakeMemorySource, FakeProcessMemory};
use serial_test::serial;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const CHUNK_SIZE: usize = 64 * 1024;

fn dump_request(output_dir: &Path, byte_limit: Option<u64>) -> DumpRequest {
    DumpRequest {
        pattern: NamePattern::new(common::own_full_name()),
        byte_limit,
        max_region_size: None,
        output_dir: output_dir.to_path_buf(),
    }
}

async fn run_fake_dump(
    fake: FakeProcessMemory,
    request: DumpRequest,
) -> (memscan_client::flows::FlowSummary, Vec<FlowResult>) {
    let (recorder, rx) = ResultRecorder::channel(100);
    // Drain concurrently; emission must never depend on the flow finishing.
    let collector = tokio::spawn(common::collect_results(rx));
    let flow = DumpFlow::new(request, CHUNK_SIZE, recorder, CancellationToken::new())
        .with_memory_source(Arc::new(FakeMemorySource::new(fake)));
    let summary = flow.run().await.unwrap();
    let results = collector.await.unwrap();
    (summary, results)
}

#[tokio::test]
#[serial]
async fn test_dump_stream_is_manifest_first_and_positional() {
    let dir = tempfile::tempdir().unwrap();
    let region_a = common::patterned(5000);
    let region_b = common::patterned(300);
    let fake = FakeProcessMemory::new(0)
        .with_region(0x1000, region_a)
        .with_region(0x9000, region_b);

    let (summary, results) = run_fake_dump(fake, dump_request(dir.path(), Some(2048))).await;
    assert_eq!(summary.matched, 1);
    assert_eq!(summary.failed, 0);

    let FlowResult::Manifest(manifest) = &results[0] else {
        panic!("first record must be the manifest");
    };
    assert!(manifest.errors.is_empty());
    // 5000 bytes at 2048/part -> 3 files, plus 1 for the small region.
    assert_eq!(manifest.files.len(), 4);
    assert_eq!(results.len(), manifest.files.len() + 1);

    // Per-file records correspond positionally to the manifest's list.
    let mut streamed_paths = BTreeSet::new();
    for (i, record) in results[1..].iter().enumerate() {
        let FlowResult::FilePart(part) = record else {
            panic!("expected a file part at position {}", i + 1);
        };
        assert_eq!(part, &manifest.files[i]);
        streamed_paths.insert(part.path.clone());
    }

    // The manifest's path set equals the streamed path set exactly.
    let manifest_paths: BTreeSet<_> = manifest.files.iter().map(|f| f.path.clone()).collect();
    assert_eq!(manifest_paths, streamed_paths);
}

#[tokio::test]
#[serial]
async fn test_dump_round_trip_reconstructs_region_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let planted = common::patterned(5000);
    let fake = FakeProcessMemory::new(0).with_region(0x1000, planted.clone());

    let (_, results) = run_fake_dump(fake, dump_request(dir.path(), Some(2048))).await;
    let FlowResult::Manifest(manifest) = &results[0] else {
        panic!("first record must be the manifest");
    };

    // Concatenating the parts in range order reproduces the region.
    let mut files = manifest.files.clone();
    files.sort_by_key(|f| f.range.start);
    let mut reassembled = Vec::new();
    for file in &files {
        let bytes = std::fs::read(&file.path).unwrap();
        assert_eq!(bytes.len() as u64, file.size);
        reassembled.extend(bytes);
    }
    assert_eq!(reassembled, planted);

    // A partial re-read of a part matches the head of its slice.
    let first = &files[0];
    let prefix = common::read_prefix(&first.path, 10);
    assert_eq!(prefix, planted[..10]);
}

#[tokio::test]
#[serial]
async fn test_dump_records_failing_region_without_losing_others() {
    let dir = tempfile::tempdir().unwrap();
    let good = common::patterned(600);
    let fake = FakeProcessMemory::new(0)
        .with_region(0x1000, good.clone())
        .with_failing_region(0x5000, 0x1000)
        .with_region(0x9000, good.clone());

    let (summary, results) = run_fake_dump(fake, dump_request(dir.path(), None)).await;
    assert_eq!(summary.failed, 0, "a bad region is not a failed process");

    let FlowResult::Manifest(manifest) = &results[0] else {
        panic!("first record must be the manifest");
    };
    assert_eq!(manifest.errors.len(), 1);
    assert_eq!(manifest.errors[0].range.start, 0x5000);
    assert_eq!(manifest.files.len(), 2);
    for file in &manifest.files {
        assert_eq!(std::fs::read(&file.path).unwrap(), good);
    }
}

#[tokio::test]
#[serial]
async fn test_dump_of_process_with_no_regions_emits_only_the_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeProcessMemory::new(0);

    let (summary, results) = run_fake_dump(fake, dump_request(dir.path(), Some(4096))).await;
    assert_eq!(summary.matched, 1);

    assert_eq!(results.len(), 1);
    let FlowResult::Manifest(manifest) = &results[0] else {
        panic!("the only record must be the manifest");
    };
    assert!(manifest.files.is_empty());
    assert!(manifest.errors.is_empty());
}

#[tokio::test]
#[serial]
async fn test_dump_flow_against_own_small_regions() {
    let dir = tempfile::tempdir().unwrap();
    let request = DumpRequest {
        pattern: NamePattern::new(common::own_full_name()),
        byte_limit: Some(64 * 1024),
        max_region_size: Some(256 * 1024),
        output_dir: dir.path().to_path_buf(),
    };

    let (recorder, rx) = ResultRecorder::channel(1000);
    let collector = tokio::spawn(common::collect_results(rx));
    let flow = DumpFlow::new(request, CHUNK_SIZE, recorder, CancellationToken::new());
    let summary = flow.run().await.unwrap();
    assert_eq!(summary.matched, 1, "the pattern should match only this process");

    let results = collector.await.unwrap();
    let FlowResult::Manifest(manifest) = &results[0] else {
        panic!("first record must be the manifest");
    };
    assert_eq!(manifest.process.pid, std::process::id());
    assert!(!manifest.files.is_empty());
    assert_eq!(results.len(), manifest.files.len() + 1);

    for (i, record) in results[1..].iter().enumerate() {
        let FlowResult::FilePart(part) = record else {
            panic!("expected a file part at position {}", i + 1);
        };
        assert_eq!(part, &manifest.files[i]);

        let on_disk = std::fs::metadata(&part.path).unwrap().len();
        assert_eq!(on_disk, part.size);
        assert_eq!(part.size, part.range.len());
        assert!(part.size > 0);

        let prefix = common::read_prefix(&part.path, 10);
        assert_eq!(prefix.len(), 10.min(part.size as usize));
    }
}
