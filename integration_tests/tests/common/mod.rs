#![allow(dead_code)]

use memscan_common::types::flow::FlowResult;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tokio::sync::mpsc::Receiver;

/// Name prefix matching this test binary's own process, the way the flow
/// transport would target the fleet agent by its binary name.
pub fn own_name_prefix() -> String {
    let exe = std::env::current_exe().unwrap();
    let name = exe.file_name().unwrap().to_str().unwrap();
    // The kernel truncates process names to 15 bytes.
    name.chars().take(6).collect()
}

pub fn own_full_name() -> String {
    let exe = std::env::current_exe().unwrap();
    let name = exe.file_name().unwrap().to_str().unwrap();
    name.chars().take(15).collect()
}

/// Stand-in for the file-content retrieval service: reads up to `len`
/// bytes from the start of a previously produced dump file.
pub fn read_prefix(path: &Path, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    let mut file = File::open(path).unwrap();
    let mut done = 0;
    while done < len {
        match file.read(&mut buf[done..]).unwrap() {
            0 => break,
            n => done += n,
        }
    }
    buf.truncate(done);
    buf
}

pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub async fn collect_results(mut rx: Receiver<FlowResult>) -> Vec<FlowResult> {
    let mut results = Vec::new();
    while let Some(result) = rx.recv().await {
        results.push(result);
    }
    results
}
