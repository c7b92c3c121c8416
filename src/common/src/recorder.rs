use crate::types::flow::FlowResult;
use anyhow::{Context, Result};
use tokio::sync::mpsc::{self, Receiver, Sender};

/// Emitter side of a flow's result stream. Cheap to clone; every task of
/// one flow shares the same channel, and the transport drains the receiver
/// in send order.
#[derive(Clone)]
pub struct ResultRecorder {
    tx: Sender<FlowResult>,
}

impl ResultRecorder {
    pub fn new(tx: Sender<FlowResult>) -> Self {
        ResultRecorder { tx }
    }

    pub fn channel(capacity: usize) -> (Self, Receiver<FlowResult>) {
        let (tx, rx) = mpsc::channel::<FlowResult>(capacity);
        (ResultRecorder::new(tx), rx)
    }

    pub async fn emit(&self, result: FlowResult) -> Result<()> {
        self.tx
            .send(result)
            .await
            .context("result channel closed before the flow finished")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::dump::DumpFileRecord;
    use crate::types::process::AddressRange;
    use std::path::PathBuf;

    fn part(seq: u64) -> FlowResult {
        FlowResult::FilePart(DumpFileRecord {
            path: PathBuf::from(format!("memscand_1_{seq:04}.bin")),
            size: 8,
            range: AddressRange::new(seq * 8, (seq + 1) * 8),
        })
    }

    #[tokio::test]
    async fn test_emission_order_is_preserved() {
        let (recorder, mut rx) = ResultRecorder::channel(16);
        for seq in 0..5 {
            recorder.emit(part(seq)).await.unwrap();
        }
        drop(recorder);

        let mut received = Vec::new();
        while let Some(result) = rx.recv().await {
            received.push(result);
        }
        assert_eq!(received, (0..5).map(part).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_emit_fails_once_receiver_is_gone() {
        let (recorder, rx) = ResultRecorder::channel(1);
        drop(rx);
        assert!(recorder.emit(part(0)).await.is_err());
    }
}
