//! Container log demultiplexer
//!
//! Turns a container's multiplexed stdout/stderr stream into ordered,
//! sanitized text lines persisted in batches. Both channels are treated as
//! one log; bytes keep the order in which the runtime delivered them.
//!
//! A producer task drains the runtime stream into a channel while the line
//! reader consumes it, so slow persistence never stalls reading from the
//! runtime beyond the channel's capacity.

use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::StreamReader;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::podman::OutputStream;
use crate::service::log_buffer::{LogBatch, sanitize_line};
use crate::store::{Store, best_effort};

/// Chunks buffered between the producer and the line reader
const PIPE_CAPACITY: usize = 256;

/// Collects a job's output into its persisted log
///
/// Returns the number of lines collected. Lines are flushed every
/// `batch_size` lines and once more at end of stream. `job_id` may be
/// `None` when the job record could not be created; lines are then only
/// traced.
pub async fn collect_logs(
    output: OutputStream,
    store: Arc<dyn Store>,
    job_id: Option<Uuid>,
    batch_size: usize,
) -> usize {
    let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(PIPE_CAPACITY);
    let producer = tokio::spawn(demultiplex(output, tx));

    let mut reader = StreamReader::new(ReceiverStream::new(rx));
    let mut batch = LogBatch::new(batch_size);
    let mut raw = Vec::new();
    let mut collected = 0;

    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {
                let Some(line) = sanitize_line(&raw) else {
                    continue;
                };
                debug!("[job {:?}] {}", job_id, line);
                collected += 1;

                if let Some(full) = batch.push(line) {
                    flush(store.as_ref(), job_id, full).await;
                }
            }
            Err(e) => {
                warn!("Error reading container output: {}", e);
                break;
            }
        }
    }

    if let Some(rest) = batch.drain() {
        flush(store.as_ref(), job_id, rest).await;
    }

    if let Err(e) = producer.await {
        warn!("Log demultiplexer task panicked: {}", e);
    }

    collected
}

/// Forwards every chunk of both channels into the pipe, in arrival order
async fn demultiplex(mut output: OutputStream, tx: mpsc::Sender<std::io::Result<Bytes>>) {
    while let Some(chunk) = output.next().await {
        match chunk {
            Ok(chunk) => {
                if tx.send(Ok(chunk.into_bytes())).await.is_err() {
                    // Reader gone
                    break;
                }
            }
            Err(e) => {
                warn!("Error demultiplexing container output: {}", e);
                break;
            }
        }
    }
}

async fn flush(store: &dyn Store, job_id: Option<Uuid>, lines: Vec<String>) {
    let Some(job_id) = job_id else {
        return;
    };
    debug!("Persisting {} log lines for job {}", lines.len(), job_id);
    best_effort(store.append_job_logs(job_id, lines).await, "store job logs");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::podman::LogOutput;
    use crate::testing::MemoryStore;

    fn stream(chunks: Vec<LogOutput>) -> OutputStream {
        Box::pin(futures::stream::iter(chunks.into_iter().map(Ok)))
    }

    fn interleaved() -> Vec<LogOutput> {
        vec![
            LogOutput::StdOut(Bytes::from_static(b"L1\nL")),
            LogOutput::StdErr(Bytes::from_static(b"2\n\n\0\nL3")),
            LogOutput::StdOut(Bytes::from_static(b"\r\nL\04\n")),
            LogOutput::StdErr(Bytes::from_static(b"L5\nL6\nL7")),
            LogOutput::StdOut(Bytes::from_static(b"\nL8\nL9\nL10\nL11\nL12")),
        ]
    }

    fn expected() -> Vec<String> {
        (1..=12).map(|i| format!("L{}", i)).collect()
    }

    #[tokio::test]
    async fn test_lines_preserve_order_for_any_batch_size() {
        for batch_size in [1, 3, 10, 100] {
            let store = Arc::new(MemoryStore::new());
            let job_id = Uuid::new_v4();

            let collected =
                collect_logs(stream(interleaved()), store.clone(), Some(job_id), batch_size).await;

            let batches = store.log_batches(job_id);
            assert_eq!(collected, 12);
            assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= batch_size));
            assert_eq!(batches.concat(), expected(), "batch size {}", batch_size);
        }
    }

    #[tokio::test]
    async fn test_batches_of_ten() {
        let store = Arc::new(MemoryStore::new());
        let job_id = Uuid::new_v4();

        collect_logs(stream(interleaved()), store.clone(), Some(job_id), 10).await;

        let sizes: Vec<_> = store.log_batches(job_id).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 2]);
    }

    #[tokio::test]
    async fn test_stream_error_keeps_collected_lines() {
        let store = Arc::new(MemoryStore::new());
        let job_id = Uuid::new_v4();
        let output: OutputStream = Box::pin(futures::stream::iter(vec![
            Ok(LogOutput::StdOut(Bytes::from_static(b"before\n"))),
            Err(std::io::Error::other("socket closed")),
            Ok(LogOutput::StdOut(Bytes::from_static(b"after\n"))),
        ]));

        let collected = collect_logs(output, store.clone(), Some(job_id), 10).await;

        assert_eq!(collected, 1);
        assert_eq!(store.log_batches(job_id).concat(), vec!["before"]);
    }

    #[tokio::test]
    async fn test_without_job_record_nothing_is_persisted() {
        let store = Arc::new(MemoryStore::new());

        let collected = collect_logs(stream(interleaved()), store.clone(), None, 10).await;

        assert_eq!(collected, 12);
        assert_eq!(store.total_log_batches(), 0);
    }
}
