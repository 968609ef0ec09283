use tokio::sync::mpsc;

use crate::transfer::record::SbomRecord;

/// Default channel capacity for streams fed by a background task.
///
/// Small on purpose: memory use stays bounded by a handful of records even
/// when the producer outpaces the consumer.
pub const STREAM_BUFFER: usize = 8;

/// Lazy, forward-only sequence of SBOM records.
///
/// Backed by a bounded mpsc channel so producers suspend when the consumer
/// falls behind. The stream ends when the sender side is dropped; sequential
/// adapters that materialize a list first can use [`SbomStream::from_records`].
pub struct SbomStream {
    rx: mpsc::Receiver<SbomRecord>,
}

impl SbomStream {
    /// Creates a bounded channel pair; the producer keeps the sender, the
    /// consumer drives the stream.
    pub fn channel(buffer: usize) -> (mpsc::Sender<SbomRecord>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }

    /// Wraps an already materialized list of records.
    pub fn from_records(records: Vec<SbomRecord>) -> Self {
        let (tx, stream) = Self::channel(records.len().max(1));
        for record in records {
            // Capacity equals the record count, so sends never block.
            let _ = tx.try_send(record);
        }
        stream
    }

    /// Returns the next record, or `None` once the stream is exhausted.
    pub async fn next(&mut self) -> Option<SbomRecord> {
        self.rx.recv().await
    }
}
