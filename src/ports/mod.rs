//! Producer / Consumer ports.
//!
//! These traits define what the transfer engine needs from an adapter pair;
//! concrete implementations live under `adapters`. The set of adapters is
//! closed at compile time, so a small dispatcher in the engine is all the
//! polymorphism required.

use async_trait::async_trait;

use crate::shared::Result;
use crate::transfer::context::TransferContext;
use crate::transfer::stream::SbomStream;
use crate::transfer::summary::TransferSummary;

/// A place SBOMs can be obtained from.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Short tag used in logs and the watcher cache (e.g. `github`).
    fn name(&self) -> &'static str;

    /// Configuration checks that must pass before any I/O happens.
    fn validate(&self) -> Result<()>;

    /// Starts fetching and returns the lazy stream of records.
    async fn fetch(&self, ctx: &TransferContext) -> Result<SbomStream>;
}

/// A place SBOMs can be deposited.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Short tag used in logs and the watcher cache (e.g. `dtrack`).
    fn name(&self) -> &'static str;

    /// Configuration checks that must pass before any I/O happens.
    fn validate(&self) -> Result<()>;

    /// Drains the stream, uploading every record, and returns the summary.
    async fn upload(&self, ctx: &TransferContext, stream: SbomStream) -> Result<TransferSummary>;

    /// Drains the stream without side effects, printing one "would upload"
    /// line per record on stdout.
    async fn dry_run(&self, ctx: &TransferContext, mut stream: SbomStream) -> Result<TransferSummary> {
        let mut summary = TransferSummary::default();
        while let Some(record) = stream.next().await {
            if ctx.is_cancelled() {
                break;
            }
            println!(
                "would upload {} ({} bytes) to {}",
                record.path,
                record.data.len(),
                self.name()
            );
            summary.record_success();
        }
        Ok(summary)
    }
}
