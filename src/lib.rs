//! sbommv - move SBOMs between producers and consumers
//!
//! This library fetches Software Bills of Materials from places that have
//! them (GitHub releases, the dependency-graph API, an on-host generator,
//! local folders) and delivers them to places that want them (folders, S3,
//! Interlynk, Dependency-Track), converting SPDX JSON to CycloneDX JSON on
//! the way through.
//!
//! # Architecture
//!
//! - **Ports** (`ports`): the `Producer` / `Consumer` traits the engine
//!   drives
//! - **Adapters** (`adapters`): concrete producers and consumers
//! - **Transfer** (`transfer`): the record/stream/summary primitives and the
//!   engine
//! - **Convert** (`convert`): SPDX to CycloneDX conversion and enrichment
//! - **Formats** (`formats`): SBOM detection and dialect sniffing
//! - **Shared** (`shared`): common error types and the crate `Result`
//!
//! # Example
//!
//! ```no_run
//! use sbommv::prelude::*;
//! use std::path::PathBuf;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<()> {
//! let config = RunConfig {
//!     input: InputConfig::Folder(FolderInputConfig {
//!         path: PathBuf::from("./sboms"),
//!         recursive: true,
//!         mode: ProcessingMode::Sequential,
//!     }),
//!     output: OutputConfig::Folder(FolderOutputConfig {
//!         path: PathBuf::from("./out"),
//!         mode: ProcessingMode::Sequential,
//!     }),
//!     mode: ProcessingMode::Sequential,
//!     daemon: false,
//!     poll_interval: std::time::Duration::from_secs(60),
//!     cache_path: PathBuf::from(".sbommv/cache.json"),
//!     dry_run: false,
//! };
//!
//! let summary = TransferEngine::new(config).run(CancellationToken::new()).await?;
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod convert;
pub mod formats;
pub mod ports;
pub mod project;
pub mod shared;
pub mod transfer;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::dtrack::{DtrackConfig, DtrackConsumer};
    pub use crate::adapters::folder::{
        FolderConsumer, FolderInputConfig, FolderOutputConfig, FolderProducer,
    };
    pub use crate::adapters::github::{GithubConfig, GithubMethod, GithubProducer};
    pub use crate::adapters::interlynk::{InterlynkConfig, InterlynkConsumer};
    pub use crate::adapters::s3::{S3Config, S3Consumer};
    pub use crate::adapters::watcher::WatcherProducer;
    pub use crate::config::{InputConfig, OutputConfig, RunConfig};
    pub use crate::ports::{Consumer, Producer};
    pub use crate::shared::{ExitCode, Result, TransferError};
    pub use crate::transfer::context::{ProcessingMode, TransferContext};
    pub use crate::transfer::engine::TransferEngine;
    pub use crate::transfer::record::SbomRecord;
    pub use crate::transfer::stream::SbomStream;
    pub use crate::transfer::summary::TransferSummary;
}
