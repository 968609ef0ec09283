//! The transfer engine: builds the adapter pair from the run configuration,
//! validates both sides, and drives producer -> converter -> consumer.

use anyhow::bail;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapters::dtrack::DtrackConsumer;
use crate::adapters::folder::{FolderConsumer, FolderProducer};
use crate::adapters::github::GithubProducer;
use crate::adapters::interlynk::InterlynkConsumer;
use crate::adapters::s3::S3Consumer;
use crate::adapters::watcher::cache::WatcherCache;
use crate::adapters::watcher::WatcherProducer;
use crate::config::{InputConfig, OutputConfig, RunConfig};
use crate::convert::ConverterStage;
use crate::ports::{Consumer, Producer};
use crate::shared::{Result, TransferError};
use crate::transfer::context::TransferContext;
use crate::transfer::summary::TransferSummary;

pub struct TransferEngine {
    config: RunConfig,
}

impl TransferEngine {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    fn build_producer(&self, consumer_tag: &str) -> Result<Box<dyn Producer>> {
        match &self.config.input {
            InputConfig::Github(github) => {
                let producer = GithubProducer::new(github.clone())?;
                if self.config.daemon {
                    let cache = WatcherCache::load(&self.config.cache_path);
                    Ok(Box::new(WatcherProducer::new(
                        producer,
                        cache,
                        consumer_tag,
                        self.config.poll_interval,
                    )))
                } else {
                    Ok(Box::new(producer))
                }
            }
            InputConfig::Folder(folder) => Ok(Box::new(FolderProducer::new(folder.clone()))),
        }
    }

    fn build_consumer(&self) -> Result<Box<dyn Consumer>> {
        match &self.config.output {
            OutputConfig::Folder(folder) => Ok(Box::new(FolderConsumer::new(folder.clone()))),
            OutputConfig::S3(s3) => Ok(Box::new(S3Consumer::new(s3.clone()))),
            OutputConfig::Interlynk(interlynk) => {
                Ok(Box::new(InterlynkConsumer::new(interlynk.clone())?))
            }
            OutputConfig::Dtrack(dtrack) => Ok(Box::new(DtrackConsumer::new(dtrack.clone())?)),
        }
    }

    /// Runs the whole pipeline once (or, in daemon mode, until cancelled).
    ///
    /// Every record flows through the converter stage, so consumers only ever
    /// see CycloneDX JSON. The stream keeps flowing past per-record failures;
    /// the summary carries the counts either way.
    pub async fn run(&self, cancel: CancellationToken) -> Result<TransferSummary> {
        let consumer = self.build_consumer()?;
        let producer = self.build_producer(consumer.name())?;

        producer.validate()?;
        consumer.validate()?;

        let ctx = TransferContext::new(self.config.input.tag(), self.config.output.tag())
            .with_cancel(cancel)
            .with_dry_run(self.config.dry_run)
            .with_mode(self.config.mode);

        info!(
            source = %ctx.source,
            destination = %ctx.destination,
            dry_run = ctx.dry_run,
            daemon = self.config.daemon,
            "starting transfer"
        );

        let stream = producer.fetch(&ctx).await?;
        let converted = ConverterStage::attach(&ctx, stream);

        let summary = if ctx.dry_run {
            consumer.dry_run(&ctx, converted).await?
        } else {
            consumer.upload(&ctx, converted).await?
        };

        // The daemon only ever stops on a cancel signal, which is its normal
        // shutdown. A one-shot run interrupted mid-stream is an error.
        if ctx.is_cancelled() && !self.config.daemon {
            bail!(TransferError::Cancelled);
        }

        // A dry run reports on stdout instead of through the log.
        if ctx.dry_run {
            println!("{}", summary);
        } else {
            info!(%summary, "transfer finished");
        }
        Ok(summary)
    }
}
