//! Object-store consumer: writes records to `<bucket>/<prefix>/<path>` using
//! ambient AWS credentials.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ports::Consumer;
use crate::shared::{Result, TransferError};
use crate::transfer::context::{ProcessingMode, TransferContext};
use crate::transfer::record::SbomRecord;
use crate::transfer::stream::SbomStream;
use crate::transfer::summary::TransferSummary;

/// Fixed worker-pool size for parallel uploads.
const UPLOAD_WORKERS: usize = 3;

/// Configuration for the object-store consumer.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub prefix: String,
    pub region: String,
    pub mode: ProcessingMode,
}

pub struct S3Consumer {
    config: S3Config,
}

impl S3Consumer {
    pub fn new(config: S3Config) -> Self {
        Self { config }
    }

    async fn client(&self) -> aws_sdk_s3::Client {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(self.config.region.clone()))
            .load()
            .await;
        aws_sdk_s3::Client::new(&shared)
    }

    /// Object key for a record; a trailing separator is appended to the
    /// prefix when absent, and pathless records get a generated name.
    fn object_key(prefix: &str, record: &SbomRecord) -> String {
        let name = if record.path.is_empty() {
            format!("{}.sbom.json", Uuid::new_v4())
        } else {
            record.path.clone()
        };
        if prefix.is_empty() {
            name
        } else if prefix.ends_with('/') {
            format!("{}{}", prefix, name)
        } else {
            format!("{}/{}", prefix, name)
        }
    }

    async fn put_record(
        client: &aws_sdk_s3::Client,
        bucket: &str,
        prefix: &str,
        record: &SbomRecord,
    ) -> Result<String> {
        let key = Self::object_key(prefix, record);
        client
            .put_object()
            .bucket(bucket)
            .key(&key)
            .body(ByteStream::from(record.data.clone()))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| TransferError::Network {
                endpoint: format!("s3://{}/{}", bucket, key),
                details: e.to_string(),
            })?;
        Ok(key)
    }
}

#[async_trait]
impl Consumer for S3Consumer {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn validate(&self) -> Result<()> {
        if self.config.bucket.is_empty() {
            anyhow::bail!(TransferError::config("S3 bucket must not be empty"));
        }
        if self.config.region.is_empty() {
            anyhow::bail!(TransferError::config("S3 region must not be empty"));
        }
        Ok(())
    }

    async fn upload(
        &self,
        ctx: &TransferContext,
        mut stream: SbomStream,
    ) -> Result<TransferSummary> {
        let client = self.client().await;
        let bucket = self.config.bucket.clone();
        let prefix = self.config.prefix.clone();

        match self.config.mode {
            ProcessingMode::Sequential => {
                let mut summary = TransferSummary::default();
                while let Some(record) = stream.next().await {
                    if ctx.is_cancelled() {
                        break;
                    }
                    match Self::put_record(&client, &bucket, &prefix, &record).await {
                        Ok(key) => {
                            debug!(key = %key, "uploaded object");
                            summary.record_success();
                        }
                        Err(error) => {
                            warn!(path = %record.path, error = %error, "object upload failed");
                            summary.record_failure();
                        }
                    }
                }
                Ok(summary)
            }
            ProcessingMode::Parallel => {
                let semaphore = Arc::new(Semaphore::new(UPLOAD_WORKERS));
                let summary = Arc::new(Mutex::new(TransferSummary::default()));
                let mut handles = Vec::new();
                while let Some(record) = stream.next().await {
                    if ctx.is_cancelled() {
                        break;
                    }
                    let permit = Arc::clone(&semaphore).acquire_owned().await?;
                    let client = client.clone();
                    let bucket = bucket.clone();
                    let prefix = prefix.clone();
                    let summary = Arc::clone(&summary);
                    handles.push(tokio::spawn(async move {
                        let _permit = permit;
                        let outcome = Self::put_record(&client, &bucket, &prefix, &record).await;
                        let mut counters = summary.lock().await;
                        match outcome {
                            Ok(_) => counters.record_success(),
                            Err(error) => {
                                warn!(path = %record.path, error = %error, "object upload failed");
                                counters.record_failure();
                            }
                        }
                    }));
                }
                for handle in handles {
                    let _ = handle.await;
                }
                let result = *summary.lock().await;
                Ok(result)
            }
        }
    }
}
