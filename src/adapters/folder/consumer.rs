use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ports::Consumer;
use crate::shared::{Result, TransferError};
use crate::transfer::context::{ProcessingMode, TransferContext};
use crate::transfer::record::SbomRecord;
use crate::transfer::stream::SbomStream;
use crate::transfer::summary::TransferSummary;

/// Worker-pool size for the parallel variant.
const WRITE_WORKERS: usize = 5;

/// Configuration for the folder consumer.
#[derive(Debug, Clone)]
pub struct FolderOutputConfig {
    pub path: PathBuf,
    pub mode: ProcessingMode,
}

/// Writes each record to `<root>/<namespace>/<path>`.
///
/// Directories are created 0755, files 0644. An empty namespace writes into
/// the bare root; an empty path gets a fresh UUID-derived name.
pub struct FolderConsumer {
    config: FolderOutputConfig,
}

impl FolderConsumer {
    pub fn new(config: FolderOutputConfig) -> Self {
        Self { config }
    }

    fn target_path(root: &Path, record: &SbomRecord) -> PathBuf {
        let dir = if record.namespace.is_empty() {
            root.to_path_buf()
        } else {
            root.join(&record.namespace)
        };
        let file_name = if record.path.is_empty() {
            format!("{}.sbom.json", Uuid::new_v4())
        } else {
            record.path.clone()
        };
        dir.join(file_name)
    }

    async fn write_record(root: &Path, record: &SbomRecord) -> Result<PathBuf> {
        let target = Self::target_path(root, record);
        if let Some(parent) = target.parent() {
            create_dir_all_mode(parent).await?;
        }
        tokio::fs::write(&target, &record.data)
            .await
            .map_err(|e| TransferError::Io {
                path: target.clone(),
                details: e.to_string(),
            })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o644)).await?;
        }
        Ok(target)
    }
}

/// Creates `dir` and any missing ancestors, setting 0755 on each directory
/// this call creates. Multi-level namespaces get the mode on every level,
/// not just the leaf.
async fn create_dir_all_mode(dir: &Path) -> Result<()> {
    let mut missing = Vec::new();
    let mut current = dir;
    while !current.exists() {
        missing.push(current.to_path_buf());
        match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => current = parent,
            _ => break,
        }
    }

    for level in missing.iter().rev() {
        match tokio::fs::create_dir(level).await {
            Ok(()) => {}
            // A parallel worker may have created this level in between.
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(TransferError::Io {
                    path: level.clone(),
                    details: e.to_string(),
                }
                .into())
            }
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(level, std::fs::Permissions::from_mode(0o755)).await?;
        }
    }
    Ok(())
}

#[async_trait]
impl Consumer for FolderConsumer {
    fn name(&self) -> &'static str {
        "folder"
    }

    fn validate(&self) -> Result<()> {
        if self.config.path.as_os_str().is_empty() {
            anyhow::bail!(TransferError::config("output folder path must not be empty"));
        }
        Ok(())
    }

    async fn upload(
        &self,
        ctx: &TransferContext,
        mut stream: SbomStream,
    ) -> Result<TransferSummary> {
        let root = self.config.path.clone();
        match self.config.mode {
            ProcessingMode::Sequential => {
                let mut summary = TransferSummary::default();
                while let Some(record) = stream.next().await {
                    if ctx.is_cancelled() {
                        break;
                    }
                    match Self::write_record(&root, &record).await {
                        Ok(target) => {
                            debug!(target = %target.display(), "wrote SBOM");
                            summary.record_success();
                        }
                        Err(error) => {
                            warn!(path = %record.path, error = %error, "failed to write SBOM");
                            summary.record_failure();
                        }
                    }
                }
                Ok(summary)
            }
            ProcessingMode::Parallel => {
                let semaphore = Arc::new(tokio::sync::Semaphore::new(WRITE_WORKERS));
                let mut handles = Vec::new();
                while let Some(record) = stream.next().await {
                    if ctx.is_cancelled() {
                        break;
                    }
                    let permit = Arc::clone(&semaphore).acquire_owned().await?;
                    let root = root.clone();
                    handles.push(tokio::spawn(async move {
                        let _permit = permit;
                        let mut partial = TransferSummary::default();
                        match Self::write_record(&root, &record).await {
                            Ok(_) => partial.record_success(),
                            Err(error) => {
                                warn!(path = %record.path, error = %error, "failed to write SBOM");
                                partial.record_failure();
                            }
                        }
                        partial
                    }));
                }
                let mut summary = TransferSummary::default();
                for handle in handles {
                    summary.merge(handle.await?);
                }
                Ok(summary)
            }
        }
    }
}
