use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::formats;
use crate::ports::Producer;
use crate::shared::{Result, TransferError};
use crate::transfer::context::{ProcessingMode, TransferContext};
use crate::transfer::record::SbomRecord;
use crate::transfer::stream::SbomStream;

/// Worker-pool size for the parallel variant.
const READ_WORKERS: usize = 5;

/// Configuration for the folder producer.
#[derive(Debug, Clone)]
pub struct FolderInputConfig {
    pub path: PathBuf,
    pub recursive: bool,
    pub mode: ProcessingMode,
}

/// Walks a directory tree and emits every file passing the SBOM filter.
///
/// The record namespace is the extracted primary-component name (empty when
/// extraction fails) and the path is the bare file name. Unreadable, empty
/// and invalid files are logged and skipped.
pub struct FolderProducer {
    config: FolderInputConfig,
}

impl FolderProducer {
    pub fn new(config: FolderInputConfig) -> Self {
        Self { config }
    }

    fn candidate_paths(&self) -> Vec<PathBuf> {
        let mut walker = WalkDir::new(&self.config.path);
        if !self.config.recursive {
            walker = walker.max_depth(1);
        }
        walker
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    warn!(error = %error, "skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(formats::looks_like_sbom_name)
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
            .collect()
    }

    /// Reads one candidate and builds its record, or `None` when the file is
    /// empty or fails the content sniff.
    async fn read_record(path: &Path) -> Option<SbomRecord> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "skipping file: read failed");
                return None;
            }
        };
        if data.is_empty() {
            debug!(path = %path.display(), "skipping empty file");
            return None;
        }
        if formats::sniff_dialect(&data).is_none() {
            warn!(path = %path.display(), "skipping file: content is not a recognized SBOM");
            return None;
        }

        let namespace = formats::primary_component(&data)
            .map(|primary| primary.name)
            .unwrap_or_default();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        Some(SbomRecord::new(data, file_name, namespace, ""))
    }

    async fn fetch_sequential(&self, ctx: &TransferContext, paths: Vec<PathBuf>) -> Vec<SbomRecord> {
        let mut records = Vec::new();
        for path in paths {
            if ctx.is_cancelled() {
                break;
            }
            if let Some(record) = Self::read_record(&path).await {
                records.push(record);
            }
        }
        records
    }

    async fn fetch_parallel(&self, ctx: &TransferContext, paths: Vec<PathBuf>) -> Vec<SbomRecord> {
        let (path_tx, path_rx) = mpsc::channel::<PathBuf>(paths.len().max(1));
        let path_rx = Arc::new(tokio::sync::Mutex::new(path_rx));
        let (record_tx, mut record_rx) = mpsc::channel::<SbomRecord>(paths.len().max(1));

        for path in paths {
            let _ = path_tx.try_send(path);
        }
        drop(path_tx);

        let mut workers = Vec::with_capacity(READ_WORKERS);
        for _ in 0..READ_WORKERS {
            let ctx = ctx.clone();
            let path_rx = Arc::clone(&path_rx);
            let record_tx = record_tx.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let path = {
                        let mut rx = path_rx.lock().await;
                        rx.recv().await
                    };
                    let Some(path) = path else { break };
                    if ctx.is_cancelled() {
                        break;
                    }
                    if let Some(record) = Self::read_record(&path).await {
                        let _ = record_tx.send(record).await;
                    }
                }
            }));
        }
        drop(record_tx);

        let mut records = Vec::new();
        while let Some(record) = record_rx.recv().await {
            records.push(record);
        }
        for worker in workers {
            let _ = worker.await;
        }
        records
    }
}

#[async_trait]
impl Producer for FolderProducer {
    fn name(&self) -> &'static str {
        "folder"
    }

    fn validate(&self) -> Result<()> {
        if !self.config.path.is_dir() {
            anyhow::bail!(TransferError::config(format!(
                "input folder {} does not exist or is not a directory",
                self.config.path.display()
            )));
        }
        Ok(())
    }

    async fn fetch(&self, ctx: &TransferContext) -> Result<SbomStream> {
        let paths = self.candidate_paths();
        info!(
            root = %self.config.path.display(),
            candidates = paths.len(),
            "scanning folder for SBOMs"
        );
        let records = match self.config.mode {
            ProcessingMode::Sequential => self.fetch_sequential(ctx, paths).await,
            ProcessingMode::Parallel => self.fetch_parallel(ctx, paths).await,
        };
        Ok(SbomStream::from_records(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write_cdx(dir: &Path, name: &str, component: &str) {
        let doc = json!({
            "bomFormat": "CycloneDX",
            "specVersion": "1.5",
            "metadata": {"component": {"type": "application", "name": component, "version": "1.0.0"}},
            "components": []
        });
        fs::write(dir.join(name), serde_json::to_vec_pretty(&doc).unwrap()).unwrap();
    }

    fn producer(root: &Path, recursive: bool, mode: ProcessingMode) -> FolderProducer {
        FolderProducer::new(FolderInputConfig {
            path: root.to_path_buf(),
            recursive,
            mode,
        })
    }

    #[tokio::test]
    async fn test_fetch_emits_records_with_primary_component_namespace() {
        let temp = TempDir::new().unwrap();
        write_cdx(temp.path(), "app.cdx.json", "my-app");

        let ctx = TransferContext::new("folder", "folder");
        let producer = producer(temp.path(), false, ProcessingMode::Sequential);
        let mut stream = producer.fetch(&ctx).await.unwrap();

        let record = stream.next().await.unwrap();
        assert_eq!(record.path, "app.cdx.json");
        assert_eq!(record.namespace, "my-app");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_skips_invalid_and_empty_files() {
        let temp = TempDir::new().unwrap();
        write_cdx(temp.path(), "good.cdx.json", "good");
        fs::write(temp.path().join("empty.sbom.json"), b"").unwrap();
        fs::write(temp.path().join("bad.cdx.json"), b"not json at all").unwrap();
        fs::write(temp.path().join("README.md"), b"# docs").unwrap();

        let ctx = TransferContext::new("folder", "folder");
        let producer = producer(temp.path(), false, ProcessingMode::Sequential);
        let mut stream = producer.fetch(&ctx).await.unwrap();

        let record = stream.next().await.unwrap();
        assert_eq!(record.namespace, "good");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_recursive_flag_controls_depth() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("nested");
        fs::create_dir(&nested).unwrap();
        write_cdx(&nested, "deep.cdx.json", "deep");

        let ctx = TransferContext::new("folder", "folder");
        let flat = producer(temp.path(), false, ProcessingMode::Sequential);
        let mut stream = flat.fetch(&ctx).await.unwrap();
        assert!(stream.next().await.is_none());

        let deep = producer(temp.path(), true, ProcessingMode::Sequential);
        let mut stream = deep.fetch(&ctx).await.unwrap();
        assert_eq!(stream.next().await.unwrap().namespace, "deep");
    }

    #[tokio::test]
    async fn test_parallel_mode_finds_same_files() {
        let temp = TempDir::new().unwrap();
        write_cdx(temp.path(), "a.cdx.json", "a");
        write_cdx(temp.path(), "b.cdx.json", "b");
        write_cdx(temp.path(), "c.cdx.json", "c");

        let ctx = TransferContext::new("folder", "folder");
        let producer = producer(temp.path(), false, ProcessingMode::Parallel);
        let mut stream = producer.fetch(&ctx).await.unwrap();
        let mut names = Vec::new();
        while let Some(record) = stream.next().await {
            names.push(record.namespace);
        }
        names.sort();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_validate_rejects_missing_root() {
        let producer = producer(Path::new("/nonexistent/sbommv"), false, ProcessingMode::Sequential);
        assert!(producer.validate().is_err());
    }
}
