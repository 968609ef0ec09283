use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::warn;

use crate::shared::Result;

/// Default cache location, relative to the process working directory.
pub const DEFAULT_CACHE_PATH: &str = ".sbommv/cache.json";

/// Release state for one watched repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoState {
    pub published_at: String,
    pub release_id: String,
}

/// Per-(consumer, producer, method) slice of the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodState {
    #[serde(default)]
    pub repos: BTreeMap<String, RepoState>,
    #[serde(default)]
    pub sboms: BTreeMap<String, bool>,
}

/// On-disk shape: `{ "data": { consumer: { producer: { method: state } } } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    data: BTreeMap<String, BTreeMap<String, BTreeMap<String, MethodState>>>,
}

/// Addresses one method slice of the cache.
#[derive(Debug, Clone)]
pub struct CacheScope {
    pub consumer: String,
    pub producer: String,
    pub method: String,
}

/// Persistent deduplication cache for the watcher.
///
/// Entries are only ever added within a run. Readers take the shared lock,
/// every mutation takes the exclusive lock; the poll loop rewrites the file
/// once per tick via a temp-file rename so a crash never leaves a torn file.
pub struct WatcherCache {
    path: PathBuf,
    inner: RwLock<CacheFile>,
}

impl WatcherCache {
    /// Loads the cache, starting empty when the file is missing or corrupt.
    /// A corrupt file merely forces re-delivery, so it is not an error.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let inner = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(cache) => cache,
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "cache file corrupt, starting empty");
                    CacheFile::default()
                }
            },
            Err(_) => CacheFile::default(),
        };
        Self {
            path,
            inner: RwLock::new(inner),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // No writer can leave the map in a bad state, so a poisoned lock is
    // still safe to read through.
    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, CacheFile> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, CacheFile> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn repo_state(&self, scope: &CacheScope, repo: &str) -> Option<RepoState> {
        let cache = self.read_lock();
        cache
            .data
            .get(&scope.consumer)?
            .get(&scope.producer)?
            .get(&scope.method)?
            .repos
            .get(repo)
            .cloned()
    }

    pub fn set_repo_state(&self, scope: &CacheScope, repo: &str, state: RepoState) {
        let mut cache = self.write_lock();
        cache
            .data
            .entry(scope.consumer.clone())
            .or_default()
            .entry(scope.producer.clone())
            .or_default()
            .entry(scope.method.clone())
            .or_default()
            .repos
            .insert(repo.to_string(), state);
    }

    pub fn is_delivered(&self, scope: &CacheScope, key: &str) -> bool {
        let cache = self.read_lock();
        cache
            .data
            .get(&scope.consumer)
            .and_then(|producers| producers.get(&scope.producer))
            .and_then(|methods| methods.get(&scope.method))
            .map(|state| state.sboms.contains_key(key))
            .unwrap_or(false)
    }

    pub fn mark_delivered(&self, scope: &CacheScope, key: &str) {
        let mut cache = self.write_lock();
        cache
            .data
            .entry(scope.consumer.clone())
            .or_default()
            .entry(scope.producer.clone())
            .or_default()
            .entry(scope.method.clone())
            .or_default()
            .sboms
            .insert(key.to_string(), true);
    }

    pub fn delivered_count(&self, scope: &CacheScope) -> usize {
        let cache = self.read_lock();
        cache
            .data
            .get(&scope.consumer)
            .and_then(|producers| producers.get(&scope.producer))
            .and_then(|methods| methods.get(&scope.method))
            .map(|state| state.sboms.len())
            .unwrap_or(0)
    }

    /// Writes the cache atomically: marshal, create the parent directory,
    /// write a sibling temp file, rename over the target.
    pub fn save(&self) -> Result<()> {
        let serialized = {
            let cache = self.read_lock();
            serde_json::to_vec_pretty(&*cache)?
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, &serialized)
            .with_context(|| format!("failed to write {}", temp.display()))?;
        std::fs::rename(&temp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}
