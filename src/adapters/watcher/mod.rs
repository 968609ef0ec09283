//! Watcher producer: a long-lived daemon that polls GitHub repositories for
//! new releases and streams newly observed SBOMs, deduplicated through a
//! persistent cache keyed by destination.

pub mod cache;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::adapters::github::client::Release;
use crate::adapters::github::{GithubMethod, GithubProducer};
use crate::ports::Producer;
use crate::shared::Result;
use crate::transfer::context::TransferContext;
use crate::transfer::record::SbomRecord;
use crate::transfer::stream::{SbomStream, STREAM_BUFFER};

use cache::{CacheScope, RepoState, WatcherCache};

/// Default seconds between poll ticks.
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 60;

/// Fixed artifact suffix for dependency-graph deliveries (one per release).
const API_KEY_SUFFIX: &str = "dependency-graph-sbom.json";

/// Fixed artifact suffix for generator-tool deliveries.
const TOOL_KEY_SUFFIX: &str = "syft-generated-sbom.json";

/// Builds the delivery key for one artifact of one release.
///
/// The release id is part of the key so a new release re-delivers artifacts
/// even when a file name is reused across releases.
fn delivery_key(method: GithubMethod, repo: &str, release_id: u64, artifact: &str) -> String {
    match method {
        GithubMethod::Release => format!("{}:{}:{}", repo, release_id, artifact),
        GithubMethod::Api => format!("{}:{}:{}", repo, release_id, API_KEY_SUFFIX),
        GithubMethod::Tool => format!("{}:{}:{}", repo, release_id, TOOL_KEY_SUFFIX),
    }
}

/// The watcher producer.
///
/// Wraps a [`GithubProducer`] for acquisition and adds the polling loop,
/// release-state comparison and delivery-key filtering. Delivery is
/// at-least-once: a crash between emitting and marking re-emits next tick.
pub struct WatcherProducer {
    github: Arc<GithubProducer>,
    cache: Arc<WatcherCache>,
    poll_interval: Duration,
    scope: CacheScope,
}

impl WatcherProducer {
    pub fn new(
        github: GithubProducer,
        cache: WatcherCache,
        consumer_tag: &str,
        poll_interval: Duration,
    ) -> Self {
        let scope = CacheScope {
            consumer: consumer_tag.to_string(),
            producer: "github".to_string(),
            method: github.method().as_str().to_string(),
        };
        Self {
            github: Arc::new(github),
            cache: Arc::new(cache),
            poll_interval,
            scope,
        }
    }

    /// Runs one poll tick over every repository, emitting fresh records.
    async fn poll_once(
        github: &GithubProducer,
        cache: &WatcherCache,
        scope: &CacheScope,
        ctx: &TransferContext,
        repos: &[String],
        tx: &mpsc::Sender<SbomRecord>,
    ) {
        for repo in repos {
            if ctx.is_cancelled() {
                return;
            }
            let release = match github.client().latest_release(ctx, &github.parsed_url().owner, repo).await {
                Ok(Some(release)) => release,
                Ok(None) => continue,
                Err(error) => {
                    warn!(repo = %repo, error = %error, "poll failed for repository");
                    continue;
                }
            };

            let state = RepoState {
                published_at: release
                    .published_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_default(),
                release_id: release.id.to_string(),
            };
            if cache.repo_state(scope, repo).as_ref() == Some(&state) {
                debug!(repo = %repo, release = %release.tag_name, "release unchanged");
                continue;
            }

            let records = match Self::acquire(github, ctx, repo, &release).await {
                Ok(records) => records,
                Err(error) => {
                    warn!(repo = %repo, error = %error, "acquisition failed");
                    continue;
                }
            };
            for record in records {
                let key = delivery_key(github.method(), repo, release.id, &record.path);
                if cache.is_delivered(scope, &key) {
                    debug!(key = %key, "already delivered, skipping");
                    continue;
                }
                let sent = tokio::select! {
                    _ = ctx.cancel.cancelled() => false,
                    sent = tx.send(record) => sent.is_ok(),
                };
                if !sent {
                    return;
                }
                cache.mark_delivered(scope, &key);
            }
            cache.set_repo_state(scope, repo, state);
        }
    }

    async fn acquire(
        github: &GithubProducer,
        ctx: &TransferContext,
        repo: &str,
        release: &Release,
    ) -> Result<Vec<SbomRecord>> {
        match github.method() {
            GithubMethod::Release => github.release_records(ctx, repo, release).await,
            GithubMethod::Api => github.api_records(ctx, repo).await,
            GithubMethod::Tool => github.tool_records(ctx, repo, Some(release)).await,
        }
    }
}

#[async_trait]
impl Producer for WatcherProducer {
    fn name(&self) -> &'static str {
        "github"
    }

    fn validate(&self) -> Result<()> {
        self.github.validate()
    }

    async fn fetch(&self, ctx: &TransferContext) -> Result<SbomStream> {
        let repos = self.github.repo_set(ctx).await?;
        info!(
            repos = repos.len(),
            interval_seconds = self.poll_interval.as_secs(),
            cache = %self.cache.path().display(),
            "starting watcher"
        );

        let (tx, stream) = SbomStream::channel(STREAM_BUFFER);
        let github = Arc::clone(&self.github);
        let cache = Arc::clone(&self.cache);
        let scope = self.scope.clone();
        let interval = self.poll_interval;
        let ctx = ctx.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                Self::poll_once(&github, &cache, &scope, &ctx, &repos, &tx).await;
                if let Err(error) = cache.save() {
                    warn!(error = %error, "failed to persist watcher cache");
                }
                debug!(
                    delivered_total = cache.delivered_count(&scope),
                    "poll tick complete"
                );
                if ctx.is_cancelled() {
                    break;
                }
            }
            info!("watcher stopped");
        });

        Ok(stream)
    }
}
