//! GitHub producer adapter: surfaces SBOMs from releases, the dependency
//! graph API, or an on-host generator run against a shallow clone.

pub mod client;
pub mod tool;
pub mod url;

use anyhow::bail;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::formats;
use crate::ports::Producer;
use crate::shared::{Result, TransferError};
use crate::transfer::context::{ProcessingMode, TransferContext};
use crate::transfer::record::SbomRecord;
use crate::transfer::stream::SbomStream;

use client::{GithubClient, Release};
use url::{GithubUrl, VersionSpec};

/// Fixed worker-pool size for parallel fetches.
const FETCH_WORKERS: usize = 5;

/// How SBOMs are acquired from a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GithubMethod {
    /// Download SBOM-looking assets attached to releases.
    #[default]
    Release,
    /// Fetch the dependency-graph SBOM the host computes itself.
    Api,
    /// Clone the repository and run the external generator.
    Tool,
}

impl GithubMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            GithubMethod::Release => "release",
            GithubMethod::Api => "api",
            GithubMethod::Tool => "tool",
        }
    }
}

impl std::str::FromStr for GithubMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "release" => Ok(GithubMethod::Release),
            "api" => Ok(GithubMethod::Api),
            "tool" => Ok(GithubMethod::Tool),
            _ => Err(format!(
                "Invalid method: {}. Please specify 'release', 'api' or 'tool'",
                s
            )),
        }
    }
}

/// Configuration for the GitHub producer.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub url: String,
    pub method: GithubMethod,
    pub branch: Option<String>,
    pub include_repos: Vec<String>,
    pub exclude_repos: Vec<String>,
    pub token: Option<String>,
    pub mode: ProcessingMode,
}

pub struct GithubProducer {
    config: GithubConfig,
    url: GithubUrl,
    client: Arc<GithubClient>,
}

impl GithubProducer {
    pub fn new(config: GithubConfig) -> Result<Self> {
        let url = GithubUrl::parse(&config.url)?;
        let client = Arc::new(GithubClient::new(url.api_base(), config.token.clone())?);
        Ok(Self {
            config,
            url,
            client,
        })
    }

    pub(crate) fn client(&self) -> Arc<GithubClient> {
        Arc::clone(&self.client)
    }

    pub(crate) fn parsed_url(&self) -> &GithubUrl {
        &self.url
    }

    pub(crate) fn method(&self) -> GithubMethod {
        self.config.method
    }

    fn namespace(&self, repo: &str) -> String {
        format!("{}/{}", self.url.owner, repo)
    }

    /// Builds the set of target repositories: the single repo of the URL, or
    /// the organization's repositories run through include-then-exclude.
    pub(crate) async fn repo_set(&self, ctx: &TransferContext) -> Result<Vec<String>> {
        if let Some(repo) = &self.url.repo {
            return Ok(vec![repo.clone()]);
        }

        let all = self.client.list_org_repos(ctx, &self.url.owner).await?;
        let include: Vec<String> = self
            .config
            .include_repos
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        let exclude: Vec<String> = self
            .config
            .exclude_repos
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let filtered = all
            .into_iter()
            .filter(|name| include.is_empty() || include.contains(name))
            .filter(|name| !exclude.contains(name))
            .collect();
        Ok(filtered)
    }

    /// Releases chosen by the configured version selector, newest first.
    async fn selected_releases(
        &self,
        ctx: &TransferContext,
        repo: &str,
    ) -> Result<Vec<Release>> {
        match &self.url.version {
            VersionSpec::Tag(tag) => {
                let release = self
                    .client
                    .release_by_tag(ctx, &self.url.owner, repo, tag)
                    .await?;
                Ok(vec![release])
            }
            VersionSpec::Latest => Ok(self
                .client
                .latest_release(ctx, &self.url.owner, repo)
                .await?
                .into_iter()
                .collect()),
            VersionSpec::All => self.client.all_releases(ctx, &self.url.owner, repo).await,
        }
    }

    /// Release-asset acquisition for one release: enumerate assets, apply the
    /// two-stage SBOM filter, download survivors. Individual download
    /// failures are logged and skipped.
    pub(crate) async fn release_records(
        &self,
        ctx: &TransferContext,
        repo: &str,
        release: &Release,
    ) -> Result<Vec<SbomRecord>> {
        let assets = self
            .client
            .list_assets(ctx, &self.url.owner, repo, release.id)
            .await?;
        let mut records = Vec::new();
        for asset in assets {
            if !formats::looks_like_sbom_name(&asset.name) {
                continue;
            }
            let data = match self.client.download(ctx, &asset.browser_download_url).await {
                Ok(data) => data,
                Err(error) => {
                    warn!(asset = %asset.name, error = %error, "skipping asset: download failed");
                    continue;
                }
            };
            if formats::sniff_dialect(&data).is_none() {
                debug!(asset = %asset.name, "skipping asset: content is not a recognized SBOM");
                continue;
            }
            records.push(SbomRecord::new(
                data,
                asset.name.clone(),
                self.namespace(repo),
                release.tag_name.clone(),
            ));
        }
        Ok(records)
    }

    /// Dependency-graph acquisition: exactly one record per repository.
    pub(crate) async fn api_records(
        &self,
        ctx: &TransferContext,
        repo: &str,
    ) -> Result<Vec<SbomRecord>> {
        let data = self
            .client
            .dependency_graph_sbom(ctx, &self.url.owner, repo)
            .await?;
        let path = format!("{}-{}-dependency-graph-sbom.json", self.url.owner, repo);
        Ok(vec![SbomRecord::new(
            data,
            path,
            self.namespace(repo),
            "latest",
        )])
    }

    /// Generator-tool acquisition: clone at the release commit (or the
    /// configured branch) and run the generator.
    pub(crate) async fn tool_records(
        &self,
        ctx: &TransferContext,
        repo: &str,
        release: Option<&Release>,
    ) -> Result<Vec<SbomRecord>> {
        let git_ref = match (&self.config.branch, release) {
            (Some(branch), _) => branch.clone(),
            (None, Some(release)) => release.tag_name.clone(),
            (None, None) => "HEAD".to_string(),
        };
        let sha = self
            .client
            .commit_sha(ctx, &self.url.owner, repo, &git_ref)
            .await?;
        let data = tool::generate_sbom(ctx, &self.url.clone_url(repo), &sha).await?;
        let version = release
            .map(|release| release.tag_name.clone())
            .unwrap_or_else(|| "latest".to_string());
        let path = format!("{}-{}-syft-generated-sbom.json", self.url.owner, repo);
        let mut record = SbomRecord::new(data, path, self.namespace(repo), version);
        if let Some(branch) = &self.config.branch {
            record = record.with_branch(branch.clone());
        }
        Ok(vec![record])
    }

    /// Runs the configured method against one repository.
    async fn fetch_repo(&self, ctx: &TransferContext, repo: &str) -> Result<Vec<SbomRecord>> {
        match self.config.method {
            GithubMethod::Release => {
                let releases = self.selected_releases(ctx, repo).await?;
                let mut records = Vec::new();
                for release in &releases {
                    records.extend(self.release_records(ctx, repo, release).await?);
                }
                Ok(records)
            }
            GithubMethod::Api => self.api_records(ctx, repo).await,
            GithubMethod::Tool => {
                let release = self
                    .client
                    .latest_release(ctx, &self.url.owner, repo)
                    .await?;
                self.tool_records(ctx, repo, release.as_ref()).await
            }
        }
    }

    async fn fetch_sequential(&self, ctx: &TransferContext, repos: Vec<String>) -> Vec<SbomRecord> {
        let mut records = Vec::new();
        for repo in repos {
            if ctx.is_cancelled() {
                break;
            }
            match self.fetch_repo(ctx, &repo).await {
                Ok(batch) => {
                    info!(repo = %repo, count = batch.len(), "fetched repository");
                    records.extend(batch);
                }
                Err(error) => {
                    warn!(repo = %repo, error = %error, "skipping repository: fetch failed");
                }
            }
        }
        records
    }

    async fn fetch_parallel(
        self: Arc<Self>,
        ctx: &TransferContext,
        repos: Vec<String>,
    ) -> Vec<SbomRecord> {
        let (repo_tx, repo_rx) = mpsc::channel::<String>(repos.len().max(1));
        let repo_rx = Arc::new(tokio::sync::Mutex::new(repo_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<Vec<SbomRecord>>(repos.len().max(1));

        for repo in repos {
            // Capacity covers the whole set, so this cannot block.
            let _ = repo_tx.try_send(repo);
        }
        drop(repo_tx);

        let mut workers = Vec::with_capacity(FETCH_WORKERS);
        for _ in 0..FETCH_WORKERS {
            let producer = Arc::clone(&self);
            let ctx = ctx.clone();
            let repo_rx = Arc::clone(&repo_rx);
            let result_tx = result_tx.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let repo = {
                        let mut rx = repo_rx.lock().await;
                        rx.recv().await
                    };
                    let Some(repo) = repo else { break };
                    if ctx.is_cancelled() {
                        break;
                    }
                    match producer.fetch_repo(&ctx, &repo).await {
                        Ok(batch) => {
                            let _ = result_tx.send(batch).await;
                        }
                        Err(error) => {
                            warn!(repo = %repo, error = %error, "skipping repository: fetch failed");
                        }
                    }
                }
            }));
        }
        drop(result_tx);

        let mut records = Vec::new();
        while let Some(batch) = result_rx.recv().await {
            records.extend(batch);
        }
        for worker in workers {
            let _ = worker.await;
        }
        records
    }
}

#[async_trait]
impl Producer for GithubProducer {
    fn name(&self) -> &'static str {
        "github"
    }

    fn validate(&self) -> Result<()> {
        if !self.config.include_repos.is_empty() && !self.config.exclude_repos.is_empty() {
            bail!(TransferError::config(
                "include and exclude repository filters are mutually exclusive",
            ));
        }
        if !self.url.is_organization()
            && (!self.config.include_repos.is_empty() || !self.config.exclude_repos.is_empty())
        {
            bail!(TransferError::config(
                "repository filters are only valid with an organization URL",
            ));
        }
        if self.config.branch.is_some() && self.config.method != GithubMethod::Tool {
            bail!(TransferError::config(
                "a branch can only be set with the `tool` method",
            ));
        }
        if self.config.method == GithubMethod::Api
            && matches!(self.url.version, VersionSpec::Tag(_))
        {
            bail!(TransferError::config(
                "the `api` method has no version selection; drop the pinned version",
            ));
        }
        Ok(())
    }

    async fn fetch(&self, ctx: &TransferContext) -> Result<SbomStream> {
        let repos = self.repo_set(ctx).await?;
        info!(count = repos.len(), method = self.config.method.as_str(), "fetching repositories");

        let records = match self.config.mode {
            ProcessingMode::Sequential => self.fetch_sequential(ctx, repos).await,
            ProcessingMode::Parallel => {
                // Arc so worker tasks can share the producer.
                let shared = Arc::new(Self {
                    config: self.config.clone(),
                    url: self.url.clone(),
                    client: Arc::clone(&self.client),
                });
                shared.fetch_parallel(ctx, repos).await
            }
        };
        Ok(SbomStream::from_records(records))
    }
}
