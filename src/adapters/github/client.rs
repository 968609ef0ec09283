use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::shared::{Result, TransferError};
use crate::transfer::context::TransferContext;

/// Per-request timeout shared by every HTTP client in the pipeline.
pub const HTTP_TIMEOUT_SECONDS: u64 = 30;

/// Default shared request rate for parallel fetches.
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 5;

const PER_PAGE: u32 = 100;
const MAX_ATTEMPTS: u32 = 3;

/// Token-bucket style pacing limiter shared across fetch workers.
///
/// Grants one slot every `interval`; callers suspend until their slot comes
/// up, which keeps the aggregate request rate at the configured budget no
/// matter how many workers share the limiter.
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    pub fn per_second(requests: u32) -> Self {
        let requests = requests.max(1);
        Self {
            interval: Duration::from_millis(1000 / u64::from(requests)),
            next_slot: Mutex::new(Instant::now()),
        }
    }

    pub async fn acquire(&self) {
        let wait_until = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = (*next).max(now);
            *next = slot + self.interval;
            slot
        };
        tokio::time::sleep_until(wait_until).await;
    }
}

/// A GitHub release, reduced to the fields the pipeline uses.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// A release asset, reduced to the fields the pipeline uses.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Commit {
    sha: String,
}

/// Async client for the GitHub REST API.
///
/// Shared across fetch workers; construction happens once per run. Rate-limit
/// responses (429) and transport failures retry with linear backoff (1s, 2s,
/// 3s); authentication and not-found responses surface immediately as their
/// typed errors.
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
    limiter: Arc<RateLimiter>,
}

impl GithubClient {
    pub fn new(api_base: String, token: Option<String>) -> Result<Self> {
        let user_agent = format!("sbommv/{}", env!("CARGO_PKG_VERSION"));
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            http,
            api_base,
            token,
            limiter: Arc::new(RateLimiter::per_second(DEFAULT_REQUESTS_PER_SECOND)),
        })
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Sends a GET observing cancellation, pacing and the retry policy.
    async fn get(&self, ctx: &TransferContext, url: &str) -> Result<reqwest::Response> {
        for attempt in 1..=MAX_ATTEMPTS {
            if ctx.is_cancelled() {
                bail!(TransferError::Cancelled);
            }
            self.limiter.acquire().await;

            let outcome = tokio::select! {
                _ = ctx.cancel.cancelled() => bail!(TransferError::Cancelled),
                sent = self.request(url).send() => sent,
            };

            let retryable = match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    match status.as_u16() {
                        401 | 403 => bail!(TransferError::Authentication {
                            service: "github".to_string(),
                            details: format!("{} returned {}", url, status),
                        }),
                        404 => bail!(TransferError::NotFound {
                            what: url.to_string(),
                        }),
                        429 => {
                            warn!(url, attempt, "GitHub rate limit hit");
                            true
                        }
                        _ => bail!(TransferError::Network {
                            endpoint: url.to_string(),
                            details: format!("unexpected status {}", status),
                        }),
                    }
                }
                Err(error) => {
                    warn!(url, attempt, error = %error, "transport failure");
                    true
                }
            };

            if retryable && attempt < MAX_ATTEMPTS {
                // Linear backoff: 1s, 2s, 3s.
                let backoff = Duration::from_secs(u64::from(attempt));
                tokio::select! {
                    _ = ctx.cancel.cancelled() => bail!(TransferError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }
        Err(anyhow!(TransferError::RateLimited {
            service: "github".to_string(),
            attempts: MAX_ATTEMPTS,
        }))
    }

    /// Lists releases in the host's reverse-chronological order.
    pub async fn list_releases(
        &self,
        ctx: &TransferContext,
        owner: &str,
        repo: &str,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<Release>> {
        let url = format!(
            "{}/repos/{}/{}/releases?per_page={}&page={}",
            self.api_base, owner, repo, per_page, page
        );
        let response = self.get(ctx, &url).await?;
        response
            .json::<Vec<Release>>()
            .await
            .with_context(|| format!("failed to decode releases for {}/{}", owner, repo))
    }

    /// Returns the newest release, or `None` when the repo has none.
    pub async fn latest_release(
        &self,
        ctx: &TransferContext,
        owner: &str,
        repo: &str,
    ) -> Result<Option<Release>> {
        let releases = self.list_releases(ctx, owner, repo, 1, 1).await?;
        Ok(releases.into_iter().next())
    }

    /// Every release of the repository, paginated.
    pub async fn all_releases(
        &self,
        ctx: &TransferContext,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<Release>> {
        let mut releases = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.list_releases(ctx, owner, repo, PER_PAGE, page).await?;
            let done = batch.len() < PER_PAGE as usize;
            releases.extend(batch);
            if done {
                break;
            }
            page += 1;
        }
        Ok(releases)
    }

    pub async fn release_by_tag(
        &self,
        ctx: &TransferContext,
        owner: &str,
        repo: &str,
        tag: &str,
    ) -> Result<Release> {
        let url = format!(
            "{}/repos/{}/{}/releases/tags/{}",
            self.api_base, owner, repo, tag
        );
        let response = self.get(ctx, &url).await?;
        response
            .json::<Release>()
            .await
            .with_context(|| format!("failed to decode release {} of {}/{}", tag, owner, repo))
    }

    /// Enumerates a release's assets, 100 per page.
    pub async fn list_assets(
        &self,
        ctx: &TransferContext,
        owner: &str,
        repo: &str,
        release_id: u64,
    ) -> Result<Vec<Asset>> {
        let mut assets = Vec::new();
        let mut page = 1;
        loop {
            let url = format!(
                "{}/repos/{}/{}/releases/{}/assets?per_page={}&page={}",
                self.api_base, owner, repo, release_id, PER_PAGE, page
            );
            let response = self.get(ctx, &url).await?;
            let batch: Vec<Asset> = response
                .json()
                .await
                .with_context(|| format!("failed to decode assets of release {}", release_id))?;
            let done = batch.len() < PER_PAGE as usize;
            assets.extend(batch);
            if done {
                break;
            }
            page += 1;
        }
        Ok(assets)
    }

    /// Downloads an asset (or any URL the API handed out).
    pub async fn download(&self, ctx: &TransferContext, url: &str) -> Result<Vec<u8>> {
        let response = self.get(ctx, url).await?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to download {}", url))?;
        Ok(bytes.to_vec())
    }

    /// Fetches the dependency-graph SBOM; GitHub nests the document under a
    /// top-level `sbom` key, which is unwrapped here.
    pub async fn dependency_graph_sbom(
        &self,
        ctx: &TransferContext,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<u8>> {
        let url = format!(
            "{}/repos/{}/{}/dependency-graph/sbom",
            self.api_base, owner, repo
        );
        let response = self.get(ctx, &url).await?;
        let body: Value = response.json().await.map_err(|e| {
            anyhow!(TransferError::Decode {
                origin: format!("{}/{} dependency graph", owner, repo),
                details: e.to_string(),
            })
        })?;
        let sbom = body.get("sbom").ok_or_else(|| {
            anyhow!(TransferError::Decode {
                origin: format!("{}/{} dependency graph", owner, repo),
                details: "response has no `sbom` key".to_string(),
            })
        })?;
        Ok(serde_json::to_vec(sbom)?)
    }

    /// Lists all repository names of an organization, paginated.
    pub async fn list_org_repos(&self, ctx: &TransferContext, org: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page = 1;
        loop {
            let url = format!(
                "{}/orgs/{}/repos?per_page={}&page={}",
                self.api_base, org, PER_PAGE, page
            );
            let response = self.get(ctx, &url).await?;
            let batch: Vec<Repository> = response
                .json()
                .await
                .with_context(|| format!("failed to decode repositories of {}", org))?;
            let done = batch.len() < PER_PAGE as usize;
            names.extend(batch.into_iter().map(|repo| repo.name));
            if done {
                break;
            }
            page += 1;
        }
        debug!(org, count = names.len(), "enumerated organization repositories");
        Ok(names)
    }

    /// Resolves a tag or branch to its commit SHA.
    pub async fn commit_sha(
        &self,
        ctx: &TransferContext,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> Result<String> {
        let url = format!(
            "{}/repos/{}/{}/commits/{}",
            self.api_base, owner, repo, git_ref
        );
        let response = self.get(ctx, &url).await?;
        let commit: Commit = response
            .json()
            .await
            .with_context(|| format!("failed to decode commit for ref {}", git_ref))?;
        Ok(commit.sha)
    }
}
