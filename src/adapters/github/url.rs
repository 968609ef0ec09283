use anyhow::bail;

use crate::shared::{Result, TransferError};

/// Release selection derived from the URL's `@version` suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// The newest release (first entry in reverse-chronological order).
    Latest,
    /// Every release of the repository.
    All,
    /// A single pinned tag, e.g. `v2.2.0`.
    Tag(String),
}

impl VersionSpec {
    pub fn as_str(&self) -> &str {
        match self {
            VersionSpec::Latest => "latest",
            VersionSpec::All => "all",
            VersionSpec::Tag(tag) => tag,
        }
    }
}

/// Parsed form of `--in-github-url`.
///
/// `host/owner` targets an organization; `host/owner/repo[@vX.Y.Z]` targets a
/// single repository, optionally pinned to a tag. An explicit `http://`
/// scheme is kept so tests can point the client at a plaintext mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubUrl {
    pub host: String,
    pub owner: String,
    pub repo: Option<String>,
    pub version: VersionSpec,
    /// True only when the URL carried an explicit `http://` scheme.
    pub plain_http: bool,
}

impl GithubUrl {
    /// Parses a GitHub URL of the form
    /// `[scheme://]host/owner[/repo][@version]`.
    ///
    /// The version must be `latest`, `all`, or a tag starting with `v`;
    /// anything else is rejected. A version suffix on an organization URL is
    /// rejected as well.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            bail!(TransferError::config("GitHub URL must not be empty"));
        }

        let (plain_http, rest) = if let Some(rest) = trimmed.strip_prefix("http://") {
            (true, rest)
        } else if let Some(rest) = trimmed.strip_prefix("https://") {
            (false, rest)
        } else {
            (false, trimmed)
        };

        let (path, version) = match rest.rsplit_once('@') {
            Some((path, version)) => (path, Some(version)),
            None => (rest, None),
        };

        let version = match version {
            None | Some("latest") => VersionSpec::Latest,
            Some("all") => VersionSpec::All,
            Some(tag) if tag.starts_with('v') && tag.len() > 1 => {
                VersionSpec::Tag(tag.to_string())
            }
            Some(other) => bail!(TransferError::config(format!(
                "invalid version `{}`: must be `latest`, `all`, or a tag starting with `v`",
                other
            ))),
        };

        let mut segments = path.trim_end_matches('/').split('/');
        let host = segments.next().unwrap_or_default();
        let owner = segments.next().unwrap_or_default();
        let repo = segments.next();
        if host.is_empty() || owner.is_empty() {
            bail!(TransferError::config(format!(
                "GitHub URL `{}` must look like host/owner or host/owner/repo",
                raw
            )));
        }
        if segments.next().is_some() {
            bail!(TransferError::config(format!(
                "GitHub URL `{}` has too many path segments",
                raw
            )));
        }
        if repo.is_none() && version != VersionSpec::Latest {
            bail!(TransferError::config(
                "a version can only be pinned on a single-repository URL",
            ));
        }

        Ok(Self {
            host: host.to_string(),
            owner: owner.to_string(),
            repo: repo.map(str::to_string),
            version,
            plain_http,
        })
    }

    /// True when the URL targets a whole organization rather than one repo.
    pub fn is_organization(&self) -> bool {
        self.repo.is_none()
    }

    /// Base URL of the REST API this host serves.
    ///
    /// github.com uses the dedicated api subdomain; an explicit `http://`
    /// scheme (mock servers) talks to the host directly; anything else is
    /// treated as a GitHub Enterprise host.
    pub fn api_base(&self) -> String {
        if self.plain_http {
            format!("http://{}", self.host)
        } else if self.host == "github.com" {
            "https://api.github.com".to_string()
        } else {
            format!("https://{}/api/v3", self.host)
        }
    }

    /// Clone URL for a repository under this host.
    pub fn clone_url(&self, repo: &str) -> String {
        let scheme = if self.plain_http { "http" } else { "https" };
        format!("{}://{}/{}/{}.git", scheme, self.host, self.owner, repo)
    }
}
