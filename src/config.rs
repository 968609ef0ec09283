//! Typed run configuration.
//!
//! The flag soup of the CLI is folded into one sum type per side, so an
//! adapter can only ever see the options that belong to it and "github flag
//! with folder adapter" mistakes become unrepresentable. Secrets come from
//! the environment exactly once, here.

use anyhow::bail;
use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::dtrack::DtrackConfig;
use crate::adapters::folder::{FolderInputConfig, FolderOutputConfig};
use crate::adapters::github::GithubConfig;
use crate::adapters::interlynk::InterlynkConfig;
use crate::adapters::s3::S3Config;
use crate::cli::{InputAdapter, OutputAdapter, TransferArgs};
use crate::shared::{Result, TransferError};
use crate::transfer::context::ProcessingMode;

/// Producer side of a run.
#[derive(Debug, Clone)]
pub enum InputConfig {
    Github(GithubConfig),
    Folder(FolderInputConfig),
}

impl InputConfig {
    pub fn tag(&self) -> &'static str {
        match self {
            InputConfig::Github(_) => "github",
            InputConfig::Folder(_) => "folder",
        }
    }
}

/// Consumer side of a run.
#[derive(Debug, Clone)]
pub enum OutputConfig {
    Folder(FolderOutputConfig),
    S3(S3Config),
    Interlynk(InterlynkConfig),
    Dtrack(DtrackConfig),
}

impl OutputConfig {
    pub fn tag(&self) -> &'static str {
        match self {
            OutputConfig::Folder(_) => "folder",
            OutputConfig::S3(_) => "s3",
            OutputConfig::Interlynk(_) => "interlynk",
            OutputConfig::Dtrack(_) => "dtrack",
        }
    }
}

/// Everything one invocation needs, resolved and typed.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub mode: ProcessingMode,
    pub daemon: bool,
    pub poll_interval: Duration,
    pub cache_path: PathBuf,
    pub dry_run: bool,
}

/// Reads an environment secret, treating empty values as unset.
fn env_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn split_repo_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|list| {
        list.split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn require<'a>(value: Option<&'a str>, flag: &str, adapter: &str) -> Result<&'a str> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => bail!(TransferError::config(format!(
            "{} is required with the {} adapter",
            flag, adapter
        ))),
    }
}

impl RunConfig {
    /// Builds the typed configuration from parsed flags and the environment.
    pub fn from_args(args: &TransferArgs) -> Result<Self> {
        let mode = args.processing_mode;

        let input = match args.input_adapter {
            InputAdapter::Github => InputConfig::Github(GithubConfig {
                url: require(args.in_github_url.as_deref(), "--in-github-url", "github")?
                    .to_string(),
                method: args.in_github_method,
                branch: args.in_github_branch.clone(),
                include_repos: split_repo_list(args.in_github_include_repos.as_deref()),
                exclude_repos: split_repo_list(args.in_github_exclude_repos.as_deref()),
                token: env_secret("GITHUB_TOKEN"),
                mode,
            }),
            InputAdapter::Folder => InputConfig::Folder(FolderInputConfig {
                path: PathBuf::from(require(
                    args.in_folder_path.as_deref(),
                    "--in-folder-path",
                    "folder",
                )?),
                recursive: args.in_folder_recursive,
                mode: args.in_folder_processing_mode.unwrap_or(mode),
            }),
        };

        let output = match args.output_adapter {
            OutputAdapter::Folder => OutputConfig::Folder(FolderOutputConfig {
                path: PathBuf::from(require(
                    args.out_folder_path.as_deref(),
                    "--out-folder-path",
                    "folder",
                )?),
                mode: args.out_folder_processing_mode.unwrap_or(mode),
            }),
            OutputAdapter::S3 => OutputConfig::S3(S3Config {
                bucket: require(args.out_s3_bucket.as_deref(), "--out-s3-bucket", "s3")?
                    .to_string(),
                prefix: args.out_s3_prefix.clone(),
                region: require(args.out_s3_region.as_deref(), "--out-s3-region", "s3")?
                    .to_string(),
                mode,
            }),
            OutputAdapter::Interlynk => OutputConfig::Interlynk(InterlynkConfig {
                url: args.out_interlynk_url.clone(),
                token: env_secret("INTERLYNK_SECURITY_TOKEN"),
                project_name: args.out_interlynk_project_name.clone(),
                project_env: args.out_interlynk_project_env.clone(),
            }),
            OutputAdapter::Dtrack => OutputConfig::Dtrack(DtrackConfig {
                url: require(args.out_dtrack_url.as_deref(), "--out-dtrack-url", "dtrack")?
                    .to_string(),
                api_key: env_secret("DTRACK_API_KEY"),
                project_name: args.out_dtrack_project_name.clone(),
                project_version: args.out_dtrack_project_version.clone(),
                overwrite: args.out_dtrack_overwrite,
                mode,
            }),
        };

        if args.daemon && !matches!(input, InputConfig::Github(_)) {
            bail!(TransferError::config(
                "--daemon requires the github input adapter",
            ));
        }

        Ok(Self {
            input,
            output,
            mode,
            daemon: args.daemon,
            poll_interval: Duration::from_secs(args.daemon_poll_interval.max(1)),
            cache_path: PathBuf::from(&args.daemon_cache),
            dry_run: args.dry_run,
        })
    }
}
