//! Command-line surface.
//!
//! One `transfer` command carries the full flag set; per-adapter flags are
//! namespaced (`--in-github-*`, `--out-dtrack-*`) so unrelated pairs never
//! collide. Cross-flag validation lives in [`crate::config`], which turns a
//! parsed [`TransferArgs`] into a typed run configuration.

use clap::{Parser, Subcommand};

use crate::adapters::interlynk::DEFAULT_INTERLYNK_URL;
use crate::adapters::watcher::cache::DEFAULT_CACHE_PATH;
use crate::adapters::watcher::DEFAULT_POLL_INTERVAL_SECONDS;
use crate::transfer::context::ProcessingMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAdapter {
    Github,
    Folder,
}

impl std::str::FromStr for InputAdapter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(InputAdapter::Github),
            "folder" => Ok(InputAdapter::Folder),
            _ => Err(format!(
                "Invalid input adapter: {}. Please specify 'github' or 'folder'",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputAdapter {
    Folder,
    S3,
    Interlynk,
    Dtrack,
}

impl std::str::FromStr for OutputAdapter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "folder" => Ok(OutputAdapter::Folder),
            "s3" => Ok(OutputAdapter::S3),
            "interlynk" => Ok(OutputAdapter::Interlynk),
            "dtrack" => Ok(OutputAdapter::Dtrack),
            _ => Err(format!(
                "Invalid output adapter: {}. Please specify 'folder', 's3', 'interlynk' or 'dtrack'",
                s
            )),
        }
    }
}

/// Move SBOMs between systems
#[derive(Parser, Debug)]
#[command(name = "sbommv")]
#[command(version)]
#[command(about = "Transfer SBOMs from producers to consumers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one transfer (or a long-lived watcher with --daemon)
    Transfer(TransferArgs),
}

#[derive(clap::Args, Debug)]
pub struct TransferArgs {
    /// Where SBOMs come from: github or folder
    #[arg(long = "input-adapter")]
    pub input_adapter: InputAdapter,

    /// Where SBOMs go: folder, s3, interlynk or dtrack
    #[arg(long = "output-adapter")]
    pub output_adapter: OutputAdapter,

    /// Repository or organization URL, optionally with @<version>
    /// (e.g. github.com/sigstore/cosign@v2.2.0, github.com/sigstore@all)
    #[arg(long = "in-github-url")]
    pub in_github_url: Option<String>,

    /// Acquisition method: release, api or tool
    #[arg(long = "in-github-method", default_value = "release")]
    pub in_github_method: crate::adapters::github::GithubMethod,

    /// Branch to generate from (tool method only)
    #[arg(long = "in-github-branch")]
    pub in_github_branch: Option<String>,

    /// Comma-separated repositories to include (organization URL only)
    #[arg(long = "in-github-include-repos")]
    pub in_github_include_repos: Option<String>,

    /// Comma-separated repositories to exclude (organization URL only)
    #[arg(long = "in-github-exclude-repos")]
    pub in_github_exclude_repos: Option<String>,

    /// Directory to scan for SBOM files
    #[arg(long = "in-folder-path")]
    pub in_folder_path: Option<String>,

    /// Recurse into subdirectories
    #[arg(long = "in-folder-recursive", default_value_t = false)]
    pub in_folder_recursive: bool,

    /// Overrides --processing-mode for the folder producer
    #[arg(long = "in-folder-processing-mode")]
    pub in_folder_processing_mode: Option<ProcessingMode>,

    /// Directory to write SBOMs into
    #[arg(long = "out-folder-path")]
    pub out_folder_path: Option<String>,

    /// Overrides --processing-mode for the folder consumer
    #[arg(long = "out-folder-processing-mode")]
    pub out_folder_processing_mode: Option<ProcessingMode>,

    /// Target S3 bucket
    #[arg(long = "out-s3-bucket")]
    pub out_s3_bucket: Option<String>,

    /// Key prefix inside the bucket
    #[arg(long = "out-s3-prefix", default_value = "")]
    pub out_s3_prefix: String,

    /// Bucket region
    #[arg(long = "out-s3-region")]
    pub out_s3_region: Option<String>,

    /// Interlynk API endpoint
    #[arg(long = "out-interlynk-url", default_value = DEFAULT_INTERLYNK_URL)]
    pub out_interlynk_url: String,

    /// Project name override (defaults to per-SBOM resolution)
    #[arg(long = "out-interlynk-project-name")]
    pub out_interlynk_project_name: Option<String>,

    /// Project environment (e.g. production)
    #[arg(long = "out-interlynk-project-env")]
    pub out_interlynk_project_env: Option<String>,

    /// Dependency-Track API endpoint
    #[arg(long = "out-dtrack-url")]
    pub out_dtrack_url: Option<String>,

    /// Project name override (defaults to per-SBOM resolution)
    #[arg(long = "out-dtrack-project-name")]
    pub out_dtrack_project_name: Option<String>,

    /// Project version
    #[arg(long = "out-dtrack-project-version", default_value = "latest")]
    pub out_dtrack_project_version: String,

    /// Replace BOMs on projects that already have one
    #[arg(long = "out-dtrack-overwrite", default_value_t = false)]
    pub out_dtrack_overwrite: bool,

    /// sequential or parallel, applied to both adapters
    #[arg(long = "processing-mode", default_value = "sequential")]
    pub processing_mode: ProcessingMode,

    /// Keep running and poll for new releases (github input only)
    #[arg(long = "daemon", default_value_t = false)]
    pub daemon: bool,

    /// Seconds between daemon poll ticks
    #[arg(long = "daemon-poll-interval", default_value_t = DEFAULT_POLL_INTERVAL_SECONDS)]
    pub daemon_poll_interval: u64,

    /// Watcher cache file
    #[arg(long = "daemon-cache", default_value = DEFAULT_CACHE_PATH)]
    pub daemon_cache: String,

    /// Enumerate without uploading
    #[arg(long = "dry-run", default_value_t = false)]
    pub dry_run: bool,

    /// Verbose logging
    #[arg(long = "debug", default_value_t = false)]
    pub debug: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_input_adapter_from_str() {
        assert_eq!(InputAdapter::from_str("github").unwrap(), InputAdapter::Github);
        assert_eq!(InputAdapter::from_str("FOLDER").unwrap(), InputAdapter::Folder);
        assert!(InputAdapter::from_str("gitlab").is_err());
    }

    #[test]
    fn test_output_adapter_from_str() {
        assert_eq!(OutputAdapter::from_str("dtrack").unwrap(), OutputAdapter::Dtrack);
        assert_eq!(OutputAdapter::from_str("S3").unwrap(), OutputAdapter::S3);
        assert!(OutputAdapter::from_str("ftp").is_err());
    }

    #[test]
    fn test_transfer_args_parse_minimal_folder_pair() {
        let cli = Cli::try_parse_from([
            "sbommv",
            "transfer",
            "--input-adapter",
            "folder",
            "--output-adapter",
            "folder",
            "--in-folder-path",
            "/tmp/in",
            "--out-folder-path",
            "/tmp/out",
        ])
        .unwrap();
        let Command::Transfer(args) = cli.command;
        assert_eq!(args.input_adapter, InputAdapter::Folder);
        assert_eq!(args.output_adapter, OutputAdapter::Folder);
        assert!(!args.daemon);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_transfer_args_reject_unknown_method() {
        let result = Cli::try_parse_from([
            "sbommv",
            "transfer",
            "--input-adapter",
            "github",
            "--output-adapter",
            "folder",
            "--in-github-url",
            "github.com/sigstore/cosign",
            "--in-github-method",
            "graph",
            "--out-folder-path",
            "/tmp/out",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_transfer_args_default_dtrack_version() {
        let cli = Cli::try_parse_from([
            "sbommv",
            "transfer",
            "--input-adapter",
            "folder",
            "--output-adapter",
            "dtrack",
            "--in-folder-path",
            "/tmp/in",
            "--out-dtrack-url",
            "http://localhost:8081",
        ])
        .unwrap();
        let Command::Transfer(args) = cli.command;
        assert_eq!(args.out_dtrack_project_version, "latest");
        assert!(!args.out_dtrack_overwrite);
    }
}
