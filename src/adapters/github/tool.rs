//! Generator-tool acquisition: shallow-clone the repository at a release's
//! commit and run the external SBOM generator over the working tree.

use anyhow::{anyhow, bail};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

use crate::shared::{Result, TransferError};
use crate::transfer::context::TransferContext;

/// External generator binary; must be on PATH.
pub const GENERATOR_BINARY: &str = "syft";

/// Seconds to wait for the generator's output file to appear.
const OUTPUT_WAIT_SECONDS: u64 = 5;

/// Runs `program` with `args`, killed when the context is cancelled.
async fn run_checked(
    ctx: &TransferContext,
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<()> {
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    let mut child = command.spawn().map_err(|e| {
        anyhow!(TransferError::ChildProcess {
            program: program.to_string(),
            details: format!("failed to spawn: {}", e),
        })
    })?;

    let status = tokio::select! {
        _ = ctx.cancel.cancelled() => {
            let _ = child.kill().await;
            bail!(TransferError::Cancelled);
        }
        status = child.wait() => status.map_err(|e| anyhow!(TransferError::ChildProcess {
            program: program.to_string(),
            details: e.to_string(),
        }))?,
    };

    if !status.success() {
        bail!(TransferError::ChildProcess {
            program: program.to_string(),
            details: format!("exited with {}", status),
        });
    }
    Ok(())
}

async fn binary_available(ctx: &TransferContext, program: &str) -> bool {
    run_checked(ctx, program, &["--version"], None).await.is_ok()
}

/// Shallow-clones `clone_url` at `sha` into a fresh directory under `parent`.
async fn shallow_clone_at(
    ctx: &TransferContext,
    parent: &Path,
    clone_url: &str,
    sha: &str,
) -> Result<std::path::PathBuf> {
    let repo_dir = parent.join("repo");
    tokio::fs::create_dir_all(&repo_dir).await?;
    let dir = repo_dir.as_path();

    run_checked(ctx, "git", &["init", "--quiet"], Some(dir)).await?;
    run_checked(ctx, "git", &["remote", "add", "origin", clone_url], Some(dir)).await?;
    run_checked(
        ctx,
        "git",
        &["fetch", "--quiet", "--depth", "1", "origin", sha],
        Some(dir),
    )
    .await?;
    run_checked(ctx, "git", &["checkout", "--quiet", "FETCH_HEAD"], Some(dir)).await?;
    Ok(repo_dir)
}

/// Clones the repository at `sha` and runs the generator, returning the SPDX
/// JSON bytes it produced. The temporary tree is removed on every exit path.
///
/// Fails when the generator binary or `git` is missing, when the clone or the
/// generator exits non-zero, or when the output file never appears within the
/// wait window.
pub async fn generate_sbom(
    ctx: &TransferContext,
    clone_url: &str,
    sha: &str,
) -> Result<Vec<u8>> {
    if !binary_available(ctx, "git").await {
        bail!(TransferError::ChildProcess {
            program: "git".to_string(),
            details: "not found on PATH".to_string(),
        });
    }
    if !binary_available(ctx, GENERATOR_BINARY).await {
        bail!(TransferError::ChildProcess {
            program: GENERATOR_BINARY.to_string(),
            details: "not found on PATH".to_string(),
        });
    }

    // Dropping the TempDir removes the clone and the output file.
    let scratch = TempDir::new()?;
    let repo_dir = shallow_clone_at(ctx, scratch.path(), clone_url, sha).await?;
    let output_path = scratch.path().join("sbom.spdx.json");

    let dir_arg = format!("dir:{}", repo_dir.display());
    let out_arg = format!("spdx-json={}", output_path.display());
    debug!(clone_url, sha, "running SBOM generator");
    run_checked(
        ctx,
        GENERATOR_BINARY,
        &["scan", &dir_arg, "-o", &out_arg],
        None,
    )
    .await?;

    // The generator occasionally flushes the file a moment after exiting.
    wait_for_output(ctx, &output_path, OUTPUT_WAIT_SECONDS).await
}

/// Polls once per second for `path` to appear, up to `window` seconds. The
/// check also runs after the final sleep, so a file landing at the very end
/// of the window is still picked up.
async fn wait_for_output(ctx: &TransferContext, path: &Path, window: u64) -> Result<Vec<u8>> {
    for waited in 0..=window {
        if path.exists() {
            let data = tokio::fs::read(path).await?;
            return Ok(data);
        }
        if waited == window {
            break;
        }
        tokio::select! {
            _ = ctx.cancel.cancelled() => bail!(TransferError::Cancelled),
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }

    Err(anyhow!(TransferError::ChildProcess {
        program: GENERATOR_BINARY.to_string(),
        details: format!("output file {} never appeared", path.display()),
    }))
}
