use std::process;

use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use sbommv::cli::{Cli, Command};
use sbommv::config::RunConfig;
use sbommv::shared::{ExitCode, Result};
use sbommv::transfer::engine::TransferEngine;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("\n❌ An error occurred:\n");
        eprintln!("{}", e);

        // Display error chain
        let mut source = e.source();
        while let Some(err) = source {
            eprintln!("\nCaused by: {}", err);
            source = err.source();
        }

        eprintln!();
        process::exit(ExitCode::Failure.as_i32());
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let Command::Transfer(args) = cli.command;

    init_logging(args.debug);

    let config = RunConfig::from_args(&args)?;
    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let engine = TransferEngine::new(config);
    engine.run(cancel).await?;
    Ok(())
}

fn init_logging(debug: bool) {
    let default_directive = if debug { "sbommv=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// First Ctrl-C cancels the run; the pipeline then drains and exits through
/// the normal path.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("interrupt received, shutting down");
                cancel.cancel();
            }
            Err(error) => {
                warn!(error = %error, "failed to install interrupt handler");
            }
        }
    });
}
