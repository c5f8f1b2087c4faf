mod classifier;
mod cli;
mod hotkeys;
mod model;
mod orchestrator;
mod output;
mod process;
mod storage;
mod text_summary;
mod voice;
mod workspace;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_tracing(args.quiet, args.verbose)?;

    // Exit explicitly: a listener thread blocked on stdin would otherwise
    // keep the process alive after shutdown.
    match cli::run(args).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:?}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("ROSE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Raw mode is on while hotkeys are active, so log lines need CRLF.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(|| output::CrlfStderr)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
