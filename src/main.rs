//! CLI entry point for the mirrordl tool.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use mirrordl_core::{
    Fetcher, FilterConfig, HostPolicy, MirrorEngine, RetryPolicy, StartTarget,
};
use tracing::{debug, error, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    // Argument validation: nothing below touches the network until it passes
    let hosts = HostPolicy::default()
        .with_hosts(&args.allow_hosts)
        .allow_unknown(args.allow_unknown_source);
    let target = StartTarget::parse(&args.url, args.source.kind(), &hosts)
        .unwrap_or_else(|e| Args::command().error(ErrorKind::ValueValidation, e).exit());
    let filter = FilterConfig::new(args.regex.as_deref(), args.condition.as_deref())
        .unwrap_or_else(|e| Args::command().error(ErrorKind::ValueValidation, e).exit());

    info!(
        url = %target.url(),
        source = %target.kind(),
        root = %target.root(),
        output = %args.output.display(),
        filtered = filter.is_active(),
        "Mirrordl starting"
    );

    let fetcher = Fetcher::new(RetryPolicy::default()).context("failed to build HTTP client")?;
    let engine = MirrorEngine::new(fetcher, target.listing_source(), filter, &args.output);

    let stats = match engine.run(target.root()).await {
        Ok(stats) => stats,
        Err(e) => {
            error!("Aborted. {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    for failed in stats.failed() {
        warn!(url = %failed.url, target = %failed.target.display(), reason = %failed.reason, "Not downloaded");
    }

    info!(
        folders = stats.folders(),
        downloaded = stats.downloaded(),
        skipped = stats.skipped(),
        filtered = stats.filtered(),
        failed = stats.failed().len(),
        bytes = stats.bytes(),
        "Mirror complete"
    );

    Ok(ExitCode::SUCCESS)
}
