//! CLI entry point for the webtoon downloader.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};
use webtoon_dl_core::{
    DownloadConfig, DownloadEngine, HttpClient, JsonCatalogResolver, ProgressSnapshot,
    RetryPolicy, RunStatus,
};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
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

    let quiet = args.quiet;
    let max_attempts = u32::from(args.max_attempts);
    let config = DownloadConfig::from_options(args.into_options())?;

    let client = HttpClient::new().shared();
    let policy = RetryPolicy::with_max_attempts(max_attempts);
    let (engine, progress_rx) = DownloadEngine::new(config.clone(), client, policy);

    // First Ctrl-C cancels the run; in-flight chapters finish failing fast.
    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let bar = (!quiet).then(progress_bar);
    let bar_task = bar.clone().map(|bar| {
        let mut rx = progress_rx;
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = *rx.borrow();
                render_progress(&bar, snapshot);
            }
        })
    });

    let resolver = Arc::new(JsonCatalogResolver::new(config.source.clone()));
    let result = engine.run(resolver).await;

    if let Some(task) = bar_task {
        task.abort();
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    info!(
        succeeded = result.succeeded(),
        partial = result.partially_failed(),
        failed = result.failed(),
        chapters = result.chapters.len(),
        "run finished"
    );
    for failure in &result.failures {
        match (failure.chapter, failure.image) {
            (Some(chapter), Some(image)) => {
                warn!(chapter, image, "{}", failure.message);
            }
            (Some(chapter), None) => warn!(chapter, "{}", failure.message),
            _ => warn!("{}", failure.message),
        }
    }

    let full_success = result.is_full_success();
    match result.status {
        RunStatus::Failed(error) => Err(anyhow::Error::new(error)),
        RunStatus::Completed if full_success => Ok(ExitCode::SUCCESS),
        RunStatus::Completed => Ok(ExitCode::FAILURE),
    }
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} images  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn render_progress(bar: &ProgressBar, snapshot: ProgressSnapshot) {
    bar.set_length(snapshot.images_total as u64);
    bar.set_position(snapshot.images_done as u64);
    bar.set_message(format!(
        "{}/{} chapters",
        snapshot.chapters_done, snapshot.chapters_total
    ));
}
