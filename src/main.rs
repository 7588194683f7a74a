//! CLI entry point for refetch.

use std::io::IsTerminal;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use refetch_core::{
    CancellationToken, ClientConfig, FetchRequest, HttpClient, ResumableReader, RetryPolicy,
};
use tracing::{debug, info, warn};

mod app;
mod cli;

use app::summary::FetchSummary;
use app::{progress_manager, terminal};
use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    terminal::init_tracing(args.default_log_level());
    debug!(?args, "CLI arguments parsed");

    let config = ClientConfig::default()
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_read_timeout(Duration::from_secs(args.read_timeout))
        .with_decompression(args.decompress)
        .with_retry_policy(RetryPolicy::with_max_attempts(u32::from(args.max_attempts)));
    let client = Arc::new(HttpClient::with_config(config).context("failed to build HTTP client")?);

    let cancel = CancellationToken::new();
    let mut request = FetchRequest::get(&args.url)?.with_cancellation(cancel.clone());
    for (name, value) in args.headers {
        request = request.with_header(name, value);
    }

    spawn_cancellation(cancel.clone(), args.deadline.map(Duration::from_secs));

    let reader = Arc::new(
        ResumableReader::open(client, request)
            .await
            .with_context(|| format!("failed to open {}", args.url))?,
    );
    info!(url = %args.url, size = reader.size(), "Fetching");

    let use_bar = terminal::should_use_progress_bar(
        std::io::stderr().is_terminal(),
        args.quiet,
        args.no_progress,
        terminal::is_dumb_terminal(),
    );
    let (handle, stop) =
        progress_manager::spawn_progress_ui(use_bar, Arc::clone(&reader), reader.size());

    let result = reader.save_to_file(&args.output).await;

    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = handle {
        let _ = handle.await;
    }
    reader.close();
    cancel.cancel();

    let bytes = result.with_context(|| {
        format!("failed to fetch {} to {}", args.url, args.output.display())
    })?;

    let summary = FetchSummary::from_reader(&reader, args.output, bytes);
    if args.json {
        println!("{}", summary.to_json()?);
    } else {
        info!(
            bytes = summary.bytes,
            resumes = summary.resumes,
            path = %summary.path.display(),
            "Fetch complete"
        );
    }

    Ok(())
}

/// Cancels `cancel` on Ctrl-C or once `deadline` elapses, whichever comes
/// first. Exits quietly if the token is cancelled elsewhere.
fn spawn_cancellation(cancel: CancellationToken, deadline: Option<Duration>) {
    tokio::spawn(async move {
        let interrupted = async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        let deadline_elapsed = async {
            match deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            () = cancel.cancelled() => return,
            () = interrupted => warn!("Interrupted, cancelling transfer"),
            () = deadline_elapsed => warn!(?deadline, "Deadline reached, cancelling transfer"),
        }
        cancel.cancel();
    });
}
