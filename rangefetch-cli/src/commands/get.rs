//! Get command - download a byte range of an object.
//!
//! The range is written to `--dest`, or to stdout with `--stream`. With
//! `--async` the download runs in the background and its progress is
//! followed through the download queue.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use rangefetch::{
    ConfigFile, DownloadId, DownloadInfo, DownloadManager, DownloadParams, DownloadQueue,
    DownloadState, ResponseBody, Submission,
};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::common::{create_runtime, format_size, StoreArgs};
use crate::error::CliError;

/// Queue poll interval while following a background download.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Logical object path
    pub path: String,

    /// First byte to download
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub offset: i64,

    /// Number of bytes to download
    #[arg(long, allow_hyphen_values = true)]
    pub length: i64,

    /// Absolute path of the output file
    #[arg(long, value_name = "PATH")]
    pub dest: Option<PathBuf>,

    /// Write the range to stdout
    #[arg(long)]
    pub stream: bool,

    /// Run in the background and follow progress
    #[arg(long = "async")]
    pub nonblocking: bool,

    /// Print the final queue entry as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl GetArgs {
    fn params(&self) -> DownloadParams {
        DownloadParams {
            path: self.path.clone(),
            offset: self.offset,
            length: self.length,
            destination: self.dest.clone(),
            stream: self.stream,
            nonblocking: self.nonblocking,
        }
    }
}

/// Run the get command.
pub fn run(args: GetArgs, config: &ConfigFile) -> Result<(), CliError> {
    let store = args.store.open(config);
    let manager = DownloadManager::new(
        store.clone(),
        store,
        Arc::new(DownloadQueue::new()),
        config.download.clone(),
    );

    // Ctrl+C cancels the request; background downloads are shut down by
    // the watcher.
    let cancel = CancellationToken::new();
    let handler_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, cancelling download...");
        handler_cancel.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let runtime = create_runtime()?;
    let info = runtime.block_on(download(&manager, args.params(), cancel))?;
    report(&info, &args)
}

async fn download(
    manager: &DownloadManager,
    params: DownloadParams,
    cancel: CancellationToken,
) -> Result<DownloadInfo, CliError> {
    if params.stream {
        let (sink, body) = manager.stream_channel();
        let writer = tokio::spawn(write_body(body));

        // A rejected request drops the sink, which ends the body.
        let submitted = manager.submit(params, Some(sink), cancel).await;
        let written = writer
            .await
            .map_err(|e| CliError::Output(io::Error::new(io::ErrorKind::Other, e)));

        let info = finished(manager, submitted?, CancellationToken::new()).await?;
        let bytes = written??;
        debug!(bytes, "Wrote body to stdout");
        return Ok(info);
    }

    let submission = manager.submit(params, None, cancel.clone()).await?;
    finished(manager, submission, cancel).await
}

async fn finished(
    manager: &DownloadManager,
    submission: Submission,
    cancel: CancellationToken,
) -> Result<DownloadInfo, CliError> {
    match submission {
        Submission::Completed(info) => Ok(info),
        Submission::Queued(id) => watch(manager, id, cancel).await,
    }
}

/// Copy the response body to stdout.
async fn write_body(mut body: ResponseBody) -> Result<u64, CliError> {
    let mut stdout = tokio::io::stdout();
    let mut written = 0u64;
    while let Some(slice) = body.next().await {
        stdout.write_all(&slice).await?;
        written += slice.len() as u64;
    }
    stdout.flush().await?;
    Ok(written)
}

/// Follow a background download until it is terminal.
async fn watch(
    manager: &DownloadManager,
    id: DownloadId,
    cancel: CancellationToken,
) -> Result<DownloadInfo, CliError> {
    let lookup = || {
        manager
            .queue()
            .get(id)
            .ok_or_else(|| CliError::Config(format!("download {} is not registered", id)))
    };

    let bar = ProgressBar::new(lookup()?.total_size);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")
        .map_err(|e| CliError::Config(e.to_string()))?
        .progress_chars("=> ");
    bar.set_style(style);
    bar.set_message(format!("download {}", id));

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => manager.shutdown().await,
            _ = ticker.tick() => {}
        }

        let info = lookup()?;
        bar.set_position(info.received);
        if info.state.is_terminal() {
            bar.finish_and_clear();
            return Ok(info);
        }
    }
}

fn report(info: &DownloadInfo, args: &GetArgs) -> Result<(), CliError> {
    // Keep stdout clean when it carries the body.
    let mut out: Box<dyn Write> = if args.stream {
        Box::new(io::stderr())
    } else {
        Box::new(io::stdout())
    };

    if args.json {
        let json =
            serde_json::to_string_pretty(info).map_err(|e| CliError::Output(e.into()))?;
        writeln!(out, "{}", json)?;
    }

    if info.state == DownloadState::Failed {
        return Err(CliError::DownloadFailed {
            id: info.id.get(),
            error: info.error.clone(),
        });
    }

    if !args.json {
        writeln!(
            out,
            "Downloaded {} of {} (offset {}) to {}",
            format_size(info.received),
            info.path,
            info.offset,
            info.destination
        )?;
    }
    Ok(())
}
