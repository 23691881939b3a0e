//! Chunk plan execution.
//!
//! Fetches run ahead of delivery by up to `lookahead` chunks, but slices
//! reach the sink strictly in plan order:
//!
//! ```text
//!  ChunkStore ──fetch(i), fetch(i+1), .. fetch(i+lookahead-1)──▶ buffered
//!                                                                 │ ordered
//!                                                                 ▼
//!                                 write(slice i) ──▶ Sink ──▶ received += len
//! ```
//!
//! The cancellation token is checked before every fetch is issued and raced
//! against every wait for a fetch or a write. The sink is closed before the
//! terminal state is published, whatever the outcome. A download whose
//! future is dropped before finishing is failed as cancelled.

use std::io;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::record::{Download, FailOnDrop};
use crate::error::{DownloadError, DownloadResult};
use crate::object::{ChunkStore, StoreError};
use crate::planner::{ChunkPlan, ChunkRange};
use crate::sink::Sink;

/// Run `plan` for `download`, writing through `sink`.
///
/// Drives the download from `Pending` to a terminal state. Every error is
/// recorded on the download before it is returned.
///
/// # Arguments
///
/// * `download` - The registered record to update
/// * `plan` - Chunk ranges for the requested window
/// * `store` - Source of decoded chunks
/// * `sink` - Destination, closed before returning
/// * `cancel` - Request-scoped cancellation signal
/// * `lookahead` - Maximum concurrent chunk fetches (at least 1)
pub async fn execute(
    download: &Download,
    plan: &ChunkPlan,
    store: &dyn ChunkStore,
    sink: &mut dyn Sink,
    cancel: &CancellationToken,
    lookahead: usize,
) -> DownloadResult<()> {
    let _abandoned = FailOnDrop::new(download);
    download.start();
    debug!(
        id = %download.id(),
        path = %download.path(),
        chunks = plan.len(),
        lookahead,
        "Download running"
    );

    let mut result = deliver(download, plan, store, sink, cancel, lookahead.max(1)).await;
    if result.is_ok() {
        result = sink.finish().await.map_err(|source| DownloadError::SinkWriteFailed {
            destination: sink.describe(),
            source,
        });
    }

    // Observers of the terminal state must find the sink released.
    sink.close().await;

    match &result {
        Ok(()) => {
            download.complete();
            info!(
                id = %download.id(),
                path = %download.path(),
                bytes = download.received(),
                "Download completed"
            );
        }
        Err(e) => {
            download.fail(e);
            warn!(
                id = %download.id(),
                path = %download.path(),
                received = download.received(),
                category = e.category(),
                error = %e,
                "Download failed"
            );
        }
    }

    result
}

async fn deliver(
    download: &Download,
    plan: &ChunkPlan,
    store: &dyn ChunkStore,
    sink: &mut dyn Sink,
    cancel: &CancellationToken,
    lookahead: usize,
) -> DownloadResult<()> {
    let path = download.path();

    let mut fetches = stream::iter(plan.ranges().iter().copied())
        .map(|range| async move {
            if cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            let chunk = store
                .fetch_chunk(path, range.index)
                .await
                .map_err(|source| DownloadError::ChunkFetchFailed {
                    path: path.to_string(),
                    index: range.index,
                    source,
                })?;
            Ok((range, chunk))
        })
        .buffered(lookahead);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            next = fetches.next() => next,
        };
        let Some(fetched) = next else {
            return Ok(());
        };
        let (range, chunk) = fetched?;
        let slice = slice_chunk(path, &range, chunk)?;

        if sink.is_closed() {
            return Err(DownloadError::SinkWriteFailed {
                destination: sink.describe(),
                source: io::Error::new(io::ErrorKind::BrokenPipe, "sink is closed"),
            });
        }

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            written = sink.write(slice) => written,
        };
        written.map_err(|source| DownloadError::SinkWriteFailed {
            destination: sink.describe(),
            source,
        })?;

        download.add_received(range.len());
        trace!(
            id = %download.id(),
            index = range.index,
            bytes = range.len(),
            received = download.received(),
            "Delivered chunk range"
        );
    }
}

/// Cut the planned range out of a fetched chunk.
fn slice_chunk(path: &str, range: &ChunkRange, chunk: bytes::Bytes) -> DownloadResult<bytes::Bytes> {
    if (chunk.len() as u64) < range.end {
        return Err(DownloadError::ChunkFetchFailed {
            path: path.to_string(),
            index: range.index,
            source: StoreError::Corrupt {
                path: path.to_string(),
                reason: format!(
                    "short chunk: {} bytes, needed {}",
                    chunk.len(),
                    range.end
                ),
            },
        });
    }
    Ok(chunk.slice(range.start as usize..range.end as usize))
}
