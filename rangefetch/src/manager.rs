//! Download submission.
//!
//! The manager is the single entry point for range downloads:
//!
//! ```text
//!  submit(params) ──▶ Catalog::resolve ──▶ validate ──▶ plan
//!                                             │ error: returned, nothing registered
//!                                             │ (a missing object in non-blocking
//!                                             │  mode is registered as Failed)
//!                                             ▼
//!                                   DownloadQueue::append (Pending)
//!                                             │
//!                     ┌───────────────────────┴──────────────────────┐
//!                     ▼ blocking                                     ▼ non-blocking
//!          execute on the caller's task                 spawn execute under the
//!          with the caller's token;                     manager's shutdown token;
//!          error returned and recorded                  error recorded only
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashSet;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DownloadConfig;
use crate::download::{execute, Download, DownloadId, DownloadInfo, FailOnDrop};
use crate::error::{DownloadError, DownloadResult};
use crate::object::{Catalog, ChunkStore, StoreError};
use crate::planner::{plan, ChunkPlan};
use crate::queue::DownloadQueue;
use crate::request::{DownloadParams, ExecutionMode, Target, ValidatedRequest};
use crate::sink::{FileSink, ResponseBody, Sink, StreamSink};
use crate::validation::validate;

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// A blocking download finished; its final queue view.
    Completed(DownloadInfo),
    /// A non-blocking download was registered and is running in the
    /// background.
    Queued(DownloadId),
}

impl Submission {
    /// Id of the registered download.
    pub fn id(&self) -> DownloadId {
        match self {
            Self::Completed(info) => info.id,
            Self::Queued(id) => *id,
        }
    }
}

/// Output handed to a download before its sink is opened.
enum Output {
    File(DestinationLease),
    Stream(StreamSink),
}

/// Exclusive claim on a file destination, released on drop.
struct DestinationLease {
    claimed: Arc<DashSet<PathBuf>>,
    path: PathBuf,
}

impl DestinationLease {
    /// Claim `path`, or `None` if another download holds it.
    fn claim(claimed: &Arc<DashSet<PathBuf>>, path: &Path) -> Option<Self> {
        claimed.insert(path.to_path_buf()).then(|| Self {
            claimed: Arc::clone(claimed),
            path: path.to_path_buf(),
        })
    }
}

impl Drop for DestinationLease {
    fn drop(&mut self) {
        self.claimed.remove(&self.path);
    }
}

/// Counts a background task for as long as it is alive.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Accepts range downloads and runs them.
pub struct DownloadManager {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn ChunkStore>,
    queue: Arc<DownloadQueue>,
    config: DownloadConfig,
    /// Parent of every non-blocking download's token.
    shutdown: CancellationToken,
    background: Mutex<Vec<JoinHandle<()>>>,
    in_flight: Arc<AtomicUsize>,
    /// File destinations held by unfinished downloads.
    destinations: Arc<DashSet<PathBuf>>,
}

impl DownloadManager {
    /// Create a manager.
    ///
    /// # Arguments
    ///
    /// * `catalog` - Resolves object paths
    /// * `store` - Serves decoded chunks
    /// * `queue` - Registry shared with status readers
    /// * `config` - Look-ahead and sink buffer settings
    pub fn new(
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn ChunkStore>,
        queue: Arc<DownloadQueue>,
        config: DownloadConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            queue,
            config,
            shutdown: CancellationToken::new(),
            background: Mutex::new(Vec::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            destinations: Arc::new(DashSet::new()),
        }
    }

    /// The shared download queue.
    pub fn queue(&self) -> &Arc<DownloadQueue> {
        &self.queue
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// A stream sink sized by the configuration, and its response body.
    pub fn stream_channel(&self) -> (StreamSink, ResponseBody) {
        StreamSink::channel(self.config.stream_buffer_chunks)
    }

    /// Number of non-blocking downloads still running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Submit a download.
    ///
    /// A stream request must come with `stream_sink`, and only a stream
    /// request may. `cancel` applies to blocking downloads; non-blocking
    /// ones are cancelled only by [`shutdown`](Self::shutdown).
    ///
    /// A non-blocking request for an object the catalog does not know is
    /// registered as an already failed download of size zero and returned
    /// as [`Submission::Queued`], so pollers find it in the queue.
    ///
    /// # Errors
    ///
    /// Validation errors are returned before anything is registered. A file
    /// destination still held by an unfinished download is rejected the same
    /// way. For a blocking download, execution errors are returned as well as
    /// recorded in the queue.
    pub async fn submit(
        &self,
        params: DownloadParams,
        stream_sink: Option<StreamSink>,
        cancel: CancellationToken,
    ) -> DownloadResult<Submission> {
        let (request, plan, output) = match self.prepare(&params, stream_sink).await {
            Ok(prepared) => prepared,
            Err(e @ DownloadError::ObjectNotFound { .. }) if params.nonblocking => {
                return Ok(Submission::Queued(self.register_unresolved(&params, &e)));
            }
            Err(e) => {
                debug!(
                    path = %params.path,
                    category = e.category(),
                    error = %e,
                    "Download rejected"
                );
                return Err(e);
            }
        };

        let download = self
            .queue
            .append(Download::new(self.queue.next_id(), &request));
        info!(
            id = %download.id(),
            path = %request.path(),
            offset = request.offset,
            length = request.length,
            destination = %request.target,
            mode = ?request.mode,
            "Download submitted"
        );

        match request.mode {
            ExecutionMode::Blocking => {
                run(&download, &plan, self.store.as_ref(), output, &cancel, &self.config).await?;
                Ok(Submission::Completed(download.info()))
            }
            ExecutionMode::NonBlocking => {
                let id = download.id();
                self.spawn(download, plan, output);
                Ok(Submission::Queued(id))
            }
        }
    }

    fn register_unresolved(&self, params: &DownloadParams, error: &DownloadError) -> DownloadId {
        let download = self
            .queue
            .append(Download::unresolved(self.queue.next_id(), params));
        download.fail(error);
        info!(
            id = %download.id(),
            path = %params.path,
            error = %error,
            "Download registered for unresolved object"
        );
        download.id()
    }

    /// Cancel every non-blocking download and wait for them to stop.
    pub async fn shutdown(&self) {
        info!(in_flight = self.in_flight(), "Shutting down download manager");
        self.shutdown.cancel();

        let handles: Vec<_> = std::mem::take(&mut *self.background.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background download task panicked");
            }
        }
    }

    async fn prepare(
        &self,
        params: &DownloadParams,
        stream_sink: Option<StreamSink>,
    ) -> DownloadResult<(ValidatedRequest, ChunkPlan, Output)> {
        let object = match self.catalog.resolve(&params.path).await {
            Ok(object) => Some(object),
            Err(StoreError::NotFound { .. }) => None,
            Err(source) => {
                return Err(DownloadError::Catalog {
                    path: params.path.clone(),
                    source,
                })
            }
        };

        let request = validate(params, object.as_ref())?;

        let plan = plan(
            request.offset,
            request.length,
            request.object.chunk_size,
            request.object.chunk_count,
        );
        if !plan.is_complete() {
            return Err(DownloadError::invalid_range(
                "object layout does not cover the requested range",
            ));
        }

        let output = match (&request.target, stream_sink) {
            (Target::File(path), None) => match DestinationLease::claim(&self.destinations, path) {
                Some(lease) => Output::File(lease),
                None => {
                    return Err(DownloadError::invalid_destination(
                        path,
                        "destination is in use by another download",
                    ))
                }
            },
            (Target::Stream, Some(sink)) => Output::Stream(sink),
            (Target::Stream, None) => {
                return Err(DownloadError::invalid_request(
                    "stream download requires a response stream",
                ))
            }
            (Target::File(_), Some(_)) => {
                return Err(DownloadError::invalid_request(
                    "response stream given for a file download",
                ))
            }
        };

        Ok((request, plan, output))
    }

    fn spawn(&self, download: Arc<Download>, plan: ChunkPlan, output: Output) {
        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        let cancel = self.shutdown.child_token();
        let in_flight = InFlight::enter(&self.in_flight);

        let handle = tokio::spawn(async move {
            let _in_flight = in_flight;
            // Errors are recorded on the download.
            let _ = run(&download, &plan, store.as_ref(), output, &cancel, &config).await;
        });

        let mut background = self.background.lock();
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }
}

/// Open the sink and execute the plan.
async fn run(
    download: &Download,
    plan: &ChunkPlan,
    store: &dyn ChunkStore,
    output: Output,
    cancel: &CancellationToken,
    config: &DownloadConfig,
) -> DownloadResult<()> {
    let _abandoned = FailOnDrop::new(download);
    // The lease is held until the sink is closed.
    let (mut sink, _lease): (Box<dyn Sink>, Option<DestinationLease>) = match output {
        Output::Stream(sink) => (Box::new(sink), None),
        Output::File(lease) => match FileSink::create(&lease.path, config.file_buffer_size).await {
            Ok(sink) => (Box::new(sink), Some(lease)),
            Err(source) => {
                let err = DownloadError::SinkWriteFailed {
                    destination: lease.path.display().to_string(),
                    source,
                };
                download.fail(&err);
                warn!(id = %download.id(), error = %err, "Could not open destination");
                return Err(err);
            }
        },
    };

    execute(
        download,
        plan,
        store,
        sink.as_mut(),
        cancel,
        config.chunk_lookahead,
    )
    .await
}
