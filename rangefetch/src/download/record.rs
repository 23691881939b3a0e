//! Download records and their queue view.
//!
//! A [`Download`] is written by exactly one executing task and read by any
//! number of queue observers. Progress and state are atomics; the error text
//! and timestamps sit behind a small mutex. Writers always publish
//! `received` and the error before the state that depends on them, so a
//! reader that loads the state first never sees a terminal state with stale
//! progress.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DownloadError;
use crate::request::{DownloadParams, ExecutionMode, ValidatedRequest};

/// Opaque identity of a download, unique within its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadId(u64);

impl DownloadId {
    /// Wrap a raw id.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a download.
///
/// ```text
/// Pending ──▶ Running ──┬──▶ Completed
///    │                  └──▶ Failed
///    └────────────────────▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    /// Registered, not yet dispatched.
    Pending,
    /// Fetching and writing chunks.
    Running,
    /// Every planned byte reached the sink.
    Completed,
    /// Stopped on an error; see the recorded error.
    Failed,
}

impl DownloadState {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed => 2,
            Self::Failed => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Pending,
            1 => Self::Running,
            2 => Self::Completed,
            _ => Self::Failed,
        }
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct Outcome {
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

/// A registered range download.
#[derive(Debug)]
pub struct Download {
    id: DownloadId,
    path: String,
    destination: String,
    offset: u64,
    length: u64,
    object_size: u64,
    mode: ExecutionMode,
    created_at: DateTime<Utc>,
    received: AtomicU64,
    state: AtomicU8,
    outcome: Mutex<Outcome>,
}

impl Download {
    /// Create a pending download for a validated request.
    pub fn new(id: DownloadId, request: &ValidatedRequest) -> Self {
        Self {
            id,
            path: request.path().to_string(),
            destination: request.target.to_string(),
            offset: request.offset,
            length: request.length,
            object_size: request.object.size,
            mode: request.mode,
            created_at: Utc::now(),
            received: AtomicU64::new(0),
            state: AtomicU8::new(DownloadState::Pending.as_u8()),
            outcome: Mutex::new(Outcome::default()),
        }
    }

    /// Create a download for a request whose object could not be resolved.
    ///
    /// Nothing is known about the object, so the requested length and the
    /// object size are both zero.
    pub fn unresolved(id: DownloadId, params: &DownloadParams) -> Self {
        let destination = match params.destination() {
            Some(path) => path.display().to_string(),
            None => "stream".to_string(),
        };
        let mode = if params.nonblocking {
            ExecutionMode::NonBlocking
        } else {
            ExecutionMode::Blocking
        };

        Self {
            id,
            path: params.path.clone(),
            destination,
            offset: params.offset.max(0) as u64,
            length: 0,
            object_size: 0,
            mode,
            created_at: Utc::now(),
            received: AtomicU64::new(0),
            state: AtomicU8::new(DownloadState::Pending.as_u8()),
            outcome: Mutex::new(Outcome::default()),
        }
    }

    pub fn id(&self) -> DownloadId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Requested number of bytes.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn state(&self) -> DownloadState {
        DownloadState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Bytes delivered to the sink so far.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Acquire)
    }

    /// The recorded error, if the download failed.
    pub fn error(&self) -> Option<String> {
        self.outcome.lock().error.clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// `Pending -> Running`. Returns false if the download already left
    /// `Pending`.
    pub(crate) fn start(&self) -> bool {
        let mut outcome = self.outcome.lock();
        let started = self.transition(DownloadState::Pending, DownloadState::Running);
        if started {
            outcome.started_at = Some(Utc::now());
        }
        started
    }

    /// Account for `bytes` written to the sink.
    pub(crate) fn add_received(&self, bytes: u64) {
        let previous = self.received.fetch_add(bytes, Ordering::AcqRel);
        debug_assert!(previous + bytes <= self.length);
    }

    /// `Running -> Completed`.
    pub(crate) fn complete(&self) -> bool {
        let mut outcome = self.outcome.lock();
        let completed = self.transition(DownloadState::Running, DownloadState::Completed);
        if completed {
            outcome.finished_at = Some(Utc::now());
        }
        completed
    }

    /// Any non-terminal state `-> Failed`, recording `error`.
    pub(crate) fn fail(&self, error: &DownloadError) -> bool {
        let mut outcome = self.outcome.lock();
        let current = self.state();
        if current.is_terminal() {
            return false;
        }
        outcome.error = Some(error.to_string());
        outcome.finished_at = Some(Utc::now());
        self.transition(current, DownloadState::Failed)
    }

    fn transition(&self, from: DownloadState, to: DownloadState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Point-in-time view of the download.
    pub fn info(&self) -> DownloadInfo {
        // State first: a terminal state implies final progress and error.
        let state = self.state();
        let received = self.received();
        let outcome = self.outcome.lock();

        DownloadInfo {
            id: self.id,
            path: self.path.clone(),
            destination: self.destination.clone(),
            offset: self.offset,
            total_size: self.length,
            object_size: self.object_size,
            received,
            error: if state == DownloadState::Failed {
                outcome.error.clone().unwrap_or_default()
            } else {
                String::new()
            },
            completed: state == DownloadState::Completed,
            state,
            mode: self.mode,
            created_at: self.created_at,
            started_at: outcome.started_at,
            finished_at: if state.is_terminal() {
                outcome.finished_at
            } else {
                None
            },
        }
    }
}

/// Fails a download that is dropped before reaching a terminal state.
///
/// Held by whoever drives a download, so a future dropped mid-flight (for
/// example by a timeout) still leaves the record `Failed` with
/// [`DownloadError::Cancelled`].
pub(crate) struct FailOnDrop<'a> {
    download: &'a Download,
}

impl<'a> FailOnDrop<'a> {
    pub(crate) fn new(download: &'a Download) -> Self {
        Self { download }
    }
}

impl Drop for FailOnDrop<'_> {
    fn drop(&mut self) {
        if self.download.fail(&DownloadError::Cancelled) {
            warn!(
                id = %self.download.id(),
                path = %self.download.path(),
                received = self.download.received(),
                "Download abandoned before finishing"
            );
        }
    }
}

/// Serializable snapshot of a [`Download`] as exposed by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadInfo {
    pub id: DownloadId,
    pub path: String,
    /// File path, or `stream`.
    pub destination: String,
    pub offset: u64,
    /// Requested length in bytes.
    pub total_size: u64,
    /// Size of the whole object.
    pub object_size: u64,
    pub received: u64,
    /// Error text; empty unless the download failed.
    pub error: String,
    pub completed: bool,
    pub state: DownloadState,
    pub mode: ExecutionMode,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DownloadInfo {
    /// Progress as a ratio (0.0 to 1.0).
    pub fn progress_ratio(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        self.received as f64 / self.total_size as f64
    }
}
