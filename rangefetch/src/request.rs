//! Download request types.
//!
//! [`DownloadParams`] is the wire-agnostic shape a caller submits. It is only
//! turned into a [`ValidatedRequest`] by [`crate::validation::validate`].

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::object::ObjectMetadata;

/// Parameters of a range download as received from a caller.
///
/// Offsets and lengths are signed so out-of-range input from the wire can be
/// reported precisely instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadParams {
    /// Logical object path.
    pub path: String,
    /// First byte to download.
    pub offset: i64,
    /// Number of bytes to download.
    pub length: i64,
    /// Absolute destination file, if downloading to a file.
    #[serde(default)]
    pub destination: Option<PathBuf>,
    /// Stream the bytes back to the caller.
    #[serde(default)]
    pub stream: bool,
    /// Return immediately and run in the background.
    #[serde(default, rename = "async")]
    pub nonblocking: bool,
}

impl DownloadParams {
    /// Blocking download of a range into a file.
    pub fn to_file(
        path: impl Into<String>,
        offset: i64,
        length: i64,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            path: path.into(),
            offset,
            length,
            destination: Some(destination.into()),
            stream: false,
            nonblocking: false,
        }
    }

    /// Blocking download of a range streamed back to the caller.
    pub fn to_stream(path: impl Into<String>, offset: i64, length: i64) -> Self {
        Self {
            path: path.into(),
            offset,
            length,
            destination: None,
            stream: true,
            nonblocking: false,
        }
    }

    /// Run the download in the background.
    pub fn nonblocking(mut self) -> Self {
        self.nonblocking = true;
        self
    }

    /// The destination, treating an empty path as unset.
    pub(crate) fn destination(&self) -> Option<&PathBuf> {
        self.destination
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

/// How the caller waits for a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// The caller waits until the download is terminal.
    Blocking,
    /// The caller returns immediately; progress is observed via the queue.
    NonBlocking,
}

/// Where the bytes of a download go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A file at an absolute path.
    File(PathBuf),
    /// The caller's response stream.
    Stream,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::File(path) => write!(f, "{}", path.display()),
            Target::Stream => write!(f, "stream"),
        }
    }
}

/// A request that passed validation against its resolved object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    /// The resolved object.
    pub object: ObjectMetadata,
    /// First byte to download.
    pub offset: u64,
    /// Number of bytes to download.
    pub length: u64,
    /// Output target.
    pub target: Target,
    /// Execution mode.
    pub mode: ExecutionMode,
}

impl ValidatedRequest {
    /// Logical object path.
    pub fn path(&self) -> &str {
        &self.object.path
    }
}
