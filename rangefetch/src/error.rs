//! Error types for range downloads.
//!
//! Errors fall into two classes:
//!
//! - **Validation** errors are detected before a download is created. They are
//!   returned synchronously and never appear in the download queue.
//! - **Execution** errors happen while chunks are being fetched and written.
//!   They are always recorded on the download, and additionally returned to
//!   the caller for blocking downloads.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::object::StoreError;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors produced while validating or executing a range download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The object path could not be resolved by the catalog.
    #[error("object not found: {path}")]
    ObjectNotFound { path: String },

    /// The catalog failed while resolving the object.
    #[error("failed to resolve {path}: {source}")]
    Catalog {
        path: String,
        #[source]
        source: StoreError,
    },

    /// Offset or length violate the object bounds.
    #[error("invalid range: {reason}")]
    InvalidRange { reason: String },

    /// Illegal combination of sink and execution mode.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// File destination is not absolute or contains a parent traversal.
    #[error("invalid destination {}: {reason}", path.display())]
    InvalidDestination { path: PathBuf, reason: String },

    /// The chunk store failed to deliver a chunk.
    #[error("failed to fetch chunk {index} of {path}: {source}")]
    ChunkFetchFailed {
        path: String,
        index: u64,
        #[source]
        source: StoreError,
    },

    /// Writing to the sink failed.
    #[error("failed to write to {destination}: {source}")]
    SinkWriteFailed {
        destination: String,
        #[source]
        source: io::Error,
    },

    /// The request-scoped cancellation signal fired.
    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    pub(crate) fn invalid_range(reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_destination(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidDestination {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors detected before a download is registered.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ObjectNotFound { .. }
                | Self::Catalog { .. }
                | Self::InvalidRange { .. }
                | Self::InvalidRequest { .. }
                | Self::InvalidDestination { .. }
        )
    }

    /// Returns true for errors recorded on a running download.
    pub fn is_execution(&self) -> bool {
        !self.is_validation()
    }

    /// Stable category name for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ObjectNotFound { .. } => "object_not_found",
            Self::Catalog { .. } => "catalog",
            Self::InvalidRange { .. } => "invalid_range",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidDestination { .. } => "invalid_destination",
            Self::ChunkFetchFailed { .. } => "chunk_fetch_failed",
            Self::SinkWriteFailed { .. } => "sink_write_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DownloadError::ObjectNotFound {
            path: "movies/a.mkv".to_string(),
        };
        assert_eq!(err.to_string(), "object not found: movies/a.mkv");

        let err = DownloadError::invalid_range("offset out of range");
        assert_eq!(err.to_string(), "invalid range: offset out of range");
    }

    #[test]
    fn test_invalid_destination_display() {
        let err = DownloadError::invalid_destination("out/file", "destination must be an absolute path");
        assert!(err.to_string().contains("out/file"));
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn test_error_classes() {
        assert!(DownloadError::invalid_request("x").is_validation());
        assert!(DownloadError::ObjectNotFound {
            path: "p".to_string()
        }
        .is_validation());
        assert!(DownloadError::Cancelled.is_execution());

        let err = DownloadError::SinkWriteFailed {
            destination: "stream".to_string(),
            source: io::Error::from(io::ErrorKind::BrokenPipe),
        };
        assert!(err.is_execution());
        assert_eq!(err.category(), "sink_write_failed");
    }

    #[test]
    fn test_chunk_fetch_failed_keeps_source() {
        use std::error::Error;

        let err = DownloadError::ChunkFetchFailed {
            path: "a".to_string(),
            index: 3,
            source: StoreError::ChunkMissing {
                path: "a".to_string(),
                index: 3,
            },
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("chunk 3"));
    }
}
