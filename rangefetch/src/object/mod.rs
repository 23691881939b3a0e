//! Object catalog and chunk store interfaces.
//!
//! The download core never decodes chunks itself. It consumes two
//! collaborators:
//!
//! - [`Catalog`] resolves a logical path to its [`ObjectMetadata`]
//! - [`ChunkStore`] returns the decoded bytes of a single chunk
//!
//! Both traits are dyn-compatible (boxed futures) so callers can share any
//! backend as `Arc<dyn Catalog>` / `Arc<dyn ChunkStore>`.
//!
//! Two backends ship with the crate:
//!
//! - [`MemoryStore`] - objects held in memory, used by tests and embedders
//! - [`DirectoryStore`] - one directory per object with a manifest and one
//!   file per decoded chunk

mod directory;
mod memory;

pub use directory::{DirectoryStore, Manifest, MANIFEST_FILE};
pub use memory::MemoryStore;

use std::future::Future;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors reported by catalog and chunk store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object exists at the path.
    #[error("no object at {path}")]
    NotFound { path: String },

    /// The object exists but the chunk is not available.
    #[error("chunk {index} of {path} is unavailable")]
    ChunkMissing { path: String, index: u64 },

    /// Stored data failed an integrity check.
    #[error("corrupt data for {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// I/O error in the backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Metadata of a stored object.
///
/// Owned by the catalog; read-only to the download core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectMetadata {
    /// Logical path, unique within the store.
    pub path: String,
    /// Total size in bytes.
    pub size: u64,
    /// Nominal chunk size in bytes.
    pub chunk_size: u64,
    /// Number of chunks.
    pub chunk_count: u64,
}

impl ObjectMetadata {
    /// Create metadata for an object, deriving the chunk count.
    pub fn new(path: impl Into<String>, size: u64, chunk_size: u64) -> Self {
        let chunk_count = if chunk_size == 0 {
            0
        } else {
            size.div_ceil(chunk_size)
        };
        Self {
            path: path.into(),
            size,
            chunk_size,
            chunk_count,
        }
    }

    /// True length of a chunk; the last chunk may be shorter than `chunk_size`.
    ///
    /// Returns 0 for indices past the end of the object.
    pub fn chunk_len(&self, index: u64) -> u64 {
        if index >= self.chunk_count {
            return 0;
        }
        let start = index * self.chunk_size;
        self.chunk_size.min(self.size - start)
    }
}

/// Resolves logical paths to object metadata.
pub trait Catalog: Send + Sync {
    /// Look up an object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no object exists at `path`, or any
    /// other variant if the catalog itself failed.
    fn resolve<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<ObjectMetadata, StoreError>>;
}

/// Returns the decoded bytes of a chunk.
///
/// Implementations must be safe to call concurrently; a single download
/// issues several look-ahead fetches at once.
pub trait ChunkStore: Send + Sync {
    /// Fetch chunk `index` of the object at `path`.
    ///
    /// The returned buffer holds the whole decoded chunk, which is
    /// `ObjectMetadata::chunk_len(index)` bytes long.
    fn fetch_chunk<'a>(&'a self, path: &'a str, index: u64)
        -> BoxFuture<'a, Result<Bytes, StoreError>>;
}
