//! Directory-backed object store.
//!
//! Each object lives in its own directory below the store root:
//!
//! ```text
//! <root>/<logical path>/
//!     manifest.json        {"size": .., "chunk_size": .., "chunks": [sha256, ..]}
//!     chunk-000000.bin     decoded bytes of chunk 0
//!     chunk-000001.bin
//!     ...
//! ```
//!
//! Every fetched chunk is checked against the SHA-256 recorded in the
//! manifest. The manifest is re-read on each fetch, so an object removed
//! while a download is running surfaces as a fetch failure.

use std::io;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use super::{BoxFuture, Catalog, ChunkStore, ObjectMetadata, StoreError};

/// Name of the per-object manifest file.
pub const MANIFEST_FILE: &str = "manifest.json";

/// On-disk description of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Total object size in bytes.
    pub size: u64,
    /// Nominal chunk size in bytes.
    pub chunk_size: u64,
    /// Lowercase hex SHA-256 of each decoded chunk, in index order.
    pub chunks: Vec<String>,
}

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name of chunk `index`.
    pub fn chunk_file_name(index: u64) -> String {
        format!("chunk-{:06}.bin", index)
    }

    /// Split a local file into chunks and store it under `path`.
    ///
    /// An existing object at the same path is overwritten. The manifest is
    /// written last, so a partially imported object never resolves.
    pub async fn import(
        &self,
        path: &str,
        source: &Path,
        chunk_size: u64,
    ) -> Result<ObjectMetadata, StoreError> {
        if chunk_size == 0 {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "chunk size must be positive",
            )));
        }

        let dir = self.object_dir(path)?;
        tokio::fs::create_dir_all(&dir).await?;

        let mut file = tokio::fs::File::open(source).await?;
        let mut chunks = Vec::new();
        let mut size = 0u64;

        loop {
            let mut buffer = Vec::with_capacity(chunk_size as usize);
            let read = (&mut file).take(chunk_size).read_to_end(&mut buffer).await?;
            if read == 0 {
                break;
            }

            let index = chunks.len() as u64;
            chunks.push(format!("{:x}", Sha256::digest(&buffer)));
            tokio::fs::write(dir.join(Self::chunk_file_name(index)), &buffer).await?;
            size += read as u64;
        }

        let manifest = Manifest {
            size,
            chunk_size,
            chunks,
        };
        let encoded = serde_json::to_vec_pretty(&manifest).map_err(|e| StoreError::Corrupt {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let staging = dir.join(format!("{}.tmp", MANIFEST_FILE));
        tokio::fs::write(&staging, encoded).await?;
        tokio::fs::rename(&staging, dir.join(MANIFEST_FILE)).await?;

        info!(
            path = %path,
            size,
            chunk_size,
            chunks = manifest.chunks.len(),
            "Imported object"
        );

        Ok(ObjectMetadata::new(path, size, chunk_size))
    }

    /// Directory holding an object, rejecting paths that escape the root.
    fn object_dir(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path);
        let valid = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StoreError::NotFound {
                path: path.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    async fn read_manifest(&self, path: &str) -> Result<Manifest, StoreError> {
        let file = self.object_dir(path)?.join(MANIFEST_FILE);
        let raw = match tokio::fs::read(&file).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    path: path.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let manifest: Manifest =
            serde_json::from_slice(&raw).map_err(|e| StoreError::Corrupt {
                path: path.to_string(),
                reason: format!("unreadable manifest: {}", e),
            })?;

        let expected = ObjectMetadata::new(path, manifest.size, manifest.chunk_size).chunk_count;
        if manifest.chunk_size == 0 || manifest.chunks.len() as u64 != expected {
            return Err(StoreError::Corrupt {
                path: path.to_string(),
                reason: format!(
                    "manifest lists {} chunks, expected {}",
                    manifest.chunks.len(),
                    expected
                ),
            });
        }

        Ok(manifest)
    }

    async fn read_chunk(&self, path: &str, index: u64) -> Result<Bytes, StoreError> {
        let manifest = self.read_manifest(path).await?;
        let metadata = ObjectMetadata::new(path, manifest.size, manifest.chunk_size);

        let checksum = manifest
            .chunks
            .get(index as usize)
            .ok_or_else(|| StoreError::ChunkMissing {
                path: path.to_string(),
                index,
            })?;

        let file = self.object_dir(path)?.join(Self::chunk_file_name(index));
        let data = match tokio::fs::read(&file).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::ChunkMissing {
                    path: path.to_string(),
                    index,
                })
            }
            Err(e) => return Err(e.into()),
        };

        if data.len() as u64 != metadata.chunk_len(index) {
            return Err(StoreError::Corrupt {
                path: path.to_string(),
                reason: format!(
                    "chunk {} is {} bytes, expected {}",
                    index,
                    data.len(),
                    metadata.chunk_len(index)
                ),
            });
        }

        let actual = format!("{:x}", Sha256::digest(&data));
        if &actual != checksum {
            return Err(StoreError::Corrupt {
                path: path.to_string(),
                reason: format!("checksum mismatch for chunk {}", index),
            });
        }

        debug!(path = %path, index, bytes = data.len(), "Read chunk from disk");
        Ok(Bytes::from(data))
    }
}

impl Catalog for DirectoryStore {
    fn resolve<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<ObjectMetadata, StoreError>> {
        Box::pin(async move {
            let manifest = self.read_manifest(path).await?;
            Ok(ObjectMetadata::new(path, manifest.size, manifest.chunk_size))
        })
    }
}

impl ChunkStore for DirectoryStore {
    fn fetch_chunk<'a>(
        &'a self,
        path: &'a str,
        index: u64,
    ) -> BoxFuture<'a, Result<Bytes, StoreError>> {
        Box::pin(self.read_chunk(path, index))
    }
}
