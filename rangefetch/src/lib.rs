//! Rangefetch - byte-range downloads over chunked object storage
//!
//! This library coordinates downloads of arbitrary byte ranges from objects
//! stored as fixed-size chunks. It validates requests, maps them onto the
//! chunk layout, streams the chunks in order into a file or a response
//! stream, and keeps every download observable through a shared queue.
//!
//! # Architecture
//!
//! ```text
//!  DownloadParams ──▶ DownloadManager ──▶ validate ──▶ plan ──▶ DownloadQueue
//!                          │                                       ▲
//!                          ▼                                       │ progress
//!                       execute ──fetch──▶ ChunkStore              │
//!                          └─────write──▶ Sink (file | stream) ────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rangefetch::{DownloadConfig, DownloadManager, DownloadParams, DownloadQueue, MemoryStore};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), rangefetch::DownloadError> {
//! let store = Arc::new(MemoryStore::new());
//! store.insert("docs/readme.txt", b"hello chunked world".to_vec(), 4);
//!
//! let manager = DownloadManager::new(
//!     store.clone(),
//!     store,
//!     Arc::new(DownloadQueue::new()),
//!     DownloadConfig::default(),
//! );
//! let params = DownloadParams::to_file("docs/readme.txt", 6, 7, "/tmp/part.txt");
//! manager.submit(params, None, CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod download;
pub mod error;
pub mod logging;
pub mod manager;
pub mod object;
pub mod planner;
pub mod queue;
pub mod request;
pub mod sink;
pub mod validation;

pub use config::{ConfigFile, DownloadConfig};
pub use download::{Download, DownloadId, DownloadInfo, DownloadState};
pub use error::{DownloadError, DownloadResult};
pub use manager::{DownloadManager, Submission};
pub use object::{Catalog, ChunkStore, DirectoryStore, MemoryStore, ObjectMetadata, StoreError};
pub use planner::{plan, ChunkPlan, ChunkRange};
pub use queue::DownloadQueue;
pub use request::{DownloadParams, ExecutionMode, Target, ValidatedRequest};
pub use sink::{FileSink, ResponseBody, Sink, StreamSink};
pub use validation::validate;
