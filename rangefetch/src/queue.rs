//! Shared registry of downloads.
//!
//! The queue is append-only for the lifetime of the process. A single mutex
//! guards the list of records; snapshots copy the `Arc`s out under the lock
//! and read each record's fields after releasing it, so readers never hold
//! up appenders while building views.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::download::{Download, DownloadId, DownloadInfo};

/// Insertion-ordered registry of all downloads.
#[derive(Debug)]
pub struct DownloadQueue {
    downloads: Mutex<Vec<Arc<Download>>>,
    next_id: AtomicU64,
}

impl Default for DownloadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadQueue {
    /// Create an empty queue. Ids start at 1.
    pub fn new() -> Self {
        Self {
            downloads: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate an id for a download about to be appended.
    pub fn next_id(&self) -> DownloadId {
        DownloadId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a download and return the shared record.
    pub fn append(&self, download: Download) -> Arc<Download> {
        let download = Arc::new(download);
        let len = {
            let mut downloads = self.downloads.lock();
            downloads.push(Arc::clone(&download));
            downloads.len()
        };
        debug!(id = %download.id(), path = %download.path(), queued = len, "Download registered");
        download
    }

    /// Views of every download in insertion order.
    pub fn snapshot(&self) -> Vec<DownloadInfo> {
        let downloads = self.downloads.lock().clone();
        downloads.iter().map(|d| d.info()).collect()
    }

    /// View of one download.
    pub fn get(&self, id: DownloadId) -> Option<DownloadInfo> {
        self.record(id).map(|d| d.info())
    }

    /// The shared record of one download.
    pub fn record(&self, id: DownloadId) -> Option<Arc<Download>> {
        self.downloads
            .lock()
            .iter()
            .find(|d| d.id() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.downloads.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::download::DownloadState;
    use crate::object::ObjectMetadata;
    use crate::request::{ExecutionMode, Target, ValidatedRequest};

    fn download(queue: &DownloadQueue, path: &str) -> Download {
        let request = ValidatedRequest {
            object: ObjectMetadata::new(path, 100, 10),
            offset: 0,
            length: 100,
            target: Target::File(PathBuf::from("/tmp/out")),
            mode: ExecutionMode::NonBlocking,
        };
        Download::new(queue.next_id(), &request)
    }

    #[test]
    fn test_append_preserves_order() {
        let queue = DownloadQueue::new();
        assert!(queue.is_empty());

        for path in ["a", "b", "c"] {
            queue.append(download(&queue, path));
        }

        let paths: Vec<_> = queue.snapshot().into_iter().map(|i| i.path).collect();
        assert_eq!(paths, ["a", "b", "c"]);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let queue = DownloadQueue::new();
        let a = queue.next_id();
        let b = queue.next_id();
        assert!(b > a);
        assert_eq!(a.get(), 1);
    }

    #[test]
    fn test_get_reflects_live_record() {
        let queue = DownloadQueue::new();
        let record = queue.append(download(&queue, "a"));

        assert_eq!(queue.get(record.id()).unwrap().state, DownloadState::Pending);

        record.start();
        record.add_received(40);
        let info = queue.get(record.id()).unwrap();
        assert_eq!(info.state, DownloadState::Running);
        assert_eq!(info.received, 40);

        assert!(queue.get(DownloadId::new(999)).is_none());
    }

    #[test]
    fn test_concurrent_appends_and_snapshots() {
        let queue = Arc::new(DownloadQueue::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        queue.append(download(&queue, &format!("{t}/{i}")));
                        let _ = queue.snapshot();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.len(), 400);
        let mut ids: Vec<_> = snapshot.iter().map(|i| i.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 400);
    }
}
