//! File sink.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use super::{closed_error, Sink};
use crate::object::BoxFuture;

/// Writes a download sequentially into a local file.
///
/// The file is created or truncated on open. If the download fails the
/// partially written file is left in place.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Create (or truncate) `path` and wrap it in a write buffer of
    /// `buffer_size` bytes.
    pub async fn create(path: impl AsRef<Path>, buffer_size: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).await?;
        debug!(path = %path.display(), buffer_size, "Opened file sink");
        Ok(Self {
            path,
            writer: Some(BufWriter::with_capacity(buffer_size.max(1), file)),
        })
    }

    /// Path of the destination file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn write<'a>(&'a mut self, data: Bytes) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            let writer = self.writer.as_mut().ok_or_else(closed_error)?;
            writer.write_all(&data).await
        })
    }

    fn finish<'a>(&'a mut self) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            let writer = self.writer.as_mut().ok_or_else(closed_error)?;
            writer.flush().await?;
            writer.get_ref().sync_all().await
        })
    }

    fn close<'a>(&'a mut self) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            // Partial output stays on disk, so push out what was buffered.
            if let Some(mut writer) = self.writer.take() {
                if let Err(e) = writer.flush().await {
                    debug!(path = %self.path.display(), error = %e, "Flush on close failed");
                }
            }
        })
    }

    fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_in_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");

        let mut sink = FileSink::create(&path, 4).await.unwrap();
        sink.write(Bytes::from_static(b"hello ")).await.unwrap();
        sink.write(Bytes::from_static(b"world")).await.unwrap();
        sink.finish().await.unwrap();
        sink.close().await;

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello world");
        assert_eq!(sink.describe(), path.display().to_string());
    }

    #[tokio::test]
    async fn test_truncates_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");
        tokio::fs::write(&path, b"previous contents").await.unwrap();

        let mut sink = FileSink::create(&path, 1024).await.unwrap();
        sink.write(Bytes::from_static(b"new")).await.unwrap();
        sink.finish().await.unwrap();
        sink.close().await;

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_close_keeps_partial_output() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("partial.bin");

        let mut sink = FileSink::create(&path, 1024).await.unwrap();
        sink.write(Bytes::from_static(b"part")).await.unwrap();
        sink.close().await;

        assert!(sink.is_closed());
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"part");
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let temp = TempDir::new().unwrap();
        let mut sink = FileSink::create(temp.path().join("x"), 16).await.unwrap();
        sink.close().await;
        sink.close().await;

        let err = sink.write(Bytes::from_static(b"late")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_create_in_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let result = FileSink::create(temp.path().join("missing/dir/out.bin"), 16).await;
        assert!(result.is_err());
    }
}
