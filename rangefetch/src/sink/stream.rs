//! Stream sink backed by a bounded channel.
//!
//! The [`ResponseBody`] half is handed to whatever transport serves the
//! caller. Dropping it is how the transport reports that the caller went
//! away: the sink observes the closed channel and refuses further writes.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use super::{closed_error, Sink};
use crate::object::BoxFuture;

/// Sends slices to a caller's response stream.
#[derive(Debug)]
pub struct StreamSink {
    tx: Option<mpsc::Sender<Bytes>>,
}

impl StreamSink {
    /// Create a sink and the body its slices are delivered to.
    ///
    /// `capacity` is the number of slices buffered before writes wait for
    /// the body to be read.
    pub fn channel(capacity: usize) -> (StreamSink, ResponseBody) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (StreamSink { tx: Some(tx) }, ResponseBody { rx })
    }
}

impl Sink for StreamSink {
    fn write<'a>(&'a mut self, data: Bytes) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            if self.is_closed() {
                self.tx = None;
                return Err(closed_error());
            }
            let Some(tx) = self.tx.as_ref() else {
                return Err(closed_error());
            };
            if tx.send(data).await.is_err() {
                self.tx = None;
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "response stream closed by receiver",
                ));
            }
            Ok(())
        })
    }

    fn finish<'a>(&'a mut self) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            if self.is_closed() {
                return Err(closed_error());
            }
            Ok(())
        })
    }

    fn close<'a>(&'a mut self) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.tx = None;
        })
    }

    fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }

    fn describe(&self) -> String {
        "stream".to_string()
    }
}

/// Receiving half of a [`StreamSink`].
///
/// Yields slices in offset order and ends when the sink is closed.
#[derive(Debug)]
pub struct ResponseBody {
    rx: mpsc::Receiver<Bytes>,
}

impl ResponseBody {
    /// Read the body to the end.
    pub async fn collect_all(mut self) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next().await {
            out.extend_from_slice(&chunk);
        }
        out
    }
}

impl Stream for ResponseBody {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_body_receives_slices_in_order() {
        let (mut sink, body) = StreamSink::channel(4);
        let reader = tokio::spawn(body.collect_all());

        sink.write(Bytes::from_static(b"abc")).await.unwrap();
        sink.write(Bytes::from_static(b"def")).await.unwrap();
        sink.finish().await.unwrap();
        sink.close().await;

        assert_eq!(reader.await.unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn test_dropped_body_closes_sink() {
        let (mut sink, body) = StreamSink::channel(1);
        drop(body);

        assert!(sink.is_closed());
        let err = sink.write(Bytes::from_static(b"x")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        // Closed is terminal.
        assert!(sink.is_closed());
        assert!(sink.finish().await.is_err());
    }

    #[tokio::test]
    async fn test_body_dropped_while_write_waits() {
        let (mut sink, body) = StreamSink::channel(1);
        sink.write(Bytes::from_static(b"first")).await.unwrap();

        let pending = tokio::spawn(async move {
            let result = sink.write(Bytes::from_static(b"second")).await;
            (result, sink.is_closed())
        });
        tokio::task::yield_now().await;
        drop(body);

        let (result, closed) = pending.await.unwrap();
        assert!(result.is_err());
        assert!(closed);
    }

    #[tokio::test]
    async fn test_close_ends_body() {
        let (mut sink, mut body) = StreamSink::channel(2);
        sink.write(Bytes::from_static(b"only")).await.unwrap();
        sink.close().await;

        assert_eq!(body.next().await.unwrap(), Bytes::from_static(b"only"));
        assert!(body.next().await.is_none());
        assert!(sink.write(Bytes::from_static(b"late")).await.is_err());
    }
}
