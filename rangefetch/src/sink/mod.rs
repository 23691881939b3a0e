//! Output sinks for range downloads.
//!
//! A sink is where the bytes of exactly one download go. It is chosen when
//! the request is validated and never changes afterwards.
//!
//! ```text
//!   execute() ──write(slice)──▶ Sink ──┬──▶ FileSink   ─▶ BufWriter<File>
//!                                      └──▶ StreamSink ─▶ mpsc ─▶ ResponseBody
//! ```
//!
//! `close()` is terminal: once a sink reports closed, every further write
//! fails without touching the underlying file or channel.

mod file;
mod stream;

pub use file::FileSink;
pub use stream::{ResponseBody, StreamSink};

use std::io;

use bytes::Bytes;

use crate::object::BoxFuture;

/// Destination of a download's bytes.
///
/// Writes arrive strictly in object-offset order. Implementations are owned
/// by a single executing task, so methods take `&mut self`.
pub trait Sink: Send {
    /// Write the next slice.
    fn write<'a>(&'a mut self, data: Bytes) -> BoxFuture<'a, io::Result<()>>;

    /// Flush everything written so far. Only called after the last slice
    /// of a successful download.
    fn finish<'a>(&'a mut self) -> BoxFuture<'a, io::Result<()>>;

    /// Release the underlying handle. Idempotent.
    fn close<'a>(&'a mut self) -> BoxFuture<'a, ()>;

    /// Returns true once the sink can no longer accept writes.
    fn is_closed(&self) -> bool;

    /// Human-readable destination, used in logs and the queue.
    fn describe(&self) -> String;
}

pub(crate) fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "sink is closed")
}
