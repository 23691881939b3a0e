//! Download records and their execution.
//!
//! - [`Download`] is the observable record registered in the queue
//! - [`execute`] drives a record through its state machine against a
//!   [`ChunkStore`](crate::object::ChunkStore) and a [`Sink`](crate::sink::Sink)

mod executor;
mod record;

pub use executor::execute;
pub use record::{Download, DownloadId, DownloadInfo, DownloadState};
pub(crate) use record::FailOnDrop;
