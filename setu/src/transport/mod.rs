//! Transport layer: streaming calls to the map builder service.
//!
//! A [`Connection`] is shared by every stub built on it and hands out one
//! independent stream per call:
//!
//! - client-streaming uploads ([`UploadStream`]), one per sensor kind
//! - one server-streaming download ([`DownloadStream`]) per result listener
//!
//! Streams carry already-encoded protobuf messages; the stub owns the schema.

use crate::error::Result;

pub mod tcp;
pub mod wire;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use tcp::{TcpConnection, TcpConnectionConfig};

/// Handle to the remote service.
pub trait Connection: Send + Sync {
    /// Start a client-streaming call for `method`.
    fn open_upload(&self, method: &'static str) -> Result<Box<dyn UploadStream>>;

    /// Start a server-streaming call for `method` with an encoded request.
    fn open_download(&self, method: &'static str, request: Vec<u8>)
    -> Result<Box<dyn DownloadStream>>;
}

/// Writer half of a client-streaming call.
pub trait UploadStream: Send {
    /// Send one encoded message.
    fn write(&mut self, message: &[u8]) -> Result<()>;

    /// Signal that no more messages will be written.
    fn writes_done(&mut self) -> Result<()>;

    /// Block until the remote reports the final status.
    ///
    /// `Ok(())` only when the remote finished the call successfully.
    fn finish(&mut self) -> Result<()>;
}

/// Reader half of a server-streaming call.
pub trait DownloadStream: Send {
    /// Block until the next message arrives.
    ///
    /// Returns `None` once the stream is over, whether the remote closed it
    /// or it failed; [`finish`](Self::finish) tells which.
    fn read(&mut self) -> Option<Vec<u8>>;

    /// Final status of the call. Only meaningful after `read` returned `None`.
    fn finish(&mut self) -> Result<()>;

    /// Handle that can abort a blocked `read` from another thread.
    fn canceller(&self) -> Result<Box<dyn StreamCanceller>>;
}

/// Aborts an in-flight download stream.
pub trait StreamCanceller: Send + Sync {
    fn cancel(&self);
}
