//! TCP transport: one socket per streaming call.
//!
//! Sockets are opened on demand, so a [`TcpConnection`] itself holds no
//! socket and can be shared freely between stubs and threads.

use super::wire::{self, DEFAULT_MAX_FRAME_BYTES, status_to_result};
use super::{Connection, DownloadStream, StreamCanceller, UploadStream};
use crate::error::{Error, Result};
use crate::proto::{ServerFrame, StreamOpen, server_frame};
use prost::Message as ProstMessage;
use std::io::{BufWriter, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// TCP connection settings.
#[derive(Debug, Clone)]
pub struct TcpConnectionConfig {
    /// Service address, "host:port"
    pub address: String,
    /// Timeout for establishing each stream socket
    pub connect_timeout: Duration,
    /// Largest frame accepted from the service
    pub max_frame_bytes: usize,
}

impl Default for TcpConnectionConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:50051".to_string(),
            connect_timeout: Duration::from_secs(5),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Connection to a map builder service over TCP.
pub struct TcpConnection {
    addr: SocketAddr,
    connect_timeout: Duration,
    max_frame_bytes: usize,
}

impl TcpConnection {
    /// Resolve the service address. No socket is opened until the first stream.
    pub fn new(config: &TcpConnectionConfig) -> Result<Self> {
        let addr = config
            .address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Config(format!("Address resolved to nothing: {}", config.address)))?;

        Ok(Self {
            addr,
            connect_timeout: config.connect_timeout,
            max_frame_bytes: config.max_frame_bytes,
        })
    }

    /// Resolved service address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    fn open_stream(&self, method: &'static str, request: Vec<u8>) -> Result<TcpStream> {
        let stream = TcpStream::connect_timeout(&self.addr, self.connect_timeout).map_err(|e| {
            Error::StreamOpen {
                method,
                reason: e.to_string(),
            }
        })?;
        stream.set_nodelay(true)?;

        let open = StreamOpen {
            method: method.to_string(),
            request,
        };
        wire::write_message(&mut &stream, &open)?;

        log::debug!("Opened {} stream to {}", method, self.addr);
        Ok(stream)
    }
}

impl Connection for TcpConnection {
    fn open_upload(&self, method: &'static str) -> Result<Box<dyn UploadStream>> {
        let stream = self.open_stream(method, Vec::new())?;
        Ok(Box::new(TcpUploadStream {
            method,
            writer: BufWriter::new(stream),
            max_frame_bytes: self.max_frame_bytes,
        }))
    }

    fn open_download(
        &self,
        method: &'static str,
        request: Vec<u8>,
    ) -> Result<Box<dyn DownloadStream>> {
        let stream = self.open_stream(method, request)?;
        Ok(Box::new(TcpDownloadStream {
            stream,
            buffer: Vec::new(),
            max_frame_bytes: self.max_frame_bytes,
            status: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct TcpUploadStream {
    method: &'static str,
    writer: BufWriter<TcpStream>,
    max_frame_bytes: usize,
}

impl UploadStream for TcpUploadStream {
    fn write(&mut self, message: &[u8]) -> Result<()> {
        // write_frame flushes, so each request leaves as a single segment
        wire::write_frame(&mut self.writer, message)
    }

    fn writes_done(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().shutdown(Shutdown::Write)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let mut reader = self.writer.get_ref();
        match wire::read_message::<_, ServerFrame>(&mut reader, self.max_frame_bytes)? {
            Some(ServerFrame {
                frame: Some(server_frame::Frame::Status(status)),
            }) => status_to_result(&status),
            Some(_) => Err(Error::Decode(format!(
                "{}: expected status frame on upload stream",
                self.method
            ))),
            None => Err(wire::closed_without_status()),
        }
    }
}

struct TcpDownloadStream {
    stream: TcpStream,
    buffer: Vec<u8>,
    max_frame_bytes: usize,
    /// Set once the stream is over
    status: Option<Result<()>>,
    cancelled: Arc<AtomicBool>,
}

impl TcpDownloadStream {
    fn end(&mut self, result: Result<()>) {
        let result = match result {
            Err(_) if self.cancelled.load(Ordering::Acquire) => Err(Error::Cancelled),
            other => other,
        };
        self.status = Some(result);
    }

    fn next_frame(&mut self) -> Result<Option<ServerFrame>> {
        let mut reader = &self.stream;
        if !wire::read_frame(&mut reader, &mut self.buffer, self.max_frame_bytes)? {
            return Ok(None);
        }
        Ok(Some(ServerFrame::decode(self.buffer.as_slice())?))
    }
}

impl DownloadStream for TcpDownloadStream {
    fn read(&mut self) -> Option<Vec<u8>> {
        if self.status.is_some() {
            return None;
        }

        match self.next_frame() {
            Ok(Some(ServerFrame {
                frame: Some(server_frame::Frame::Message(payload)),
            })) => Some(payload),
            Ok(Some(ServerFrame {
                frame: Some(server_frame::Frame::Status(status)),
            })) => {
                self.end(status_to_result(&status));
                None
            }
            Ok(Some(ServerFrame { frame: None })) => {
                self.end(Err(Error::Decode("empty server frame".into())));
                None
            }
            Ok(None) => {
                self.end(Err(wire::closed_without_status()));
                None
            }
            Err(e) => {
                self.end(Err(e));
                None
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        let _ = self.stream.shutdown(Shutdown::Both);
        self.status.take().unwrap_or_else(|| {
            Err(Error::Status {
                code: wire::status::UNKNOWN,
                message: "download stream finished before it was drained".into(),
            })
        })
    }

    fn canceller(&self) -> Result<Box<dyn StreamCanceller>> {
        Ok(Box::new(TcpCanceller {
            stream: self.stream.try_clone()?,
            cancelled: Arc::clone(&self.cancelled),
        }))
    }
}

struct TcpCanceller {
    stream: TcpStream,
    cancelled: Arc<AtomicBool>,
}

impl StreamCanceller for TcpCanceller {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        // Unblocks a pending read on the listener thread
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
