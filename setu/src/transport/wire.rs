//! Length-prefixed protobuf framing.
//!
//! Every stream is a sequence of frames:
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (variable)       │
//! │ Big-endian u32   │ Protobuf binary          │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! ## Stream layout
//!
//! **Upload (client → service):**
//! 1. `StreamOpen { method, request: [] }`
//! 2. one frame per encoded request
//! 3. write half-close (writes done)
//! 4. service replies with one `ServerFrame::Status`
//!
//! **Download (service → client):**
//! 1. client sends `StreamOpen { method, request }`
//! 2. service sends `ServerFrame::Message` frames
//! 3. service ends with `ServerFrame::Status` and closes
//!
//! EOF without a status frame means the service went away.

use crate::error::{Error, Result};
use crate::proto::{ServerFrame, StreamStatus, server_frame};
use prost::Message as ProstMessage;
use std::io::{ErrorKind, Read, Write};

/// Default upper bound for a single frame (8 MiB fits dense 3D sweeps).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Status codes carried in [`StreamStatus::code`].
pub mod status {
    pub const OK: i32 = 0;
    pub const CANCELLED: i32 = 1;
    pub const UNKNOWN: i32 = 2;
    pub const INVALID_ARGUMENT: i32 = 3;
    pub const NOT_FOUND: i32 = 5;
    pub const INTERNAL: i32 = 13;
    pub const UNAVAILABLE: i32 = 14;
}

/// Write one frame and flush.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| Error::FrameTooLarge {
        size: payload.len(),
        limit: u32::MAX as usize,
    })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame into `buffer`.
///
/// Returns `Ok(false)` on a clean EOF before the length prefix.
pub fn read_frame<R: Read>(reader: &mut R, buffer: &mut Vec<u8>, limit: usize) -> Result<bool> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(false),
        Err(e) => return Err(Error::Io(e)),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > limit {
        return Err(Error::FrameTooLarge { size: len, limit });
    }

    buffer.clear();
    buffer.resize(len, 0);
    reader.read_exact(buffer)?;
    Ok(true)
}

/// Encode and write a protobuf message as one frame.
pub fn write_message<W: Write, M: ProstMessage>(writer: &mut W, msg: &M) -> Result<()> {
    write_frame(writer, &msg.encode_to_vec())
}

/// Read one frame and decode it; `Ok(None)` on clean EOF.
pub fn read_message<R: Read, M: ProstMessage + Default>(
    reader: &mut R,
    limit: usize,
) -> Result<Option<M>> {
    let mut buffer = Vec::new();
    if !read_frame(reader, &mut buffer, limit)? {
        return Ok(None);
    }
    Ok(Some(M::decode(buffer.as_slice())?))
}

/// Server frame carrying one encoded message.
pub fn message_frame(payload: Vec<u8>) -> ServerFrame {
    ServerFrame {
        frame: Some(server_frame::Frame::Message(payload)),
    }
}

/// Server frame carrying a terminal status.
pub fn status_frame(code: i32, message: impl Into<String>) -> ServerFrame {
    ServerFrame {
        frame: Some(server_frame::Frame::Status(StreamStatus {
            code,
            message: message.into(),
        })),
    }
}

/// Turn a received status into a result.
pub fn status_to_result(status: &StreamStatus) -> Result<()> {
    match status.code {
        status::OK => Ok(()),
        status::CANCELLED => Err(Error::Cancelled),
        code => Err(Error::Status {
            code,
            message: status.message.clone(),
        }),
    }
}

/// Status used when the service closed the socket without a status frame.
pub(crate) fn closed_without_status() -> Error {
    Error::Status {
        code: status::UNAVAILABLE,
        message: "stream closed without status".into(),
    }
}
