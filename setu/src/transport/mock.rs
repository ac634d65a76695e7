//! In-memory transport for testing stubs without a running service.
//!
//! Every stream records into a shared event log, so a test can assert which
//! streams were opened, what was written and in which order they closed.
//! Download streams replay scripted messages and then end with a configured
//! status.

use super::{Connection, DownloadStream, StreamCanceller, UploadStream};
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Something that happened on the mock connection.
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    UploadOpened(&'static str),
    Write { method: &'static str, payload: Vec<u8> },
    WritesDone(&'static str),
    UploadFinished(&'static str),
    DownloadOpened { method: &'static str, request: Vec<u8> },
    DownloadFinished(&'static str),
}

enum DownloadItem {
    Message(Vec<u8>),
    End(std::result::Result<(), (i32, String)>),
}

/// Mock connection for unit tests.
#[derive(Clone)]
pub struct MockConnection {
    inner: Arc<MockInner>,
}

struct MockInner {
    events: Mutex<Vec<MockEvent>>,
    refuse_uploads: Mutex<HashSet<&'static str>>,
    failing_finishes: Mutex<HashSet<&'static str>>,
    /// Method -> 1-based write number that fails
    failing_writes: Mutex<HashMap<&'static str, u64>>,
    download_tx: Sender<DownloadItem>,
    download_rx: Receiver<DownloadItem>,
}

impl MockConnection {
    pub fn new() -> Self {
        let (download_tx, download_rx) = unbounded();
        MockConnection {
            inner: Arc::new(MockInner {
                events: Mutex::new(Vec::new()),
                refuse_uploads: Mutex::new(HashSet::new()),
                failing_finishes: Mutex::new(HashSet::new()),
                failing_writes: Mutex::new(HashMap::new()),
                download_tx,
                download_rx,
            }),
        }
    }

    /// Queue one encoded message for the download stream.
    pub fn push_download(&self, payload: Vec<u8>) {
        self.inner
            .download_tx
            .send(DownloadItem::Message(payload))
            .ok();
    }

    /// End the download stream successfully.
    pub fn close_download(&self) {
        self.inner.download_tx.send(DownloadItem::End(Ok(()))).ok();
    }

    /// End the download stream with a non-OK status.
    pub fn fail_download(&self, code: i32, message: &str) {
        self.inner
            .download_tx
            .send(DownloadItem::End(Err((code, message.to_string()))))
            .ok();
    }

    /// Make `open_upload` fail for `method`.
    pub fn refuse_upload(&self, method: &'static str) {
        self.inner.refuse_uploads.lock().insert(method);
    }

    /// Make `finish` report an error for uploads of `method`.
    pub fn fail_finish(&self, method: &'static str) {
        self.inner.failing_finishes.lock().insert(method);
    }

    /// Make the `nth` write (1-based) on each upload of `method` fail.
    ///
    /// The failed payload is not recorded.
    pub fn fail_write(&self, method: &'static str, nth: u64) {
        self.inner.failing_writes.lock().insert(method, nth);
    }

    /// Snapshot of the event log.
    pub fn events(&self) -> Vec<MockEvent> {
        self.inner.events.lock().clone()
    }

    /// Number of times an upload stream for `method` was opened.
    pub fn upload_opens(&self, method: &str) -> usize {
        self.inner
            .events
            .lock()
            .iter()
            .filter(|e| matches!(e, MockEvent::UploadOpened(m) if *m == method))
            .count()
    }

    /// Payloads written to uploads of `method`, in order.
    pub fn writes(&self, method: &str) -> Vec<Vec<u8>> {
        self.inner
            .events
            .lock()
            .iter()
            .filter_map(|e| match e {
                MockEvent::Write { method: m, payload } if *m == method => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: MockEvent) {
        self.inner.events.lock().push(event);
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for MockConnection {
    fn open_upload(&self, method: &'static str) -> Result<Box<dyn UploadStream>> {
        if self.inner.refuse_uploads.lock().contains(method) {
            return Err(Error::StreamOpen {
                method,
                reason: "refused by mock".into(),
            });
        }
        self.record(MockEvent::UploadOpened(method));
        Ok(Box::new(MockUpload {
            method,
            conn: self.clone(),
            attempts: 0,
        }))
    }

    fn open_download(
        &self,
        method: &'static str,
        request: Vec<u8>,
    ) -> Result<Box<dyn DownloadStream>> {
        self.record(MockEvent::DownloadOpened { method, request });
        Ok(Box::new(MockDownload {
            method,
            conn: self.clone(),
            status: None,
        }))
    }
}

struct MockUpload {
    method: &'static str,
    conn: MockConnection,
    attempts: u64,
}

impl UploadStream for MockUpload {
    fn write(&mut self, message: &[u8]) -> Result<()> {
        self.attempts += 1;
        if self.conn.inner.failing_writes.lock().get(self.method) == Some(&self.attempts) {
            return Err(Error::Status {
                code: super::wire::status::UNAVAILABLE,
                message: "mock write failure".into(),
            });
        }
        self.conn.record(MockEvent::Write {
            method: self.method,
            payload: message.to_vec(),
        });
        Ok(())
    }

    fn writes_done(&mut self) -> Result<()> {
        self.conn.record(MockEvent::WritesDone(self.method));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.conn.record(MockEvent::UploadFinished(self.method));
        if self.conn.inner.failing_finishes.lock().contains(self.method) {
            return Err(Error::Status {
                code: super::wire::status::INTERNAL,
                message: "mock finish failure".into(),
            });
        }
        Ok(())
    }
}

struct MockDownload {
    method: &'static str,
    conn: MockConnection,
    status: Option<Result<()>>,
}

impl DownloadStream for MockDownload {
    fn read(&mut self) -> Option<Vec<u8>> {
        if self.status.is_some() {
            return None;
        }
        match self.conn.inner.download_rx.recv() {
            Ok(DownloadItem::Message(payload)) => Some(payload),
            Ok(DownloadItem::End(Ok(()))) => {
                self.status = Some(Ok(()));
                None
            }
            Ok(DownloadItem::End(Err((code, message)))) => {
                self.status = Some(if code == super::wire::status::CANCELLED {
                    Err(Error::Cancelled)
                } else {
                    Err(Error::Status { code, message })
                });
                None
            }
            // Unreachable while the connection holds a sender
            Err(_) => {
                self.status = Some(Err(Error::Cancelled));
                None
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.conn.record(MockEvent::DownloadFinished(self.method));
        self.status.take().unwrap_or(Ok(()))
    }

    fn canceller(&self) -> Result<Box<dyn StreamCanceller>> {
        Ok(Box::new(MockCanceller {
            tx: self.conn.inner.download_tx.clone(),
        }))
    }
}

struct MockCanceller {
    tx: Sender<DownloadItem>,
}

impl StreamCanceller for MockCanceller {
    fn cancel(&self) {
        self.tx
            .send(DownloadItem::End(Err((
                super::wire::status::CANCELLED,
                "cancelled".into(),
            ))))
            .ok();
    }
}
