//! Lazily opened upload channels, one per sensor kind.

use super::sensor_kind::SensorKind;
use crate::error::{Error, Result, TeardownFailure, TeardownStage};
use crate::transport::{Connection, UploadStream};

/// Client-streaming upload for one sensor kind.
///
/// Exists only while open; closing consumes it, so a closed channel can never
/// be written to or reopened.
pub struct UploadChannel {
    kind: SensorKind,
    stream: Box<dyn UploadStream>,
    writes: u64,
    /// First write failure; later writes are skipped
    write_error: Option<Error>,
}

impl UploadChannel {
    /// Open the upload stream for `kind`.
    pub fn open(connection: &dyn Connection, kind: SensorKind) -> Result<Self> {
        let stream = connection.open_upload(kind.method())?;
        log::debug!("Opened {} upload channel", kind);
        Ok(Self {
            kind,
            stream,
            writes: 0,
            write_error: None,
        })
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Number of requests handed to the stream.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Send one encoded request.
    ///
    /// Failures are not returned: the first one is logged and kept for
    /// [`close`](Self::close), and the channel stops writing.
    pub fn write(&mut self, request: &[u8]) {
        if self.write_error.is_some() {
            return;
        }
        match self.stream.write(request) {
            Ok(()) => self.writes += 1,
            Err(e) => {
                log::warn!("{} upload write failed, dropping further data: {}", self.kind, e);
                self.write_error = Some(e);
            }
        }
    }

    /// Signal writes done and wait for the final status.
    pub fn close(mut self) -> Result<()> {
        self.stream.writes_done()?;
        self.stream.finish()?;
        match self.write_error {
            Some(e) => Err(e),
            None => {
                log::debug!("Closed {} upload channel after {} writes", self.kind, self.writes);
                Ok(())
            }
        }
    }
}

/// Fixed table of upload channels indexed by [`SensorKind`].
pub struct UploadChannels {
    slots: [Option<UploadChannel>; SensorKind::COUNT],
}

impl UploadChannels {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    pub fn is_open(&self, kind: SensorKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    pub fn get(&self, kind: SensorKind) -> Option<&UploadChannel> {
        self.slots[kind.index()].as_ref()
    }

    /// Channel for `kind`, opening it on first use.
    ///
    /// # Panics
    ///
    /// If the connection cannot provide the stream. A stub without its upload
    /// streams is a broken environment, not a condition callers can handle.
    pub fn ensure_open(
        &mut self,
        connection: &dyn Connection,
        kind: SensorKind,
    ) -> &mut UploadChannel {
        self.slots[kind.index()].get_or_insert_with(|| {
            match UploadChannel::open(connection, kind) {
                Ok(channel) => channel,
                Err(e) => {
                    log::error!("Failed to open {} upload channel: {}", kind, e);
                    panic!("Failed to open {} upload channel: {}", kind, e);
                }
            }
        })
    }

    /// Close every open channel in [`SensorKind::ALL`] order.
    pub fn close_all(&mut self) -> Vec<TeardownFailure> {
        let mut failures = Vec::new();
        for kind in SensorKind::ALL {
            let Some(channel) = self.slots[kind.index()].take() else {
                continue;
            };
            if let Err(error) = channel.close() {
                failures.push(TeardownFailure {
                    stage: TeardownStage::Upload(kind),
                    error,
                });
            }
        }
        failures
    }
}

impl Default for UploadChannels {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockConnection, MockEvent};

    #[test]
    fn test_open_is_lazy_and_reused() {
        let conn = MockConnection::new();
        let mut channels = UploadChannels::new();
        assert!(!channels.is_open(SensorKind::Imu));

        channels.ensure_open(&conn, SensorKind::Imu).write(b"a");
        channels.ensure_open(&conn, SensorKind::Imu).write(b"b");

        assert!(channels.is_open(SensorKind::Imu));
        assert_eq!(conn.upload_opens(SensorKind::Imu.method()), 1);
        assert_eq!(channels.get(SensorKind::Imu).map(|c| c.writes()), Some(2));
    }

    #[test]
    fn test_close_all_skips_unopened() {
        let conn = MockConnection::new();
        let mut channels = UploadChannels::new();
        channels.ensure_open(&conn, SensorKind::Odometry).write(b"x");

        assert!(channels.close_all().is_empty());
        assert!(!channels.is_open(SensorKind::Odometry));

        let events = conn.events();
        let method = SensorKind::Odometry.method();
        assert_eq!(
            &events[events.len() - 2..],
            &[
                MockEvent::WritesDone(method),
                MockEvent::UploadFinished(method)
            ]
        );
        assert_eq!(conn.upload_opens(SensorKind::Rangefinder.method()), 0);
    }

    #[test]
    fn test_finish_failure_reported_per_kind() {
        let conn = MockConnection::new();
        conn.fail_finish(SensorKind::Rangefinder.method());
        let mut channels = UploadChannels::new();
        channels.ensure_open(&conn, SensorKind::Rangefinder);
        channels.ensure_open(&conn, SensorKind::Imu);

        let failures = channels.close_all();
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].stage,
            TeardownStage::Upload(SensorKind::Rangefinder)
        );
    }

    #[test]
    fn test_write_failure_skips_later_writes_and_fails_close() {
        let conn = MockConnection::new();
        let method = SensorKind::Imu.method();
        conn.fail_write(method, 2);
        let mut channels = UploadChannels::new();

        for payload in [b"w1", b"w2", b"w3", b"w4"] {
            channels.ensure_open(&conn, SensorKind::Imu).write(payload);
        }

        let channel = channels.get(SensorKind::Imu).unwrap();
        assert_eq!(channel.kind(), SensorKind::Imu);
        assert_eq!(channel.writes(), 1);
        assert_eq!(conn.writes(method), vec![b"w1".to_vec()]);

        let failures = channels.close_all();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, TeardownStage::Upload(SensorKind::Imu));
        assert!(matches!(
            failures[0].error,
            Error::Status {
                code: crate::transport::wire::status::UNAVAILABLE,
                ..
            }
        ));

        // The stream is still closed properly after a failed write
        let events = conn.events();
        assert_eq!(
            &events[events.len() - 2..],
            &[MockEvent::WritesDone(method), MockEvent::UploadFinished(method)]
        );
    }

    #[test]
    #[should_panic(expected = "Failed to open imu upload channel")]
    fn test_refused_open_is_fatal() {
        let conn = MockConnection::new();
        conn.refuse_upload(SensorKind::Imu.method());
        let mut channels = UploadChannels::new();
        channels.ensure_open(&conn, SensorKind::Imu);
    }
}
