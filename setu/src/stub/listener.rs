//! Result listener: drains the local SLAM result stream on its own thread.
//!
//! ```text
//! NotStarted ──start()──► Running ──read() = None──► Drained ──join()──► Joined
//!                           │  ▲
//!                           ▼  │
//!                     decode → deliver
//! ```
//!
//! Delivery happens on the listener thread. A slow callback holds back every
//! later result, so callbacks should hand work off rather than process it.

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use prost::Message as ProstMessage;
use serde::Deserialize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::sensor_kind::RECEIVE_LOCAL_SLAM_RESULTS_METHOD;
use crate::convert;
use crate::core::{LocalSlamResult, Time};
use crate::error::{Error, Result};
use crate::proto;
use crate::transport::{Connection, DownloadStream, StreamCanceller};

/// Callback invoked for every local SLAM result.
pub type LocalSlamResultCallback = Box<dyn FnMut(LocalSlamResult) + Send + 'static>;

/// Where decoded results go.
pub enum ResultSink {
    /// Invoke a callback on the listener thread
    Callback(LocalSlamResultCallback),
    /// Send into a channel owned by the caller
    Channel(Sender<LocalSlamResult>),
}

impl ResultSink {
    /// Wrap a closure.
    pub fn callback<F>(f: F) -> Self
    where
        F: FnMut(LocalSlamResult) + Send + 'static,
    {
        ResultSink::Callback(Box::new(f))
    }

    fn deliver(&mut self, result: LocalSlamResult) {
        match self {
            ResultSink::Callback(callback) => callback(result),
            ResultSink::Channel(tx) => {
                if tx.send(result).is_err() {
                    log::trace!("Result receiver dropped, discarding local SLAM result");
                }
            }
        }
    }
}

/// How teardown stops a running listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerShutdown {
    /// Wait for the service to close the result stream
    #[default]
    Drain,
    /// Cancel the result stream, then join
    Cancel,
}

/// Counters kept by the listener thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    /// Results handed to the sink
    pub delivered: u64,
    /// Messages dropped because they failed to decode
    pub decode_failures: u64,
}

/// Running result listener for one trajectory.
pub struct ResultListener {
    trajectory_id: i32,
    handle: JoinHandle<Result<()>>,
    canceller: Option<Box<dyn StreamCanceller>>,
    stats: Arc<Mutex<ListenerStats>>,
}

impl ResultListener {
    /// Open the result stream for `trajectory_id` and start draining it.
    pub fn start(connection: &dyn Connection, trajectory_id: i32, sink: ResultSink) -> Result<Self> {
        let request = proto::ReceiveLocalSlamResultsRequest { trajectory_id }.encode_to_vec();
        let stream = connection.open_download(RECEIVE_LOCAL_SLAM_RESULTS_METHOD, request)?;

        let canceller = match stream.canceller() {
            Ok(canceller) => Some(canceller),
            Err(e) => {
                log::warn!(
                    "Trajectory {}: result stream cannot be cancelled: {}",
                    trajectory_id,
                    e
                );
                None
            }
        };

        let stats = Arc::new(Mutex::new(ListenerStats::default()));
        let thread_stats = Arc::clone(&stats);
        let handle = thread::Builder::new()
            .name(format!("slam-results-{}", trajectory_id))
            .spawn(move || run_reader(trajectory_id, stream, sink, thread_stats))?;

        log::info!("Trajectory {}: result listener started", trajectory_id);

        Ok(Self {
            trajectory_id,
            handle,
            canceller,
            stats,
        })
    }

    pub fn stats(&self) -> ListenerStats {
        *self.stats.lock()
    }

    /// Stop according to `shutdown` and wait for the thread.
    ///
    /// Returns the final stream status. A cancellation requested here is not
    /// an error.
    pub fn join(self, shutdown: ListenerShutdown) -> Result<()> {
        if shutdown == ListenerShutdown::Cancel {
            match &self.canceller {
                Some(canceller) => canceller.cancel(),
                None => log::warn!(
                    "Trajectory {}: cannot cancel result stream, waiting for it to drain",
                    self.trajectory_id
                ),
            }
        }

        let outcome = match self.handle.join() {
            Ok(Err(Error::Cancelled)) if shutdown == ListenerShutdown::Cancel => Ok(()),
            Ok(status) => status,
            Err(_) => Err(Error::ListenerPanicked),
        };

        log::info!("Trajectory {}: result listener joined", self.trajectory_id);
        outcome
    }
}

/// Listener thread body.
fn run_reader(
    trajectory_id: i32,
    mut stream: Box<dyn DownloadStream>,
    mut sink: ResultSink,
    stats: Arc<Mutex<ListenerStats>>,
) -> Result<()> {
    while let Some(payload) = stream.read() {
        match decode_result(&payload) {
            Ok(result) => {
                sink.deliver(result);
                stats.lock().delivered += 1;
            }
            Err(e) => {
                log::warn!(
                    "Trajectory {}: dropping undecodable local SLAM result: {}",
                    trajectory_id,
                    e
                );
                stats.lock().decode_failures += 1;
            }
        }
    }

    let status = stream.finish();
    match &status {
        Ok(()) => log::debug!("Trajectory {}: result stream finished", trajectory_id),
        Err(Error::Cancelled) => {
            log::debug!("Trajectory {}: result stream cancelled", trajectory_id)
        }
        Err(e) => log::warn!(
            "Trajectory {}: result stream ended with error: {}",
            trajectory_id,
            e
        ),
    }
    status
}

/// Decode one `ReceiveLocalSlamResultsResponse`.
pub fn decode_result(payload: &[u8]) -> Result<LocalSlamResult> {
    let response = proto::ReceiveLocalSlamResultsResponse::decode(payload)?;
    Ok(LocalSlamResult {
        trajectory_id: response.trajectory_id,
        time: Time::from_universal(response.timestamp),
        local_pose: convert::rigid3d_from_proto(response.local_pose.as_ref()),
        range_data: convert::range_data_from_proto(response.range_data.as_ref()),
        node_id: response.node_id.as_ref().map(convert::node_id_from_proto),
    })
}
