//! Client-side trajectory builder stub.
//!
//! - `sensor_kind`: sensor kinds, remote method names, request encoding
//! - `upload`: lazily opened per-kind upload streams
//! - `listener`: background thread that drains local SLAM results
//! - `trajectory_builder`: the stub tying them together

pub mod listener;
pub mod sensor_kind;
pub mod trajectory_builder;
pub mod upload;

pub use listener::{
    ListenerShutdown, ListenerStats, LocalSlamResultCallback, ResultListener, ResultSink,
    decode_result,
};
pub use sensor_kind::{RECEIVE_LOCAL_SLAM_RESULTS_METHOD, SensorData, SensorKind};
pub use trajectory_builder::{StubConfig, TeardownPolicy, TrajectoryBuilderStub};
pub use upload::{UploadChannel, UploadChannels};
