//! Setu - client bridge between a robot's sensors and a remote SLAM service
//!
//! A [`TrajectoryBuilderStub`] looks like a local trajectory builder but
//! forwards every sensor reading to a map builder service, one upload stream
//! per sensor kind. Local SLAM results computed by the service come back on a
//! background listener thread.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     stub/                           │  ← Trajectory builder stub
//! │      (uploads, result listener, teardown)           │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │              convert / proto                        │  ← Wire schema
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                   transport/                        │  ← Streams (TCP, mock)
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Time, poses, sensor data
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod convert;
pub mod core;
pub mod error;
pub mod proto;
pub mod stub;
pub mod transport;

pub use config::{ConnectionConfig, SetuConfig};
pub use core::{
    FixedFramePoseData, ImuData, LocalSlamResult, NodeId, OdometryData, Quaternion, RangeData,
    Rigid3d, Time, TimedPointCloudData, TimedRangefinderPoint,
};
pub use error::{Error, Result, TeardownFailure, TeardownStage};
pub use stub::{
    ListenerShutdown, ListenerStats, ResultSink, SensorData, SensorKind, StubConfig,
    TeardownPolicy, TrajectoryBuilderStub,
};
pub use transport::{Connection, TcpConnection, TcpConnectionConfig};
