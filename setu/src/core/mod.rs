//! Core types: time, transforms and sensor payloads.

pub mod sensor;
pub mod time;
pub mod transform;

pub use sensor::{
    FixedFramePoseData, ImuData, LocalSlamResult, NodeId, OdometryData, RangeData,
    TimedPointCloudData, TimedRangefinderPoint,
};
pub use time::Time;
pub use transform::{Quaternion, Rigid3d};
