//! Sensor kinds and their upload requests.

use prost::Message as ProstMessage;
use std::fmt;

use crate::convert;
use crate::core::{FixedFramePoseData, ImuData, OdometryData, TimedPointCloudData};
use crate::proto;

/// Remote method for the local SLAM result stream.
pub const RECEIVE_LOCAL_SLAM_RESULTS_METHOD: &str =
    "/setu.MapBuilderService/ReceiveLocalSlamResults";

/// Kind of sensor data; each kind has its own upload stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Rangefinder,
    Imu,
    Odometry,
    FixedFramePose,
}

impl SensorKind {
    /// Number of kinds.
    pub const COUNT: usize = 4;

    /// All kinds, in teardown order.
    pub const ALL: [SensorKind; Self::COUNT] = [
        SensorKind::Rangefinder,
        SensorKind::Imu,
        SensorKind::Odometry,
        SensorKind::FixedFramePose,
    ];

    /// Slot in per-kind tables.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            SensorKind::Rangefinder => 0,
            SensorKind::Imu => 1,
            SensorKind::Odometry => 2,
            SensorKind::FixedFramePose => 3,
        }
    }

    /// Remote client-streaming method that accepts this kind.
    pub fn method(self) -> &'static str {
        match self {
            SensorKind::Rangefinder => "/setu.MapBuilderService/AddRangefinderData",
            SensorKind::Imu => "/setu.MapBuilderService/AddImuData",
            SensorKind::Odometry => "/setu.MapBuilderService/AddOdometryData",
            SensorKind::FixedFramePose => "/setu.MapBuilderService/AddFixedFramePoseData",
        }
    }

    /// Short name for logs.
    pub fn name(self) -> &'static str {
        match self {
            SensorKind::Rangefinder => "rangefinder",
            SensorKind::Imu => "imu",
            SensorKind::Odometry => "odometry",
            SensorKind::FixedFramePose => "fixed_frame_pose",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A sensor reading that can be uploaded.
///
/// Implementors pick their upload stream through [`KIND`](Self::KIND) and
/// wrap themselves, together with the metadata, into that stream's request.
pub trait SensorData {
    const KIND: SensorKind;

    /// Encoded `Add*DataRequest` for this reading.
    fn encode_request(&self, metadata: proto::SensorMetadata) -> Vec<u8>;
}

impl SensorData for TimedPointCloudData {
    const KIND: SensorKind = SensorKind::Rangefinder;

    fn encode_request(&self, metadata: proto::SensorMetadata) -> Vec<u8> {
        proto::AddRangefinderDataRequest {
            sensor_metadata: Some(metadata),
            timed_point_cloud_data: Some(convert::timed_point_cloud_to_proto(self)),
        }
        .encode_to_vec()
    }
}

impl SensorData for ImuData {
    const KIND: SensorKind = SensorKind::Imu;

    fn encode_request(&self, metadata: proto::SensorMetadata) -> Vec<u8> {
        proto::AddImuDataRequest {
            sensor_metadata: Some(metadata),
            imu_data: Some(convert::imu_to_proto(self)),
        }
        .encode_to_vec()
    }
}

impl SensorData for OdometryData {
    const KIND: SensorKind = SensorKind::Odometry;

    fn encode_request(&self, metadata: proto::SensorMetadata) -> Vec<u8> {
        proto::AddOdometryDataRequest {
            sensor_metadata: Some(metadata),
            odometry_data: Some(convert::odometry_to_proto(self)),
        }
        .encode_to_vec()
    }
}

impl SensorData for FixedFramePoseData {
    const KIND: SensorKind = SensorKind::FixedFramePose;

    fn encode_request(&self, metadata: proto::SensorMetadata) -> Vec<u8> {
        proto::AddFixedFramePoseDataRequest {
            sensor_metadata: Some(metadata),
            fixed_frame_pose_data: Some(convert::fixed_frame_pose_to_proto(self)),
        }
        .encode_to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_match_teardown_order() {
        for (i, kind) in SensorKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_methods_are_distinct() {
        let mut methods: Vec<_> = SensorKind::ALL.iter().map(|k| k.method()).collect();
        methods.push(RECEIVE_LOCAL_SLAM_RESULTS_METHOD);
        methods.sort_unstable();
        methods.dedup();
        assert_eq!(methods.len(), SensorKind::COUNT + 1);
    }
}
