//! Protobuf schema of the map builder service.
//!
//! Messages are declared with `prost` derives so the crate builds without a
//! `protoc` toolchain. Field tags match `map_builder_service.proto` on the
//! service side and must never be renumbered.

// ============================================================================
// Geometry
// ============================================================================

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Vector3f {
    #[prost(float, tag = "1")]
    pub x: f32,
    #[prost(float, tag = "2")]
    pub y: f32,
    #[prost(float, tag = "3")]
    pub z: f32,
}

/// Point with per-point time offset in `t`.
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Vector4f {
    #[prost(float, tag = "1")]
    pub x: f32,
    #[prost(float, tag = "2")]
    pub y: f32,
    #[prost(float, tag = "3")]
    pub z: f32,
    #[prost(float, tag = "4")]
    pub t: f32,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Vector3d {
    #[prost(double, tag = "1")]
    pub x: f64,
    #[prost(double, tag = "2")]
    pub y: f64,
    #[prost(double, tag = "3")]
    pub z: f64,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Quaterniond {
    #[prost(double, tag = "1")]
    pub x: f64,
    #[prost(double, tag = "2")]
    pub y: f64,
    #[prost(double, tag = "3")]
    pub z: f64,
    #[prost(double, tag = "4")]
    pub w: f64,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Rigid3d {
    #[prost(message, optional, tag = "1")]
    pub translation: Option<Vector3d>,
    #[prost(message, optional, tag = "2")]
    pub rotation: Option<Quaterniond>,
}

// ============================================================================
// Sensor payloads
// ============================================================================

#[derive(Clone, PartialEq, prost::Message)]
pub struct TimedPointCloudData {
    #[prost(int64, tag = "1")]
    pub timestamp: i64,
    #[prost(message, optional, tag = "2")]
    pub origin: Option<Vector3f>,
    #[prost(message, repeated, tag = "3")]
    pub point_data: Vec<Vector4f>,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct ImuData {
    #[prost(int64, tag = "1")]
    pub timestamp: i64,
    #[prost(message, optional, tag = "2")]
    pub linear_acceleration: Option<Vector3d>,
    #[prost(message, optional, tag = "3")]
    pub angular_velocity: Option<Vector3d>,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct OdometryData {
    #[prost(int64, tag = "1")]
    pub timestamp: i64,
    #[prost(message, optional, tag = "2")]
    pub pose: Option<Rigid3d>,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct FixedFramePoseData {
    #[prost(int64, tag = "1")]
    pub timestamp: i64,
    #[prost(message, optional, tag = "2")]
    pub pose: Option<Rigid3d>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RangeData {
    #[prost(message, optional, tag = "1")]
    pub origin: Option<Vector3f>,
    #[prost(message, repeated, tag = "2")]
    pub returns: Vec<Vector3f>,
    #[prost(message, repeated, tag = "3")]
    pub misses: Vec<Vector3f>,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct NodeId {
    #[prost(int32, tag = "1")]
    pub trajectory_id: i32,
    #[prost(int32, tag = "2")]
    pub node_index: i32,
}

// ============================================================================
// Service requests / responses
// ============================================================================

#[derive(Clone, PartialEq, prost::Message)]
pub struct SensorMetadata {
    #[prost(int32, tag = "1")]
    pub trajectory_id: i32,
    #[prost(string, tag = "2")]
    pub sensor_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AddRangefinderDataRequest {
    #[prost(message, optional, tag = "1")]
    pub sensor_metadata: Option<SensorMetadata>,
    #[prost(message, optional, tag = "2")]
    pub timed_point_cloud_data: Option<TimedPointCloudData>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AddImuDataRequest {
    #[prost(message, optional, tag = "1")]
    pub sensor_metadata: Option<SensorMetadata>,
    #[prost(message, optional, tag = "2")]
    pub imu_data: Option<ImuData>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AddOdometryDataRequest {
    #[prost(message, optional, tag = "1")]
    pub sensor_metadata: Option<SensorMetadata>,
    #[prost(message, optional, tag = "2")]
    pub odometry_data: Option<OdometryData>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AddFixedFramePoseDataRequest {
    #[prost(message, optional, tag = "1")]
    pub sensor_metadata: Option<SensorMetadata>,
    #[prost(message, optional, tag = "2")]
    pub fixed_frame_pose_data: Option<FixedFramePoseData>,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct ReceiveLocalSlamResultsRequest {
    #[prost(int32, tag = "1")]
    pub trajectory_id: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReceiveLocalSlamResultsResponse {
    #[prost(int32, tag = "1")]
    pub trajectory_id: i32,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
    #[prost(message, optional, tag = "3")]
    pub local_pose: Option<Rigid3d>,
    #[prost(message, optional, tag = "4")]
    pub range_data: Option<RangeData>,
    #[prost(message, optional, tag = "5")]
    pub node_id: Option<NodeId>,
}

// ============================================================================
// Stream framing
// ============================================================================

/// First frame on every stream: which remote method it belongs to.
#[derive(Clone, PartialEq, prost::Message)]
pub struct StreamOpen {
    #[prost(string, tag = "1")]
    pub method: String,
    /// Encoded request for server-streaming methods, empty for uploads
    #[prost(bytes = "vec", tag = "2")]
    pub request: Vec<u8>,
}

/// Terminal status of a stream.
#[derive(Clone, PartialEq, prost::Message)]
pub struct StreamStatus {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

/// Frame sent by the service.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ServerFrame {
    #[prost(oneof = "server_frame::Frame", tags = "1, 2")]
    pub frame: Option<server_frame::Frame>,
}

pub mod server_frame {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Frame {
        /// One encoded response message
        #[prost(bytes, tag = "1")]
        Message(Vec<u8>),
        /// End of stream
        #[prost(message, tag = "2")]
        Status(super::StreamStatus),
    }
}
