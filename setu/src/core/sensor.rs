//! In-memory sensor readings and SLAM result payloads.

use serde::{Deserialize, Serialize};

use super::time::Time;
use super::transform::Rigid3d;

/// One rangefinder return relative to the sensor origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedRangefinderPoint {
    /// Hit position in meters
    pub position: [f32; 3],
    /// Offset in seconds relative to the cloud timestamp (≤ 0 for points
    /// captured before the cloud was stamped)
    pub time: f32,
}

/// A full rangefinder sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedPointCloudData {
    pub time: Time,
    /// Sensor origin in the tracking frame
    pub origin: [f32; 3],
    pub ranges: Vec<TimedRangefinderPoint>,
}

impl TimedPointCloudData {
    /// Build a planar cloud from polar lidar points `(angle_rad, distance_m, quality)`.
    ///
    /// Zero-distance returns are dropped. Points are spread evenly across
    /// `scan_duration_s`, ending at `time`.
    pub fn from_polar_scan(time: Time, points: &[(f32, f32, u8)], scan_duration_s: f32) -> Self {
        let valid: Vec<_> = points.iter().filter(|(_, d, _)| *d > 0.0).collect();
        let n = valid.len();
        let ranges = valid
            .into_iter()
            .enumerate()
            .map(|(i, (angle, distance, _))| {
                let (s, c) = angle.sin_cos();
                let fraction = if n > 1 {
                    i as f32 / (n - 1) as f32
                } else {
                    1.0
                };
                TimedRangefinderPoint {
                    position: [distance * c, distance * s, 0.0],
                    time: (fraction - 1.0) * scan_duration_s,
                }
            })
            .collect();

        Self {
            time,
            origin: [0.0; 3],
            ranges,
        }
    }
}

/// IMU reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuData {
    pub time: Time,
    /// m/s², including gravity
    pub linear_acceleration: [f64; 3],
    /// rad/s
    pub angular_velocity: [f64; 3],
}

/// Odometry pose estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OdometryData {
    pub time: Time,
    pub pose: Rigid3d,
}

/// Pose fix in a fixed frame (e.g. GPS). `None` marks a lost fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedFramePoseData {
    pub time: Time,
    pub pose: Option<Rigid3d>,
}

/// Range data after insertion, as reported by the mapping service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeData {
    pub origin: [f32; 3],
    pub returns: Vec<[f32; 3]>,
    pub misses: Vec<[f32; 3]>,
}

/// Identifies a trajectory node inserted by the mapping service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub trajectory_id: i32,
    pub node_index: i32,
}

/// A local SLAM result delivered to the result callback.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSlamResult {
    pub trajectory_id: i32,
    pub time: Time,
    pub local_pose: Rigid3d,
    pub range_data: RangeData,
    /// Present only when the result produced a trajectory node
    pub node_id: Option<NodeId>,
}
