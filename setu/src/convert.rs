//! Mapping between in-memory types and their protobuf form.
//!
//! Pure functions; missing optional submessages decode to identity / zero
//! values, matching proto3 defaults.

use crate::core::{
    FixedFramePoseData, ImuData, NodeId, OdometryData, Quaternion, RangeData, Rigid3d, Time,
    TimedPointCloudData, TimedRangefinderPoint,
};
use crate::proto;

// ============================================================================
// Geometry
// ============================================================================

pub fn vector3f_to_proto(v: [f32; 3]) -> proto::Vector3f {
    proto::Vector3f {
        x: v[0],
        y: v[1],
        z: v[2],
    }
}

pub fn vector3f_from_proto(v: Option<&proto::Vector3f>) -> [f32; 3] {
    v.map(|v| [v.x, v.y, v.z]).unwrap_or_default()
}

pub fn vector3d_to_proto(v: [f64; 3]) -> proto::Vector3d {
    proto::Vector3d {
        x: v[0],
        y: v[1],
        z: v[2],
    }
}

pub fn vector3d_from_proto(v: Option<&proto::Vector3d>) -> [f64; 3] {
    v.map(|v| [v.x, v.y, v.z]).unwrap_or_default()
}

pub fn rigid3d_to_proto(pose: &Rigid3d) -> proto::Rigid3d {
    let q = &pose.rotation;
    proto::Rigid3d {
        translation: Some(vector3d_to_proto(pose.translation)),
        rotation: Some(proto::Quaterniond {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        }),
    }
}

pub fn rigid3d_from_proto(pose: Option<&proto::Rigid3d>) -> Rigid3d {
    let Some(pose) = pose else {
        return Rigid3d::identity();
    };
    let rotation = pose
        .rotation
        .map(|q| Quaternion {
            w: q.w,
            x: q.x,
            y: q.y,
            z: q.z,
        })
        .unwrap_or_default();
    Rigid3d::new(vector3d_from_proto(pose.translation.as_ref()), rotation)
}

// ============================================================================
// Sensor payloads
// ============================================================================

pub fn timed_point_cloud_to_proto(data: &TimedPointCloudData) -> proto::TimedPointCloudData {
    proto::TimedPointCloudData {
        timestamp: data.time.to_universal(),
        origin: Some(vector3f_to_proto(data.origin)),
        point_data: data
            .ranges
            .iter()
            .map(|p| proto::Vector4f {
                x: p.position[0],
                y: p.position[1],
                z: p.position[2],
                t: p.time,
            })
            .collect(),
    }
}

pub fn timed_point_cloud_from_proto(data: &proto::TimedPointCloudData) -> TimedPointCloudData {
    TimedPointCloudData {
        time: Time::from_universal(data.timestamp),
        origin: vector3f_from_proto(data.origin.as_ref()),
        ranges: data
            .point_data
            .iter()
            .map(|p| TimedRangefinderPoint {
                position: [p.x, p.y, p.z],
                time: p.t,
            })
            .collect(),
    }
}

pub fn imu_to_proto(data: &ImuData) -> proto::ImuData {
    proto::ImuData {
        timestamp: data.time.to_universal(),
        linear_acceleration: Some(vector3d_to_proto(data.linear_acceleration)),
        angular_velocity: Some(vector3d_to_proto(data.angular_velocity)),
    }
}

pub fn imu_from_proto(data: &proto::ImuData) -> ImuData {
    ImuData {
        time: Time::from_universal(data.timestamp),
        linear_acceleration: vector3d_from_proto(data.linear_acceleration.as_ref()),
        angular_velocity: vector3d_from_proto(data.angular_velocity.as_ref()),
    }
}

pub fn odometry_to_proto(data: &OdometryData) -> proto::OdometryData {
    proto::OdometryData {
        timestamp: data.time.to_universal(),
        pose: Some(rigid3d_to_proto(&data.pose)),
    }
}

pub fn odometry_from_proto(data: &proto::OdometryData) -> OdometryData {
    OdometryData {
        time: Time::from_universal(data.timestamp),
        pose: rigid3d_from_proto(data.pose.as_ref()),
    }
}

pub fn fixed_frame_pose_to_proto(data: &FixedFramePoseData) -> proto::FixedFramePoseData {
    proto::FixedFramePoseData {
        timestamp: data.time.to_universal(),
        pose: data.pose.as_ref().map(rigid3d_to_proto),
    }
}

pub fn fixed_frame_pose_from_proto(data: &proto::FixedFramePoseData) -> FixedFramePoseData {
    FixedFramePoseData {
        time: Time::from_universal(data.timestamp),
        pose: data.pose.as_ref().map(|p| rigid3d_from_proto(Some(p))),
    }
}

pub fn range_data_to_proto(data: &RangeData) -> proto::RangeData {
    proto::RangeData {
        origin: Some(vector3f_to_proto(data.origin)),
        returns: data.returns.iter().copied().map(vector3f_to_proto).collect(),
        misses: data.misses.iter().copied().map(vector3f_to_proto).collect(),
    }
}

pub fn range_data_from_proto(data: Option<&proto::RangeData>) -> RangeData {
    let Some(data) = data else {
        return RangeData::default();
    };
    RangeData {
        origin: vector3f_from_proto(data.origin.as_ref()),
        returns: data.returns.iter().map(|v| [v.x, v.y, v.z]).collect(),
        misses: data.misses.iter().map(|v| [v.x, v.y, v.z]).collect(),
    }
}

pub fn node_id_to_proto(id: NodeId) -> proto::NodeId {
    proto::NodeId {
        trajectory_id: id.trajectory_id,
        node_index: id.node_index,
    }
}

pub fn node_id_from_proto(id: &proto::NodeId) -> NodeId {
    NodeId {
        trajectory_id: id.trajectory_id,
        node_index: id.node_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_pose_is_identity() {
        assert_eq!(rigid3d_from_proto(None), Rigid3d::identity());

        let no_rotation = proto::Rigid3d {
            translation: Some(vector3d_to_proto([1.0, 2.0, 3.0])),
            rotation: None,
        };
        let pose = rigid3d_from_proto(Some(&no_rotation));
        assert_eq!(pose.translation, [1.0, 2.0, 3.0]);
        assert_eq!(pose.rotation, Quaternion::identity());
    }

    #[test]
    fn test_point_cloud_keeps_point_times() {
        let cloud = TimedPointCloudData {
            time: Time::from_unix_micros(42),
            origin: [0.1, 0.0, 0.2],
            ranges: vec![
                TimedRangefinderPoint {
                    position: [1.0, 0.0, 0.0],
                    time: -0.1,
                },
                TimedRangefinderPoint {
                    position: [0.0, 2.0, 0.0],
                    time: 0.0,
                },
            ],
        };

        let msg = timed_point_cloud_to_proto(&cloud);
        assert_eq!(msg.timestamp, cloud.time.to_universal());
        assert_eq!(msg.point_data[0].t, -0.1);
        assert_eq!(timed_point_cloud_from_proto(&msg), cloud);
    }

    #[test]
    fn test_lost_fixed_frame_fix_stays_absent() {
        let data = FixedFramePoseData {
            time: Time::from_universal(7),
            pose: None,
        };
        let msg = fixed_frame_pose_to_proto(&data);
        assert!(msg.pose.is_none());
        assert_eq!(fixed_frame_pose_from_proto(&msg), data);
    }
}
