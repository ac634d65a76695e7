//! Per-trajectory stub that forwards sensor data to the remote map builder.

use crossbeam_channel::{Receiver, unbounded};
use serde::Deserialize;
use std::sync::Arc;

use super::listener::{ListenerShutdown, ListenerStats, ResultListener, ResultSink};
use super::sensor_kind::{SensorData, SensorKind};
use super::upload::UploadChannels;
use crate::core::{
    FixedFramePoseData, ImuData, LocalSlamResult, OdometryData, TimedPointCloudData,
};
use crate::error::{Error, Result, TeardownFailure, TeardownStage};
use crate::proto;
use crate::transport::Connection;

/// What happens to teardown failures when the stub is dropped without
/// [`TrajectoryBuilderStub::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownPolicy {
    /// Log each failure at error level
    #[default]
    Report,
    /// Panic, treating a failed teardown as a broken invariant
    Panic,
}

/// Stub behavior settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct StubConfig {
    #[serde(default)]
    pub teardown_policy: TeardownPolicy,
    #[serde(default)]
    pub listener_shutdown: ListenerShutdown,
}

/// Client-side trajectory builder backed by a remote map builder service.
///
/// Each sensor kind gets its own upload stream, opened on the first reading
/// of that kind and kept until teardown. If a result sink is given, a
/// listener thread receives local SLAM results for the trajectory.
///
/// Teardown runs exactly once: explicitly through [`finish`](Self::finish),
/// or on drop. It joins the listener first, then closes the open upload
/// streams in rangefinder, IMU, odometry, fixed-frame-pose order.
///
/// # Example
///
/// ```ignore
/// use setu::{TcpConnection, TcpConnectionConfig, TrajectoryBuilderStub};
/// use std::sync::Arc;
///
/// let connection = Arc::new(TcpConnection::new(&TcpConnectionConfig::default())?);
/// let mut stub = TrajectoryBuilderStub::with_callback(connection, 0, |result| {
///     println!("pose at {:?}: {:?}", result.time, result.local_pose);
/// })?;
///
/// stub.add_imu_data("imu", &imu);
/// stub.finish()?;
/// ```
pub struct TrajectoryBuilderStub {
    connection: Arc<dyn Connection>,
    trajectory_id: i32,
    config: StubConfig,
    uploads: UploadChannels,
    listener: Option<ResultListener>,
    torn_down: bool,
}

impl TrajectoryBuilderStub {
    /// Create a stub, starting the result listener if `sink` is given.
    ///
    /// Fails only when the result stream or its thread cannot be set up.
    pub fn new(
        connection: Arc<dyn Connection>,
        trajectory_id: i32,
        sink: Option<ResultSink>,
        config: StubConfig,
    ) -> Result<Self> {
        let listener = match sink {
            Some(sink) => Some(ResultListener::start(
                connection.as_ref(),
                trajectory_id,
                sink,
            )?),
            None => None,
        };

        log::info!(
            "Trajectory {}: stub created ({})",
            trajectory_id,
            if listener.is_some() {
                "receiving results"
            } else {
                "upload only"
            }
        );

        Ok(Self {
            connection,
            trajectory_id,
            config,
            uploads: UploadChannels::new(),
            listener,
            torn_down: false,
        })
    }

    /// Stub that delivers results to `callback` on the listener thread.
    pub fn with_callback<F>(
        connection: Arc<dyn Connection>,
        trajectory_id: i32,
        callback: F,
    ) -> Result<Self>
    where
        F: FnMut(LocalSlamResult) + Send + 'static,
    {
        Self::new(
            connection,
            trajectory_id,
            Some(ResultSink::callback(callback)),
            StubConfig::default(),
        )
    }

    /// Stub that delivers results through a channel.
    pub fn with_result_channel(
        connection: Arc<dyn Connection>,
        trajectory_id: i32,
        config: StubConfig,
    ) -> Result<(Self, Receiver<LocalSlamResult>)> {
        let (tx, rx) = unbounded();
        let stub = Self::new(
            connection,
            trajectory_id,
            Some(ResultSink::Channel(tx)),
            config,
        )?;
        Ok((stub, rx))
    }

    /// Upload-only stub; no result listener is started.
    pub fn without_results(connection: Arc<dyn Connection>, trajectory_id: i32) -> Self {
        log::info!("Trajectory {}: stub created (upload only)", trajectory_id);
        Self {
            connection,
            trajectory_id,
            config: StubConfig::default(),
            uploads: UploadChannels::new(),
            listener: None,
            torn_down: false,
        }
    }

    pub fn trajectory_id(&self) -> i32 {
        self.trajectory_id
    }

    /// Whether the upload stream for `kind` has been opened.
    pub fn is_channel_open(&self, kind: SensorKind) -> bool {
        self.uploads.is_open(kind)
    }

    /// Whether a result listener is running.
    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    /// Listener counters, if a listener is running.
    pub fn listener_stats(&self) -> Option<ListenerStats> {
        self.listener.as_ref().map(ResultListener::stats)
    }

    /// Upload one reading on the stream for its kind.
    ///
    /// Returns once the request is handed to the transport. Write failures
    /// are reported by [`finish`](Self::finish).
    ///
    /// # Panics
    ///
    /// If this is the first reading of its kind and the upload stream cannot
    /// be opened.
    pub fn add_sensor_data<D: SensorData>(&mut self, sensor_id: &str, data: &D) {
        let request = data.encode_request(self.sensor_metadata(sensor_id));
        self.uploads
            .ensure_open(self.connection.as_ref(), D::KIND)
            .write(&request);
    }

    pub fn add_rangefinder_data(&mut self, sensor_id: &str, data: &TimedPointCloudData) {
        self.add_sensor_data(sensor_id, data);
    }

    pub fn add_imu_data(&mut self, sensor_id: &str, data: &ImuData) {
        self.add_sensor_data(sensor_id, data);
    }

    pub fn add_odometry_data(&mut self, sensor_id: &str, data: &OdometryData) {
        self.add_sensor_data(sensor_id, data);
    }

    pub fn add_fixed_frame_pose_data(&mut self, sensor_id: &str, data: &FixedFramePoseData) {
        self.add_sensor_data(sensor_id, data);
    }

    fn sensor_metadata(&self, sensor_id: &str) -> proto::SensorMetadata {
        proto::SensorMetadata {
            trajectory_id: self.trajectory_id,
            sensor_id: sensor_id.to_string(),
        }
    }

    /// Tear down and report every failed stage.
    pub fn finish(mut self) -> Result<()> {
        let failures = self.teardown();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Teardown(failures))
        }
    }

    fn teardown(&mut self) -> Vec<TeardownFailure> {
        if self.torn_down {
            return Vec::new();
        }
        self.torn_down = true;

        let mut failures = Vec::new();
        if let Some(listener) = self.listener.take()
            && let Err(error) = listener.join(self.config.listener_shutdown)
        {
            failures.push(TeardownFailure {
                stage: TeardownStage::Listener,
                error,
            });
        }
        failures.extend(self.uploads.close_all());

        log::info!(
            "Trajectory {}: stub torn down ({} failures)",
            self.trajectory_id,
            failures.len()
        );
        failures
    }
}

impl Drop for TrajectoryBuilderStub {
    fn drop(&mut self) {
        let failures = self.teardown();
        if failures.is_empty() {
            return;
        }

        for failure in &failures {
            log::error!("Trajectory {}: teardown: {}", self.trajectory_id, failure);
        }
        if self.config.teardown_policy == TeardownPolicy::Panic && !std::thread::panicking() {
            panic!(
                "Trajectory {}: teardown failed: {}",
                self.trajectory_id,
                Error::Teardown(failures)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert;
    use crate::core::{NodeId, RangeData, Rigid3d, Time, TimedRangefinderPoint};
    use crate::transport::mock::{MockConnection, MockEvent};
    use crate::transport::wire::status;
    use prost::Message as ProstMessage;
    use std::sync::Mutex;

    fn stub_on(conn: &MockConnection, trajectory_id: i32) -> TrajectoryBuilderStub {
        TrajectoryBuilderStub::without_results(Arc::new(conn.clone()), trajectory_id)
    }

    fn cloud() -> TimedPointCloudData {
        TimedPointCloudData {
            time: Time::from_unix_micros(1_000),
            origin: [0.0; 3],
            ranges: vec![TimedRangefinderPoint {
                position: [1.0, 0.0, 0.0],
                time: 0.0,
            }],
        }
    }

    fn imu() -> ImuData {
        ImuData {
            time: Time::from_unix_micros(1_000),
            linear_acceleration: [0.0, 0.0, 9.81],
            angular_velocity: [0.0, 0.0, 0.1],
        }
    }

    fn odometry() -> OdometryData {
        OdometryData {
            time: Time::from_unix_micros(1_000),
            pose: Rigid3d::from_planar(1.0, 0.0, 0.0),
        }
    }

    fn fixed_frame() -> FixedFramePoseData {
        FixedFramePoseData {
            time: Time::from_unix_micros(1_000),
            pose: Some(Rigid3d::identity()),
        }
    }

    fn metadata_of<M: ProstMessage + Default>(
        payload: &[u8],
        get: impl Fn(M) -> Option<proto::SensorMetadata>,
    ) -> proto::SensorMetadata {
        get(M::decode(payload).unwrap()).unwrap()
    }

    fn result_payload(
        trajectory_id: i32,
        ticks: i64,
        pose: &Rigid3d,
        data: &RangeData,
        node_index: Option<i32>,
    ) -> Vec<u8> {
        proto::ReceiveLocalSlamResultsResponse {
            trajectory_id,
            timestamp: ticks,
            local_pose: Some(convert::rigid3d_to_proto(pose)),
            range_data: Some(convert::range_data_to_proto(data)),
            node_id: node_index.map(|node_index| proto::NodeId {
                trajectory_id,
                node_index,
            }),
        }
        .encode_to_vec()
    }

    #[test]
    fn test_rangefinder_twice_opens_once_and_tags_both() {
        let conn = MockConnection::new();
        let mut stub = stub_on(&conn, 5);

        stub.add_rangefinder_data("horizontal_lidar", &cloud());
        stub.add_rangefinder_data("horizontal_lidar", &cloud());

        let method = SensorKind::Rangefinder.method();
        assert_eq!(conn.upload_opens(method), 1);

        let writes = conn.writes(method);
        assert_eq!(writes.len(), 2);
        for payload in &writes {
            let metadata = metadata_of(payload, |r: proto::AddRangefinderDataRequest| {
                r.sensor_metadata
            });
            assert_eq!(metadata.sensor_id, "horizontal_lidar");
            assert_eq!(metadata.trajectory_id, 5);
        }
    }

    #[test]
    fn test_each_kind_opens_exactly_one_channel() {
        let conn = MockConnection::new();
        let mut stub = stub_on(&conn, 0);

        for _ in 0..3 {
            stub.add_rangefinder_data("lidar", &cloud());
            stub.add_imu_data("imu", &imu());
            stub.add_odometry_data("odom", &odometry());
            stub.add_fixed_frame_pose_data("gps", &fixed_frame());
        }

        for kind in SensorKind::ALL {
            assert!(stub.is_channel_open(kind));
            assert_eq!(conn.upload_opens(kind.method()), 1, "{}", kind);
            assert_eq!(conn.writes(kind.method()).len(), 3, "{}", kind);
        }
    }

    #[test]
    fn test_every_kind_carries_trajectory_id() {
        let conn = MockConnection::new();
        let mut stub = stub_on(&conn, 42);

        stub.add_rangefinder_data("a", &cloud());
        stub.add_imu_data("b", &imu());
        stub.add_odometry_data("c", &odometry());
        stub.add_fixed_frame_pose_data("d", &fixed_frame());

        let rangefinder = metadata_of(
            &conn.writes(SensorKind::Rangefinder.method())[0],
            |r: proto::AddRangefinderDataRequest| r.sensor_metadata,
        );
        let imu = metadata_of(
            &conn.writes(SensorKind::Imu.method())[0],
            |r: proto::AddImuDataRequest| r.sensor_metadata,
        );
        let odom = metadata_of(
            &conn.writes(SensorKind::Odometry.method())[0],
            |r: proto::AddOdometryDataRequest| r.sensor_metadata,
        );
        let gps = metadata_of(
            &conn.writes(SensorKind::FixedFramePose.method())[0],
            |r: proto::AddFixedFramePoseDataRequest| r.sensor_metadata,
        );

        for (metadata, sensor_id) in [(rangefinder, "a"), (imu, "b"), (odom, "c"), (gps, "d")] {
            assert_eq!(metadata.trajectory_id, 42);
            assert_eq!(metadata.sensor_id, sensor_id);
        }
    }

    #[test]
    fn test_payload_survives_encoding() {
        let conn = MockConnection::new();
        let mut stub = stub_on(&conn, 1);
        stub.add_imu_data("imu", &imu());

        let request =
            proto::AddImuDataRequest::decode(conn.writes(SensorKind::Imu.method())[0].as_slice())
                .unwrap();
        let decoded = convert::imu_from_proto(&request.imu_data.unwrap());
        assert_eq!(decoded, imu());
    }

    #[test]
    fn test_teardown_closes_only_opened_channels() {
        let conn = MockConnection::new();
        let mut stub = stub_on(&conn, 0);
        stub.add_rangefinder_data("lidar", &cloud());
        stub.add_imu_data("imu", &imu());
        stub.finish().unwrap();

        let closes: Vec<_> = conn
            .events()
            .into_iter()
            .filter(|e| matches!(e, MockEvent::WritesDone(_) | MockEvent::UploadFinished(_)))
            .collect();
        assert_eq!(
            closes,
            vec![
                MockEvent::WritesDone(SensorKind::Rangefinder.method()),
                MockEvent::UploadFinished(SensorKind::Rangefinder.method()),
                MockEvent::WritesDone(SensorKind::Imu.method()),
                MockEvent::UploadFinished(SensorKind::Imu.method()),
            ]
        );
    }

    #[test]
    fn test_drop_tears_down_once() {
        let conn = MockConnection::new();
        {
            let mut stub = stub_on(&conn, 0);
            stub.add_odometry_data("odom", &odometry());
        }
        let finished = conn
            .events()
            .iter()
            .filter(|e| matches!(e, MockEvent::UploadFinished(_)))
            .count();
        assert_eq!(finished, 1);
    }

    #[test]
    fn test_no_callback_means_no_listener() {
        let conn = MockConnection::new();
        let stub = stub_on(&conn, 0);
        assert!(!stub.has_listener());
        stub.finish().unwrap();

        assert!(
            !conn
                .events()
                .iter()
                .any(|e| matches!(e, MockEvent::DownloadOpened { .. } | MockEvent::DownloadFinished(_)))
        );
    }

    #[test]
    fn test_results_scenario_with_node() {
        let conn = MockConnection::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let stub = TrajectoryBuilderStub::with_callback(Arc::new(conn.clone()), 3, move |r| {
            sink.lock().unwrap().push(r);
        })
        .unwrap();
        assert!(stub.has_listener());

        let pose1 = Rigid3d::from_planar(1.0, 0.0, 0.0);
        let pose2 = Rigid3d::from_planar(2.0, 0.5, 0.3);
        let data1 = RangeData {
            origin: [0.0; 3],
            returns: vec![[1.0, 1.0, 0.0]],
            misses: vec![],
        };
        let data2 = RangeData {
            origin: [0.1, 0.0, 0.0],
            returns: vec![],
            misses: vec![[5.0, 0.0, 0.0]],
        };
        conn.push_download(result_payload(3, 100, &pose1, &data1, None));
        conn.push_download(result_payload(3, 200, &pose2, &data2, Some(7)));
        conn.close_download();

        stub.finish().unwrap();

        let received = received.lock().unwrap();
        assert_eq!(
            *received,
            vec![
                LocalSlamResult {
                    trajectory_id: 3,
                    time: Time::from_universal(100),
                    local_pose: pose1,
                    range_data: data1,
                    node_id: None,
                },
                LocalSlamResult {
                    trajectory_id: 3,
                    time: Time::from_universal(200),
                    local_pose: pose2,
                    range_data: data2,
                    node_id: Some(NodeId {
                        trajectory_id: 3,
                        node_index: 7
                    }),
                },
            ]
        );

        match &conn.events()[0] {
            MockEvent::DownloadOpened { request, .. } => {
                let request =
                    proto::ReceiveLocalSlamResultsRequest::decode(request.as_slice()).unwrap();
                assert_eq!(request.trajectory_id, 3);
            }
            other => panic!("unexpected first event {:?}", other),
        }
    }

    #[test]
    fn test_n_results_n_callbacks_in_order() {
        let conn = MockConnection::new();
        let (stub, rx) =
            TrajectoryBuilderStub::with_result_channel(Arc::new(conn.clone()), 1, StubConfig::default())
                .unwrap();

        let n = 25;
        for i in 0..n {
            let node = (i % 3 == 0).then_some(i as i32);
            conn.push_download(result_payload(
                1,
                i,
                &Rigid3d::identity(),
                &RangeData::default(),
                node,
            ));
        }
        conn.close_download();
        stub.finish().unwrap();

        let results: Vec<_> = rx.try_iter().collect();
        assert_eq!(results.len(), n as usize);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.time.to_universal(), i as i64);
            assert_eq!(result.node_id.is_some(), i % 3 == 0);
        }
    }

    #[test]
    fn test_listener_joined_before_uploads_close() {
        let conn = MockConnection::new();
        let (mut stub, _rx) =
            TrajectoryBuilderStub::with_result_channel(Arc::new(conn.clone()), 1, StubConfig::default())
                .unwrap();
        stub.add_imu_data("imu", &imu());
        conn.close_download();
        stub.finish().unwrap();

        let events = conn.events();
        let download_done = events
            .iter()
            .position(|e| matches!(e, MockEvent::DownloadFinished(_)))
            .unwrap();
        let upload_done = events
            .iter()
            .position(|e| matches!(e, MockEvent::WritesDone(_)))
            .unwrap();
        assert!(download_done < upload_done);
    }

    #[test]
    fn test_finish_reports_listener_and_upload_failures() {
        let conn = MockConnection::new();
        conn.fail_finish(SensorKind::Odometry.method());
        let (mut stub, _rx) =
            TrajectoryBuilderStub::with_result_channel(Arc::new(conn.clone()), 1, StubConfig::default())
                .unwrap();
        stub.add_odometry_data("odom", &odometry());
        conn.fail_download(status::INTERNAL, "map builder crashed");

        match stub.finish() {
            Err(Error::Teardown(failures)) => {
                let stages: Vec<_> = failures.iter().map(|f| f.stage).collect();
                assert_eq!(
                    stages,
                    vec![
                        TeardownStage::Listener,
                        TeardownStage::Upload(SensorKind::Odometry)
                    ]
                );
            }
            other => panic!("expected teardown failure, got {:?}", other),
        }
    }

    #[test]
    fn test_finish_reports_failed_write() {
        let conn = MockConnection::new();
        let method = SensorKind::Odometry.method();
        conn.fail_write(method, 1);
        let mut stub = stub_on(&conn, 4);
        assert_eq!(stub.trajectory_id(), 4);
        stub.add_odometry_data("odom", &odometry());
        stub.add_odometry_data("odom", &odometry());
        stub.add_imu_data("imu", &imu());

        assert!(conn.writes(method).is_empty());
        assert_eq!(conn.writes(SensorKind::Imu.method()).len(), 1);
        match stub.finish() {
            Err(Error::Teardown(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(
                    failures[0].stage,
                    TeardownStage::Upload(SensorKind::Odometry)
                );
                assert!(matches!(
                    failures[0].error,
                    Error::Status {
                        code: status::UNAVAILABLE,
                        ..
                    }
                ));
            }
            other => panic!("expected teardown failure, got {:?}", other),
        }
    }

    #[test]
    fn test_cancel_shutdown_does_not_wait_for_remote() {
        let conn = MockConnection::new();
        let config = StubConfig {
            listener_shutdown: ListenerShutdown::Cancel,
            ..StubConfig::default()
        };
        let (stub, _rx) =
            TrajectoryBuilderStub::with_result_channel(Arc::new(conn.clone()), 1, config).unwrap();

        // The remote never closes the stream
        assert!(stub.finish().is_ok());
    }

    #[test]
    #[should_panic(expected = "teardown failed")]
    fn test_panic_policy_on_drop() {
        let conn = MockConnection::new();
        conn.fail_finish(SensorKind::Imu.method());
        let config = StubConfig {
            teardown_policy: TeardownPolicy::Panic,
            ..StubConfig::default()
        };
        let mut stub = TrajectoryBuilderStub::new(Arc::new(conn.clone()), 0, None, config).unwrap();
        stub.add_imu_data("imu", &imu());
        drop(stub);
    }

    #[test]
    fn test_report_policy_on_drop_does_not_panic() {
        let conn = MockConnection::new();
        conn.fail_finish(SensorKind::Imu.method());
        let mut stub = stub_on(&conn, 0);
        stub.add_imu_data("imu", &imu());
        drop(stub);
        assert_eq!(conn.upload_opens(SensorKind::Imu.method()), 1);
    }
}
