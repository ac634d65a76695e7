//! setu-probe - exercise a map builder service with synthetic sensor data
//!
//! Streams IMU, odometry and a planar rangefinder sweep for a simulated robot
//! driving a circle, and logs every local SLAM result the service returns.
//!
//! ```bash
//! setu-probe --address 192.168.68.101:50051 --duration 30
//! setu-probe --config setu.toml --trajectory-id 2
//! ```

use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::f64::consts::TAU;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use setu::{
    ImuData, OdometryData, Rigid3d, SetuConfig, TcpConnection, Time, TimedPointCloudData,
    TrajectoryBuilderStub,
};

#[derive(Parser)]
#[command(name = "setu-probe")]
#[command(about = "Stream synthetic sensor data to a map builder service and log local SLAM results")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service address, overrides the config file
    #[arg(short, long)]
    address: Option<String>,

    /// Trajectory to upload into
    #[arg(short, long, default_value = "0")]
    trajectory_id: i32,

    /// Seconds to stream (0 = until interrupted)
    #[arg(short, long, default_value = "10")]
    duration: u64,

    /// IMU and odometry rate (Hz)
    #[arg(long, default_value = "50")]
    rate: f64,

    /// Rangefinder sweeps per second (0 = no rangefinder)
    #[arg(long, default_value = "5")]
    scan_rate: f64,

    /// Do not open the result stream
    #[arg(long)]
    no_results: bool,
}

/// Angular speed of the simulated robot (rad/s)
const YAW_RATE: f64 = 0.3;
/// Linear speed of the simulated robot (m/s)
const SPEED: f64 = 0.2;
/// Radius of the simulated circular room (m)
const ROOM_RADIUS: f32 = 3.0;
const POINTS_PER_SCAN: usize = 360;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        log::error!("setu-probe failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> setu::Result<()> {
    let period = send_period(args.rate, args.scan_rate)?;

    let mut config = match &args.config {
        Some(path) => SetuConfig::load(path)?,
        None => SetuConfig::default(),
    };
    if let Some(address) = &args.address {
        config.connection.address = address.clone();
    }

    log::info!("setu-probe starting");
    log::info!("  Service: {}", config.connection.address);
    log::info!("  Trajectory: {}", args.trajectory_id);
    log::info!(
        "  Rates: {} Hz IMU/odometry, {} Hz rangefinder",
        args.rate,
        args.scan_rate
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_signal_handler(Arc::clone(&shutdown))?;

    let connection = Arc::new(TcpConnection::new(&config.connection.to_tcp_config())?);
    let mut stub = if args.no_results {
        TrajectoryBuilderStub::without_results(connection, args.trajectory_id)
    } else {
        TrajectoryBuilderStub::new(
            connection,
            args.trajectory_id,
            Some(setu::ResultSink::callback(log_result)),
            config.stub,
        )?
    };

    let scan_every = if args.scan_rate > 0.0 {
        Some(((args.rate / args.scan_rate).round() as u64).max(1))
    } else {
        None
    };
    let deadline = (args.duration > 0).then(|| Instant::now() + Duration::from_secs(args.duration));

    let start = Time::now();
    let mut tick: u64 = 0;
    while !shutdown.load(Ordering::Relaxed) && deadline.is_none_or(|d| Instant::now() < d) {
        let elapsed = tick as f64 / args.rate;
        let time = start + Duration::from_secs_f64(elapsed);

        stub.add_imu_data("imu", &synthetic_imu(time));
        stub.add_odometry_data("odometry", &synthetic_odometry(time, elapsed));
        if let Some(every) = scan_every
            && tick % every == 0
        {
            stub.add_rangefinder_data("lidar", &synthetic_scan(time, elapsed));
        }

        tick += 1;
        thread::sleep(period);
    }

    log::info!("Sent {} IMU/odometry samples, finishing", tick);
    if let Some(stats) = stub.listener_stats() {
        log::info!(
            "  Results: {} delivered, {} undecodable",
            stats.delivered,
            stats.decode_failures
        );
    }
    stub.finish()?;

    log::info!("setu-probe shutdown complete");
    Ok(())
}

/// Interval between IMU/odometry samples.
///
/// Rejects rates that cannot drive the send loop: NaN, infinite, not
/// positive, or so small the interval does not fit a `Duration`.
fn send_period(rate: f64, scan_rate: f64) -> setu::Result<Duration> {
    let period = (rate.is_finite() && rate > 0.0)
        .then(|| Duration::try_from_secs_f64(1.0 / rate).ok())
        .flatten()
        .ok_or_else(|| {
            setu::Error::Config(format!("--rate must be a positive number, got {}", rate))
        })?;
    if !scan_rate.is_finite() || scan_rate < 0.0 {
        return Err(setu::Error::Config(format!(
            "--scan-rate must be zero or a positive number, got {}",
            scan_rate
        )));
    }
    Ok(period)
}

fn spawn_signal_handler(shutdown: Arc<AtomicBool>) -> setu::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::Builder::new()
        .name("signal-handler".to_string())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                log::info!("Received signal {:?}, stopping", sig);
                shutdown.store(true, Ordering::Relaxed);
            }
        })?;
    Ok(())
}

fn log_result(result: setu::LocalSlamResult) {
    let pose = &result.local_pose;
    match result.node_id {
        Some(node) => log::info!(
            "Result t={} pose=({:.3}, {:.3}, {:.3} rad) node {}:{} ({} returns)",
            result.time.to_universal(),
            pose.translation[0],
            pose.translation[1],
            pose.rotation.yaw(),
            node.trajectory_id,
            node.node_index,
            result.range_data.returns.len()
        ),
        None => log::debug!(
            "Result t={} pose=({:.3}, {:.3}, {:.3} rad) not inserted",
            result.time.to_universal(),
            pose.translation[0],
            pose.translation[1],
            pose.rotation.yaw()
        ),
    }
}

fn synthetic_imu(time: Time) -> ImuData {
    ImuData {
        time,
        linear_acceleration: [0.0, SPEED * YAW_RATE, 9.81],
        angular_velocity: [0.0, 0.0, YAW_RATE],
    }
}

/// Pose on a circle of radius SPEED / YAW_RATE around the origin.
fn synthetic_odometry(time: Time, elapsed: f64) -> OdometryData {
    let yaw = (YAW_RATE * elapsed) % TAU;
    let radius = SPEED / YAW_RATE;
    OdometryData {
        time,
        pose: Rigid3d::from_planar(radius * yaw.sin(), radius * (1.0 - yaw.cos()), yaw),
    }
}

/// Sweep of a circular room seen from the robot's current pose.
fn synthetic_scan(time: Time, elapsed: f64) -> TimedPointCloudData {
    let pose = synthetic_odometry(time, elapsed).pose;
    let (px, py) = (pose.translation[0] as f32, pose.translation[1] as f32);
    let yaw = pose.rotation.yaw() as f32;

    let points: Vec<(f32, f32, u8)> = (0..POINTS_PER_SCAN)
        .map(|i| {
            let angle = i as f32 * std::f32::consts::TAU / POINTS_PER_SCAN as f32;
            // Distance from (px, py) to the room wall along world heading yaw + angle
            let (s, c) = (yaw + angle).sin_cos();
            let b = px * c + py * s;
            let d = -b + (b * b - (px * px + py * py - ROOM_RADIUS * ROOM_RADIUS)).sqrt();
            (angle, d, 200)
        })
        .collect();

    TimedPointCloudData::from_polar_scan(time, &points, 0.2)
}
