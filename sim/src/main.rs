use std::env;
use std::error::Error;
use std::f64::consts::TAU;

use nalgebra::Isometry3;
use pose_replay::{
    GripperSignal, ReplayConfig, ReplaySession, SourceReplay, TargetReplay, TargetRobot,
};
use serde_json::json;
use tracing::{info, warn};

use sim::{FloatingGripper, SimulatedArm, HOME_JOINTS};

const DEMO_DATASET: &str = "furniture_bench";
const DEMO_FRAMES: usize = 20;

// Slow sweep around the home configuration; gripper opens for the first half.
fn synthetic_episode() -> (Vec<Vec<f64>>, Vec<GripperSignal>) {
    let mut joints = Vec::with_capacity(DEMO_FRAMES);
    let mut gripper = Vec::with_capacity(DEMO_FRAMES);
    for frame in 0..DEMO_FRAMES {
        let phase = TAU * frame as f64 / DEMO_FRAMES as f64;
        let q: Vec<f64> = HOME_JOINTS
            .iter()
            .enumerate()
            .map(|(i, q0)| q0 + 0.1 * (phase + i as f64).sin())
            .collect();
        joints.push(q);
        gripper.push(GripperSignal::Scalar(if frame < DEMO_FRAMES / 2 { 0.1 } else { 0.0 }));
    }
    (joints, gripper)
}

/// Usage: sim [config.json] [record_out.json]
fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let config = match args.get(1) {
        Some(path) => {
            info!("Loading replay config from {}", path);
            ReplayConfig::from_path(path)?
        }
        None => ReplayConfig::default(),
    };

    let [bx, by, bz] = config.base_offset;
    let base = Isometry3::translation(bx, by, bz);

    // Source robot: CRX arm teleported through the recorded joints.
    let mut source = ReplaySession::with_camera(
        SimulatedArm::crx_10ia(base),
        config.tracker.clone(),
        &config.camera_name,
    )?;
    match config.resolve_view(DEMO_DATASET, 0) {
        Ok(view) => {
            let placement = source.apply_view(&view)?;
            info!("Camera placed with error {:.6}", placement.error);
        }
        Err(e) => warn!("Keeping authored camera: {}", e),
    }

    let (joints, gripper) = synthetic_episode();
    let record = SourceReplay::new(DEMO_DATASET)
        .with_teleport_repeats(config.teleport_repeats)
        .run(&mut source, &config.convention_table(), &joints, &gripper)?;

    if let Some(path) = args.get(2) {
        record.write_json(path)?;
        info!("Wrote source record to {}", path);
    }

    // Target robot: floating gripper driven through the recorded poses.
    let mut target = ReplaySession::with_camera(
        FloatingGripper::default(),
        config.tracker.clone(),
        &config.camera_name,
    )?;
    let replay = TargetReplay {
        limits: config.tracker.limits,
        ..TargetReplay::default()
    };
    let report = replay.run(&mut target, &record)?;

    let finger = target.simulator().finger_position();
    let summary = json!({
        "dataset": DEMO_DATASET,
        "frames": record.len(),
        "success_rate": report.success_rate(),
        "final_gripper_opening": TargetRobot::Panda.opening_fraction(finger),
        "report": report,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
