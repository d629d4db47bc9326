//! Session-level behaviour of the tracking loop against a scripted simulator.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use pose_replay::{
    Action, CameraId, ControlMode, Pose, ReplayError, ReplaySession, Simulator, SimulatorError,
    StepOutcome, TrackerConfig, TrackingExit,
};

/// End effector that closes a fixed fraction of the gap each step, up to `stall_after` steps.
struct ScriptedSim {
    pose: Pose,
    joints: Vec<f64>,
    velocities: Vec<f64>,
    gain: f64,
    stall_after: Option<usize>,
    fail_at: Option<usize>,
    steps: usize,
    mode: ControlMode,
    camera_obs: bool,
    camera_parent: Isometry3<f64>,
    camera_local: Isometry3<f64>,
    camera_authored: Isometry3<f64>,
    fovy: f64,
}

impl ScriptedSim {
    fn new(gain: f64) -> Self {
        let authored = Isometry3::from_parts(
            Translation3::new(1.0, 0.0, 0.5),
            UnitQuaternion::from_euler_angles(0.0, 0.8, 3.14),
        );
        Self {
            pose: Pose::new(Vector3::new(0.0, 0.0, 1.0), UnitQuaternion::identity()),
            joints: vec![0.0; 3],
            velocities: vec![0.0; 3],
            gain,
            stall_after: None,
            fail_at: None,
            steps: 0,
            mode: ControlMode::Delta,
            camera_obs: false,
            camera_parent: Isometry3::translation(-0.6, 0.0, 0.912),
            camera_local: authored,
            camera_authored: authored,
            fovy: 45.0,
        }
    }
}

impl Simulator for ScriptedSim {
    fn step(&mut self, action: &Action) -> Result<StepOutcome, SimulatorError> {
        if self.fail_at == Some(self.steps) {
            return Err(SimulatorError::Fault("solver diverged".to_string()));
        }
        self.steps += 1;
        if self.mode == ControlMode::Delta {
            return Ok(StepOutcome::default());
        }
        if let Some(n) = self.stall_after {
            if self.steps > n {
                return Ok(StepOutcome::default());
            }
        }
        let p = action.position();
        let aa = action.axis_angle();
        let target_pos = Vector3::new(p[0], p[1], p[2]);
        let target_rot = UnitQuaternion::from_scaled_axis(Vector3::new(aa[0], aa[1], aa[2]));
        self.pose.position += (target_pos - self.pose.position) * self.gain;
        let delta = (target_rot * self.pose.orientation.inverse()).scaled_axis();
        self.pose.orientation = UnitQuaternion::from_scaled_axis(delta * self.gain) * self.pose.orientation;
        self.joints = vec![self.pose.position.x, self.pose.position.y, self.pose.position.z];
        Ok(StepOutcome::default())
    }

    fn eef_pose(&self) -> Pose {
        self.pose
    }

    fn joint_count(&self) -> usize {
        3
    }

    fn joint_positions(&self) -> Vec<f64> {
        self.joints.clone()
    }

    fn joint_velocities(&self) -> Vec<f64> {
        self.velocities.clone()
    }

    fn set_joint_state(&mut self, positions: &[f64], velocities: &[f64]) -> Result<(), SimulatorError> {
        self.joints = positions.to_vec();
        self.velocities = velocities.to_vec();
        Ok(())
    }

    fn forward(&mut self) {
        self.pose.position = Vector3::new(self.joints[0], self.joints[1], self.joints[2]);
    }

    fn control_mode(&self) -> ControlMode {
        self.mode
    }

    fn set_control_mode(&mut self, mode: ControlMode) {
        self.mode = mode;
    }

    fn camera_observations_enabled(&self) -> bool {
        self.camera_obs
    }

    fn set_camera_observations(&mut self, enabled: bool) {
        self.camera_obs = enabled;
    }

    fn camera_id(&self, name: &str) -> Result<CameraId, SimulatorError> {
        if name == "agentview" {
            Ok(CameraId(0))
        } else {
            Err(SimulatorError::UnknownCamera(name.to_string()))
        }
    }

    fn camera_pose(&self, _id: CameraId) -> Result<Pose, SimulatorError> {
        Ok(Pose::from_isometry(&(self.camera_parent * self.camera_local)))
    }

    fn camera_model_pose(&self, _id: CameraId) -> Result<Pose, SimulatorError> {
        Ok(Pose::from_isometry(&self.camera_authored))
    }

    fn set_camera_pose(&mut self, _id: CameraId, pose: &Pose) -> Result<(), SimulatorError> {
        self.camera_local = self.camera_parent.inverse() * pose.to_isometry();
        Ok(())
    }

    fn camera_fovy(&self, _id: CameraId) -> Result<f64, SimulatorError> {
        Ok(self.fovy)
    }

    fn set_camera_fovy(&mut self, _id: CameraId, fovy: f64) -> Result<(), SimulatorError> {
        self.fovy = fovy;
        Ok(())
    }
}

#[test]
fn test_converges_and_caches_safe_joints() {
    let mut session = ReplaySession::new(ScriptedSim::new(0.5), TrackerConfig::default()).unwrap();
    assert!(session.safe_joint_configuration().is_none());

    let outcome = session.drive_to_pose(&[0.5, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.exit, TrackingExit::Converged);
    assert!(outcome.final_error <= 0.003);
    assert!(outcome.iterations < 100);
    assert!(outcome.shortfall.is_none());

    let safe = session.safe_joint_configuration().unwrap();
    assert!((safe[0] - 0.5).abs() < 0.003);
    assert_eq!(session.simulator().control_mode(), ControlMode::Absolute);
    assert!(session.simulator().camera_observations_enabled());
}

#[test]
fn test_already_at_target_takes_no_steps() {
    let mut session = ReplaySession::new(ScriptedSim::new(0.5), TrackerConfig::default()).unwrap();
    let outcome = session.drive_to_pose(&[0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.iterations, 0);
    assert_eq!(session.simulator().steps, 0);
}

#[test]
fn test_wrong_dimension_is_invalid_input() {
    let mut session = ReplaySession::new(ScriptedSim::new(0.5), TrackerConfig::default()).unwrap();
    let err = session.drive_to_pose(&[0.5, 0.0, 1.0]).unwrap_err();
    assert!(matches!(err, ReplayError::InvalidInput(_)));
    assert_eq!(session.simulator().steps, 0);
}

#[test]
fn test_stagnation_is_diagnostic_by_default() {
    let mut sim = ScriptedSim::new(0.5);
    sim.stall_after = Some(2);
    let mut session = ReplaySession::new(sim, TrackerConfig::default()).unwrap();

    let outcome = session.drive_to_pose(&[0.5, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]).unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.exit, TrackingExit::BudgetExhausted);
    assert_eq!(outcome.iterations, 100);
    assert_eq!(outcome.longest_stagnation, 98);
    let shortfall = outcome.shortfall.unwrap();
    assert!((shortfall[0] - 0.125).abs() < 1e-9);
}

#[test]
fn test_stagnation_limit_exits_early() {
    let mut sim = ScriptedSim::new(0.5);
    sim.stall_after = Some(2);
    let config = TrackerConfig {
        stagnation_limit: Some(10),
        ..TrackerConfig::default()
    };
    let mut session = ReplaySession::new(sim, config).unwrap();

    let outcome = session.drive_to_pose(&[0.5, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]).unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.exit, TrackingExit::Stagnated);
    assert_eq!(outcome.iterations, 12);
    assert!(outcome.shortfall.is_some());
    assert!(matches!(
        outcome.into_result(),
        Err(ReplayError::PoseUnreachable { .. })
    ));
}

#[test]
fn test_loose_threshold_accepts_exhausted_budget() {
    let mut sim = ScriptedSim::new(0.5);
    // 0.5 * 0.5^6 = 0.0078; stalls under the loose 0.01 but above 0.003
    sim.stall_after = Some(6);
    let mut session = ReplaySession::new(sim, TrackerConfig::default()).unwrap();

    let outcome = session.drive_to_pose(&[0.5, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]).unwrap();
    assert_eq!(outcome.exit, TrackingExit::BudgetExhausted);
    assert!(outcome.success);
    assert!(outcome.final_error > 0.003 && outcome.final_error < 0.01);
}

#[test]
fn test_simulator_fault_propagates_and_restores_camera_obs() {
    let mut sim = ScriptedSim::new(0.5);
    sim.fail_at = Some(3);
    let mut session = ReplaySession::new(sim, TrackerConfig::default()).unwrap();

    let err = session.drive_to_pose(&[0.5, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]).unwrap_err();
    assert!(matches!(err, ReplayError::Simulator(SimulatorError::Fault(_))));
    assert!(!err.is_recoverable());
    assert!(session.simulator().camera_observations_enabled());
}

#[test]
fn test_teleport_checks_dimension_and_zeroes_velocity() {
    let mut sim = ScriptedSim::new(0.5);
    sim.velocities = vec![1.0, 2.0, 3.0];
    let mut session = ReplaySession::new(sim, TrackerConfig::default()).unwrap();

    assert!(matches!(
        session.teleport_to_joint_configuration(&[0.1, 0.2]),
        Err(ReplayError::InvalidInput(_))
    ));

    session.teleport_to_joint_configuration(&[0.1, 0.2, 0.3]).unwrap();
    assert_eq!(session.simulator().joint_velocities(), vec![0.0; 3]);
    assert_eq!(session.eef_pose().position, Vector3::new(0.1, 0.2, 0.3));
}

#[test]
fn test_recover_requires_cached_pose() {
    let mut session = ReplaySession::new(ScriptedSim::new(0.5), TrackerConfig::default()).unwrap();
    assert!(matches!(session.recover_to_safe_pose(), Err(ReplayError::NoSafePose)));

    session.drive_to_pose(&[0.2, 0.1, 0.9, 1.0, 0.0, 0.0, 0.0]).unwrap();
    session.teleport_to_joint_configuration(&[0.0, 0.0, 0.0]).unwrap();
    session.recover_to_safe_pose().unwrap();
    assert!((session.eef_pose().position - Vector3::new(0.2, 0.1, 0.9)).norm() < 0.003);
}

#[test]
fn test_actuate_gripper_uses_delta_mode() {
    let mut session = ReplaySession::new(ScriptedSim::new(0.5), TrackerConfig::default()).unwrap();
    session.actuate_gripper(true).unwrap();
    assert_eq!(session.simulator().control_mode(), ControlMode::Delta);
    assert_eq!(session.simulator().steps, 1);
}

#[test]
fn test_camera_file_frame_roundtrip() {
    let session =
        ReplaySession::with_camera(ScriptedSim::new(0.5), TrackerConfig::default(), "agentview")
            .unwrap();
    let world = session.camera_pose_world_frame().unwrap();
    let file = session.camera_pose_file_frame(&world).unwrap();
    let authored = session.simulator().camera_authored;

    assert!((file.position - authored.translation.vector).norm() < 1e-9);
    assert!(file.orientation.angle_to(&authored.rotation) < 1e-6);

    let rig = session.camera().unwrap();
    let back = rig.pose_from_file_frame(&file);
    assert!((back.position - world.position).norm() < 1e-9);
}

fn tag_values(tag: &str, key: &str) -> Vec<f64> {
    let marker = format!("{}=\"", key);
    let start = tag.find(&marker).unwrap() + marker.len();
    let end = start + tag[start..].find('"').unwrap();
    tag[start..end]
        .split_whitespace()
        .map(|v| v.parse().unwrap())
        .collect()
}

#[test]
fn test_camera_scene_tag_uses_file_frame() {
    let session =
        ReplaySession::with_camera(ScriptedSim::new(0.5), TrackerConfig::default(), "agentview")
            .unwrap();

    // Parent only translates, so world_in_file undoes the parent offset.
    let m = session.camera().unwrap().world_in_file_matrix();
    assert!((m[(0, 3)] - 0.6).abs() < 1e-9);
    assert!((m[(2, 3)] + 0.912).abs() < 1e-9);
    assert!((m.fixed_view::<3, 3>(0, 0).into_owned() - nalgebra::Matrix3::identity()).norm() < 1e-9);

    let world = session.camera_pose_world_frame().unwrap();
    let tag = session.camera_scene_tag(&world).unwrap();
    println!("{}", tag);
    assert!(tag.starts_with("<camera name=\"agentview\" pos=\""));
    assert!(tag.ends_with("\"/>"));

    let authored = session.simulator().camera_authored;
    let pos = tag_values(&tag, "pos");
    assert_eq!(pos.len(), 3);
    assert!((Vector3::new(pos[0], pos[1], pos[2]) - authored.translation.vector).norm() < 1e-9);

    let quat = tag_values(&tag, "quat");
    let q = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(quat[0], quat[1], quat[2], quat[3]));
    assert!(q.angle_to(&authored.rotation) < 1e-6);

    let missing = ReplaySession::new(ScriptedSim::new(0.5), TrackerConfig::default()).unwrap();
    assert!(missing.camera_scene_tag(&world).is_err());
}

#[test]
fn test_camera_without_attach_is_an_error() {
    let session = ReplaySession::new(ScriptedSim::new(0.5), TrackerConfig::default()).unwrap();
    assert!(session.camera_pose_world_frame().is_err());
    let err = ReplaySession::with_camera(ScriptedSim::new(0.5), TrackerConfig::default(), "wrist")
        .err()
        .unwrap();
    assert!(matches!(
        err,
        ReplayError::Simulator(SimulatorError::UnknownCamera(_))
    ));
}
