//! Kinematic CRX arm behind the [`Simulator`] seam.
//!
//! Each control step is split into physics substeps. Every substep runs a
//! damped-least-squares operational-space law on the CRX Jacobian and
//! integrates joint velocities, clamped to the joint speed limit.

use nalgebra::{Isometry3, Matrix6, UnitQuaternion, Vector3, Vector6};
use pose_replay::{
    Action, CameraId, ControlMode, Pose, Simulator, SimulatorError, StepOutcome,
};
use tracing::trace;

use crate::kinematics::CrxKinematics;
use crate::robot_config::{ArmConfig, ControlParams};
use crate::scene::CameraSet;

pub const ARM_JOINTS: usize = 6;

/// Finger joint position of a fully open parallel gripper, m
pub const FINGER_OPEN: f64 = 0.04;

/// Finger travel speed, m/s
const FINGER_SPEED: f64 = 1.0;

/// Elbow-up configuration clear of the wrist singularity.
pub const HOME_JOINTS: [f64; ARM_JOINTS] = [0.0, 0.3, -0.5, 0.2, -0.8, 0.1];

#[derive(Debug, Clone)]
pub struct SimulatedArm {
    kinematics: CrxKinematics,
    params: ControlParams,
    base: Isometry3<f64>,
    joints: [f64; ARM_JOINTS],
    velocities: [f64; ARM_JOINTS],
    finger: f64,
    finger_target: f64,
    /// Flange pose in the world, refreshed by `forward`.
    eef: Isometry3<f64>,
    mode: ControlMode,
    camera_obs: bool,
    cameras: CameraSet,
    time: f64,
}

impl SimulatedArm {
    pub fn new(config: ArmConfig, params: ControlParams, base: Isometry3<f64>) -> Result<Self, String> {
        params.validate()?;
        if config.max_joint_velocity <= 0.0 {
            return Err("Joint velocity limit must be greater than 0.".to_string());
        }
        Ok(Self::build(config, params, base))
    }

    fn build(config: ArmConfig, params: ControlParams, base: Isometry3<f64>) -> Self {
        let mut arm = Self {
            kinematics: CrxKinematics::from_config(config),
            params,
            base,
            joints: HOME_JOINTS,
            velocities: [0.0; ARM_JOINTS],
            finger: FINGER_OPEN,
            finger_target: FINGER_OPEN,
            eef: Isometry3::identity(),
            mode: ControlMode::Delta,
            camera_obs: true,
            cameras: CameraSet::tabletop(base),
            time: 0.0,
        };
        arm.forward();
        arm
    }

    /// CRX-10iA mounted at `base` with default gains.
    pub fn crx_10ia(base: Isometry3<f64>) -> Self {
        Self::build(ArmConfig::crx_10ia(), ControlParams::default(), base)
    }

    pub fn with_cameras(mut self, cameras: CameraSet) -> Self {
        self.cameras = cameras;
        self
    }

    pub fn base(&self) -> &Isometry3<f64> {
        &self.base
    }

    pub fn kinematics(&self) -> &CrxKinematics {
        &self.kinematics
    }

    /// First finger joint position.
    pub fn finger_position(&self) -> f64 {
        self.finger
    }

    /// Simulated time, s
    pub fn time(&self) -> f64 {
        self.time
    }

    fn target_from_action(&self, action: &Action) -> Isometry3<f64> {
        let position = Vector3::from(action.position());
        let rotvec = Vector3::from(action.axis_angle());
        match self.mode {
            ControlMode::Absolute => Isometry3::from_parts(
                position.into(),
                UnitQuaternion::from_scaled_axis(rotvec),
            ),
            ControlMode::Delta => Isometry3::from_parts(
                (self.eef.translation.vector + position).into(),
                UnitQuaternion::from_scaled_axis(rotvec) * self.eef.rotation,
            ),
        }
    }

    fn osc_substep(&mut self, target_in_base: &Isometry3<f64>, dt: f64) -> Result<(), SimulatorError> {
        let current = self.kinematics.forward_kinematics(&self.joints);

        let pos_err = target_in_base.translation.vector - current.translation.vector;
        let rot_err = (target_in_base.rotation * current.rotation.inverse()).scaled_axis();
        let twist = Vector6::new(
            self.params.kp_position * pos_err.x,
            self.params.kp_position * pos_err.y,
            self.params.kp_position * pos_err.z,
            self.params.kp_orientation * rot_err.x,
            self.params.kp_orientation * rot_err.y,
            self.params.kp_orientation * rot_err.z,
        );

        let jac = self.kinematics.jacobian(&self.joints);
        let lambda2 = self.params.damping * self.params.damping;
        let jjt = jac * jac.transpose() + Matrix6::identity() * lambda2;
        let solved = jjt
            .cholesky()
            .ok_or_else(|| SimulatorError::Fault("singular task-space inertia".to_string()))?
            .solve(&twist);
        let dq = jac.transpose() * solved;

        let vmax = self.kinematics.config().max_joint_velocity;
        for i in 0..ARM_JOINTS {
            let v = dq[i].clamp(-vmax, vmax);
            self.velocities[i] = v;
            self.joints[i] += v * dt;
        }

        let travel = FINGER_SPEED * dt;
        let gap = self.finger_target - self.finger;
        if gap.abs() <= travel {
            self.finger = self.finger_target;
        } else {
            self.finger += travel.copysign(gap);
        }
        Ok(())
    }
}

impl Simulator for SimulatedArm {
    fn step(&mut self, action: &Action) -> Result<StepOutcome, SimulatorError> {
        if action.0.iter().any(|v| !v.is_finite()) {
            return Err(SimulatorError::Fault(format!("non-finite action {:?}", action.0)));
        }

        let grip = action.gripper_command();
        if grip > 0.0 {
            self.finger_target = 0.0;
        } else if grip < 0.0 {
            self.finger_target = FINGER_OPEN;
        }

        let target_in_base = self.base.inverse() * self.target_from_action(action);
        let dt = self.params.model_timestep;
        for _ in 0..self.params.substeps() {
            self.osc_substep(&target_in_base, dt)?;
        }
        self.time += self.params.control_timestep;
        self.forward();

        trace!("t={:.3} joints={:?}", self.time, self.joints);
        Ok(StepOutcome::default())
    }

    fn eef_pose(&self) -> Pose {
        Pose::from_isometry(&self.eef)
    }

    fn joint_count(&self) -> usize {
        ARM_JOINTS
    }

    fn joint_positions(&self) -> Vec<f64> {
        self.joints.to_vec()
    }

    fn joint_velocities(&self) -> Vec<f64> {
        self.velocities.to_vec()
    }

    fn set_joint_state(&mut self, positions: &[f64], velocities: &[f64]) -> Result<(), SimulatorError> {
        for values in [positions, velocities] {
            if values.len() != ARM_JOINTS {
                return Err(SimulatorError::DimensionMismatch {
                    expected: ARM_JOINTS,
                    actual: values.len(),
                });
            }
        }
        self.joints.copy_from_slice(positions);
        self.velocities.copy_from_slice(velocities);
        Ok(())
    }

    fn forward(&mut self) {
        self.eef = self.base * self.kinematics.forward_kinematics(&self.joints);
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
        self.cameras.id(name)
    }

    fn camera_pose(&self, id: CameraId) -> Result<Pose, SimulatorError> {
        self.cameras.pose(id)
    }

    fn camera_model_pose(&self, id: CameraId) -> Result<Pose, SimulatorError> {
        self.cameras.model_pose(id)
    }

    fn set_camera_pose(&mut self, id: CameraId, pose: &Pose) -> Result<(), SimulatorError> {
        self.cameras.set_pose(id, pose)
    }

    fn camera_fovy(&self, id: CameraId) -> Result<f64, SimulatorError> {
        self.cameras.fovy(id)
    }

    fn set_camera_fovy(&mut self, id: CameraId, fovy: f64) -> Result<(), SimulatorError> {
        self.cameras.set_fovy(id, fovy)
    }
}
