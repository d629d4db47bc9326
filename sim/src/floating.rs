//! Free-floating gripper inside a bounded workspace.
//!
//! The six joints are the world position followed by the rotation vector of
//! the gripper body. Targets outside the workspace box are clamped to it, so
//! out-of-reach poses stay out of reach however long the controller runs.

use nalgebra::{Isometry3, UnitQuaternion, Vector3};
use pose_replay::{Action, CameraId, ControlMode, Pose, Simulator, SimulatorError, StepOutcome};
use serde::{Deserialize, Serialize};

use crate::arm::FINGER_OPEN;
use crate::robot_config::ControlParams;
use crate::scene::CameraSet;

const FLOATING_JOINTS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            min: [-1.0, -1.0, 0.8],
            max: [1.0, 1.0, 1.6],
        }
    }
}

impl Workspace {
    pub fn clamp(&self, p: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(
            p.x.clamp(self.min[0], self.max[0]),
            p.y.clamp(self.min[1], self.max[1]),
            p.z.clamp(self.min[2], self.max[2]),
        )
    }

    pub fn contains(&self, p: &Vector3<f64>) -> bool {
        self.clamp(p) == *p
    }

    pub fn validate(&self) -> Result<(), String> {
        let ordered = self
            .min
            .iter()
            .zip(&self.max)
            .all(|(lo, hi)| lo.is_finite() && hi.is_finite() && lo <= hi);
        if !ordered {
            return Err("Workspace bounds must be finite with min <= max.".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FloatingGripper {
    params: ControlParams,
    workspace: Workspace,
    position: Vector3<f64>,
    orientation: UnitQuaternion<f64>,
    velocities: [f64; FLOATING_JOINTS],
    finger: f64,
    mode: ControlMode,
    camera_obs: bool,
    cameras: CameraSet,
}

impl FloatingGripper {
    pub fn new(workspace: Workspace, params: ControlParams) -> Result<Self, String> {
        params.validate()?;
        workspace.validate()?;
        Ok(Self::build(workspace, params))
    }

    fn build(workspace: Workspace, params: ControlParams) -> Self {
        Self {
            params,
            workspace,
            position: Vector3::new(0.0, 0.0, 1.2),
            orientation: UnitQuaternion::identity(),
            velocities: [0.0; FLOATING_JOINTS],
            finger: FINGER_OPEN,
            mode: ControlMode::Delta,
            camera_obs: true,
            cameras: CameraSet::tabletop(Isometry3::translation(-0.6, 0.0, 0.912)),
        }
    }

    pub fn with_cameras(mut self, cameras: CameraSet) -> Self {
        self.cameras = cameras;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn finger_position(&self) -> f64 {
        self.finger
    }
}

impl Default for FloatingGripper {
    fn default() -> Self {
        Self::build(Workspace::default(), ControlParams::default())
    }
}

impl Simulator for FloatingGripper {
    fn step(&mut self, action: &Action) -> Result<StepOutcome, SimulatorError> {
        if action.0.iter().any(|v| !v.is_finite()) {
            return Err(SimulatorError::Fault(format!("non-finite action {:?}", action.0)));
        }

        let motion = Vector3::from(action.position());
        let rotvec = Vector3::from(action.axis_angle());
        let (goal_p, goal_q) = match self.mode {
            ControlMode::Absolute => (motion, UnitQuaternion::from_scaled_axis(rotvec)),
            ControlMode::Delta => (
                self.position + motion,
                UnitQuaternion::from_scaled_axis(rotvec) * self.orientation,
            ),
        };
        let goal_p = self.workspace.clamp(&goal_p);

        let grip = action.gripper_command();
        if grip > 0.0 {
            self.finger = 0.0;
        } else if grip < 0.0 {
            self.finger = FINGER_OPEN;
        }

        let dt = self.params.model_timestep;
        let alpha_p = (self.params.kp_position * dt).min(1.0);
        let alpha_r = (self.params.kp_orientation * dt).min(1.0);
        let start_p = self.position;
        let start_q = self.orientation;
        for _ in 0..self.params.substeps() {
            self.position += (goal_p - self.position) * alpha_p;
            let rot_err = (goal_q * self.orientation.inverse()).scaled_axis();
            self.orientation = UnitQuaternion::from_scaled_axis(rot_err * alpha_r) * self.orientation;
        }

        let period = self.params.control_timestep;
        let dp = (self.position - start_p) / period;
        let dr = (self.orientation * start_q.inverse()).scaled_axis() / period;
        self.velocities = [dp.x, dp.y, dp.z, dr.x, dr.y, dr.z];
        Ok(StepOutcome::default())
    }

    fn eef_pose(&self) -> Pose {
        Pose::new(self.position, self.orientation)
    }

    fn joint_count(&self) -> usize {
        FLOATING_JOINTS
    }

    fn joint_positions(&self) -> Vec<f64> {
        let r = self.orientation.scaled_axis();
        vec![self.position.x, self.position.y, self.position.z, r.x, r.y, r.z]
    }

    fn joint_velocities(&self) -> Vec<f64> {
        self.velocities.to_vec()
    }

    fn set_joint_state(&mut self, positions: &[f64], velocities: &[f64]) -> Result<(), SimulatorError> {
        for values in [positions, velocities] {
            if values.len() != FLOATING_JOINTS {
                return Err(SimulatorError::DimensionMismatch {
                    expected: FLOATING_JOINTS,
                    actual: values.len(),
                });
            }
        }
        self.position = Vector3::new(positions[0], positions[1], positions[2]);
        self.orientation =
            UnitQuaternion::from_scaled_axis(Vector3::new(positions[3], positions[4], positions[5]));
        self.velocities.copy_from_slice(velocities);
        Ok(())
    }

    // Pose is stored directly; nothing is derived.
    fn forward(&mut self) {}

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
