//! The physics-engine seam.
//!
//! Everything the core needs from a simulator goes through [`Simulator`]:
//! stepping, end-effector and joint state, direct state override, and the
//! scene cameras. Implementations own their engine state exclusively; the
//! core never shares a simulator between threads.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pose::Pose;

/// Length of an [`Action`] vector.
pub const ACTION_DIM: usize = 7;

/// Index of the gripper channel inside an [`Action`].
pub const GRIPPER_CHANNEL: usize = 6;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum SimulatorError {
    #[error("joint index {index} out of range for {count} joints")]
    JointIndex { index: usize, count: usize },

    #[error("expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unknown camera '{0}'")]
    UnknownCamera(String),

    #[error("engine fault: {0}")]
    Fault(String),
}

/// How the operational-space controller interprets the motion part of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    /// Position and axis-angle are absolute targets in the world frame.
    Absolute,
    /// Position and axis-angle are offsets from the current end-effector pose.
    Delta,
}

/// Opaque handle to a scene camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraId(pub usize);

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "camera#{}", self.0)
    }
}

/// `[px, py, pz, ax, ay, az, gripper]`.
///
/// The gripper channel is `-1` to open and `+1` to close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Action(pub [f64; ACTION_DIM]);

impl Action {
    pub fn zeros() -> Self {
        Action([0.0; ACTION_DIM])
    }

    /// Absolute target action: position followed by the axis-angle of the orientation.
    pub fn absolute_pose(target: &Pose) -> Self {
        let aa = target.axis_angle();
        Action([
            target.position.x,
            target.position.y,
            target.position.z,
            aa.x,
            aa.y,
            aa.z,
            0.0,
        ])
    }

    /// Zero motion with the gripper channel set. Meant for delta mode.
    pub fn gripper(open: bool) -> Self {
        let mut a = Self::zeros();
        a.0[GRIPPER_CHANNEL] = if open { -1.0 } else { 1.0 };
        a
    }

    pub fn position(&self) -> [f64; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    pub fn axis_angle(&self) -> [f64; 3] {
        [self.0[3], self.0[4], self.0[5]]
    }

    pub fn gripper_command(&self) -> f64 {
        self.0[GRIPPER_CHANNEL]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepOutcome {
    pub reward: f64,
    pub done: bool,
}

pub trait Simulator {
    /// Advance one control period with `action`.
    fn step(&mut self, action: &Action) -> Result<StepOutcome, SimulatorError>;

    /// Current end-effector site pose in the world frame.
    fn eef_pose(&self) -> Pose;

    fn joint_count(&self) -> usize;

    /// Actuated joint positions in the robot's joint enumeration order.
    fn joint_positions(&self) -> Vec<f64>;

    fn joint_velocities(&self) -> Vec<f64>;

    /// Overwrite joint positions and velocities without integrating physics.
    fn set_joint_state(&mut self, positions: &[f64], velocities: &[f64])
        -> Result<(), SimulatorError>;

    /// Recompute derived kinematic quantities from the current state.
    fn forward(&mut self);

    fn control_mode(&self) -> ControlMode;

    fn set_control_mode(&mut self, mode: ControlMode);

    fn camera_observations_enabled(&self) -> bool;

    fn set_camera_observations(&mut self, enabled: bool);

    fn camera_id(&self, name: &str) -> Result<CameraId, SimulatorError>;

    /// Live camera pose in the world frame.
    fn camera_pose(&self, id: CameraId) -> Result<Pose, SimulatorError>;

    /// Camera pose as authored in the scene description.
    fn camera_model_pose(&self, id: CameraId) -> Result<Pose, SimulatorError>;

    /// Place the camera at a world-frame pose.
    fn set_camera_pose(&mut self, id: CameraId, pose: &Pose) -> Result<(), SimulatorError>;

    /// Vertical field of view in degrees.
    fn camera_fovy(&self, id: CameraId) -> Result<f64, SimulatorError>;

    fn set_camera_fovy(&mut self, id: CameraId, fovy: f64) -> Result<(), SimulatorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{UnitQuaternion, Vector3};

    #[test]
    fn test_absolute_pose_action_layout() {
        let pose = Pose::new(
            Vector3::new(0.5, 0.0, 1.0),
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.25),
        );
        let a = Action::absolute_pose(&pose);
        assert_eq!(a.position(), [0.5, 0.0, 1.0]);
        assert!((a.axis_angle()[0] - 0.25).abs() < 1e-12);
        assert_eq!(a.axis_angle()[1], 0.0);
        assert_eq!(a.gripper_command(), 0.0);
    }

    #[test]
    fn test_gripper_action_sign() {
        assert_eq!(Action::gripper(true).gripper_command(), -1.0);
        assert_eq!(Action::gripper(false).gripper_command(), 1.0);
        assert_eq!(Action::gripper(true).position(), [0.0; 3]);
    }
}
