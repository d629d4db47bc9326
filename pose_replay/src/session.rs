//! Replay session state.
//!
//! One [`ReplaySession`] owns one simulator instance together with the
//! state that used to be global: the attached camera and the cached
//! "last known good" joint configuration.

use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, info};

use crate::camera::{CameraPlacement, CameraRig};
use crate::controller::{track, TrackerConfig, TrackingLimits, TrackingOutcome};
use crate::errors::{ReplayError, Result};
use crate::pose::Pose;
use crate::simulator::{Action, ControlMode, Simulator};
use crate::viewpoint::ResolvedView;

pub struct ReplaySession<S: Simulator> {
    sim: S,
    config: TrackerConfig,
    camera: Option<CameraRig>,
    safe_joints: Option<Vec<f64>>,
}

impl<S: Simulator> ReplaySession<S> {
    pub fn new(sim: S, config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sim,
            config,
            camera: None,
            safe_joints: None,
        })
    }

    /// Create a session and attach the named camera in one go.
    pub fn with_camera(sim: S, config: TrackerConfig, camera_name: &str) -> Result<Self> {
        let mut session = Self::new(sim, config)?;
        session.attach_camera(camera_name)?;
        Ok(session)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn simulator(&self) -> &S {
        &self.sim
    }

    pub fn simulator_mut(&mut self) -> &mut S {
        &mut self.sim
    }

    pub fn into_simulator(self) -> S {
        self.sim
    }

    pub fn eef_pose(&self) -> Pose {
        self.sim.eef_pose()
    }

    // ========== Pose tracking ==========

    /// Drive to a raw `[x, y, z, qw, qx, qy, qz]` target with the session limits.
    pub fn drive_to_pose(&mut self, target: &[f64]) -> Result<TrackingOutcome> {
        let limits = self.config.limits;
        self.drive_to_pose_with(target, &limits)
    }

    pub fn drive_to_pose_with(
        &mut self,
        target: &[f64],
        limits: &TrackingLimits,
    ) -> Result<TrackingOutcome> {
        // Absolute mode is set before validating, matching the controller contract.
        self.sim.set_control_mode(ControlMode::Absolute);
        let target = Pose::from_slice(target)?;
        self.drive_to_with(&target, limits)
    }

    pub fn drive_to(&mut self, target: &Pose) -> Result<TrackingOutcome> {
        let limits = self.config.limits;
        self.drive_to_with(target, &limits)
    }

    pub fn drive_to_with(&mut self, target: &Pose, limits: &TrackingLimits) -> Result<TrackingOutcome> {
        limits.validate()?;
        let safe = &mut self.safe_joints;
        track(&mut self.sim, target, &self.config, limits, |joints| {
            *safe = Some(joints.to_vec());
        })
    }

    /// Write joint positions directly, zero the velocities, and resolve kinematics.
    ///
    /// No physics is integrated, so the result may violate contact constraints.
    pub fn teleport_to_joint_configuration(&mut self, joint_angles: &[f64]) -> Result<()> {
        let count = self.sim.joint_count();
        if joint_angles.len() != count {
            return Err(ReplayError::invalid_input(format!(
                "expected {} joint angles, got {}",
                count,
                joint_angles.len()
            )));
        }
        let velocities = vec![0.0; count];
        self.sim.set_joint_state(joint_angles, &velocities)?;
        self.sim.forward();
        Ok(())
    }

    /// Joint configuration cached by the most recent tracking iteration.
    pub fn safe_joint_configuration(&self) -> Option<&[f64]> {
        self.safe_joints.as_deref()
    }

    /// Teleport back to the cached safe configuration.
    pub fn recover_to_safe_pose(&mut self) -> Result<()> {
        let joints = self.safe_joints.clone().ok_or(ReplayError::NoSafePose)?;
        debug!("Recovering to safe joint configuration {:?}", joints);
        self.teleport_to_joint_configuration(&joints)
    }

    /// Open or close the gripper with one delta-mode step.
    pub fn actuate_gripper(&mut self, open: bool) -> Result<()> {
        self.sim.set_control_mode(ControlMode::Delta);
        self.sim.step(&Action::gripper(open))?;
        Ok(())
    }

    // ========== Camera ==========

    pub fn attach_camera(&mut self, name: &str) -> Result<&CameraRig> {
        let rig = CameraRig::initialize(&self.sim, name)?;
        info!("Attached camera '{}' to replay session", name);
        let rig = self.camera.insert(rig);
        Ok(&*rig)
    }

    pub fn camera(&self) -> Option<&CameraRig> {
        self.camera.as_ref()
    }

    fn require_camera(&self) -> Result<CameraRig> {
        self.camera
            .clone()
            .ok_or_else(|| ReplayError::invalid_input("no camera attached to the session"))
    }

    pub fn set_camera_pose(
        &mut self,
        position: &Vector3<f64>,
        orientation: &UnitQuaternion<f64>,
        offset: &Vector3<f64>,
    ) -> Result<CameraPlacement> {
        let rig = self.require_camera()?;
        rig.set_pose(&mut self.sim, position, orientation, offset)
    }

    pub fn camera_pose_world_frame(&self) -> Result<Pose> {
        self.require_camera()?.pose_world_frame(&self.sim)
    }

    pub fn camera_pose_file_frame(&self, world_pose: &Pose) -> Result<Pose> {
        Ok(self.require_camera()?.pose_file_frame(world_pose))
    }

    /// `<camera>` tag for `world_pose`, see [`CameraRig::scene_tag`].
    pub fn camera_scene_tag(&self, world_pose: &Pose) -> Result<String> {
        Ok(self.require_camera()?.scene_tag(world_pose))
    }

    pub fn set_camera_field_of_view(&mut self, degrees: f64) -> Result<()> {
        let rig = self.require_camera()?;
        rig.set_field_of_view(&mut self.sim, degrees)
    }

    pub fn apply_view(&mut self, view: &ResolvedView) -> Result<CameraPlacement> {
        let rig = self.require_camera()?;
        rig.apply_view(&mut self.sim, view)
    }
}
