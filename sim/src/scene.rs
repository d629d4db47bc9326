//! Scene cameras shared by the simulated robots.
//!
//! Each camera is attached to a parent body. The scene description authors
//! the camera relative to that body, so the live world pose is
//! `parent · local` and moving the camera in the world rewrites `local`.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use pose_replay::{CameraId, Pose, SimulatorError};

#[derive(Debug, Clone)]
pub struct SceneCamera {
    pub name: String,
    /// World pose of the body the camera is mounted on.
    pub parent: Isometry3<f64>,
    /// Pose relative to the parent as written in the scene description.
    pub authored: Isometry3<f64>,
    /// Current pose relative to the parent.
    pub local: Isometry3<f64>,
    /// Vertical field of view, degrees.
    pub fovy: f64,
}

impl SceneCamera {
    pub fn new(name: impl Into<String>, parent: Isometry3<f64>, authored: Isometry3<f64>, fovy: f64) -> Self {
        Self {
            name: name.into(),
            parent,
            authored,
            local: authored,
            fovy,
        }
    }

    pub fn world_pose(&self) -> Isometry3<f64> {
        self.parent * self.local
    }
}

#[derive(Debug, Clone, Default)]
pub struct CameraSet {
    cameras: Vec<SceneCamera>,
}

impl CameraSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tabletop scene: `agentview` in the world, `robotview` on the robot base.
    pub fn tabletop(base: Isometry3<f64>) -> Self {
        let mut set = Self::new();
        set.add(SceneCamera::new(
            "agentview",
            Isometry3::identity(),
            Isometry3::from_parts(
                Translation3::new(0.5, 0.0, 1.35),
                UnitQuaternion::from_euler_angles(0.0, 0.9, 0.0),
            ),
            45.0,
        ));
        set.add(SceneCamera::new(
            "robotview",
            base,
            Isometry3::from_parts(
                Translation3::new(1.0, 0.0, 0.6),
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::PI),
            ),
            60.0,
        ));
        set
    }

    pub fn add(&mut self, camera: SceneCamera) -> CameraId {
        self.cameras.push(camera);
        CameraId(self.cameras.len() - 1)
    }

    pub fn id(&self, name: &str) -> Result<CameraId, SimulatorError> {
        self.cameras
            .iter()
            .position(|c| c.name == name)
            .map(CameraId)
            .ok_or_else(|| SimulatorError::UnknownCamera(name.to_string()))
    }

    pub fn get(&self, id: CameraId) -> Result<&SceneCamera, SimulatorError> {
        self.cameras
            .get(id.0)
            .ok_or_else(|| SimulatorError::UnknownCamera(id.to_string()))
    }

    fn get_mut(&mut self, id: CameraId) -> Result<&mut SceneCamera, SimulatorError> {
        self.cameras
            .get_mut(id.0)
            .ok_or_else(|| SimulatorError::UnknownCamera(id.to_string()))
    }

    pub fn pose(&self, id: CameraId) -> Result<Pose, SimulatorError> {
        Ok(Pose::from_isometry(&self.get(id)?.world_pose()))
    }

    pub fn model_pose(&self, id: CameraId) -> Result<Pose, SimulatorError> {
        Ok(Pose::from_isometry(&self.get(id)?.authored))
    }

    pub fn set_pose(&mut self, id: CameraId, pose: &Pose) -> Result<(), SimulatorError> {
        let camera = self.get_mut(id)?;
        camera.local = camera.parent.inverse() * pose.to_isometry();
        Ok(())
    }

    pub fn fovy(&self, id: CameraId) -> Result<f64, SimulatorError> {
        Ok(self.get(id)?.fovy)
    }

    pub fn set_fovy(&mut self, id: CameraId, fovy: f64) -> Result<(), SimulatorError> {
        self.get_mut(id)?.fovy = fovy;
        Ok(())
    }
}
