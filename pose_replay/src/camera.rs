//! Camera frame reconciliation.
//!
//! Scene cameras are authored relative to their parent body ("file frame"),
//! while dataset viewpoints and the robot base live in the world frame.
//! [`CameraRig`] records, once at initialization, the transform
//!
//! ```text
//! world_in_file = T_file * inverse(T_world)
//! ```
//!
//! between the authored and live camera poses, so any world pose can later
//! be rewritten in file-frame terms for reuse in a scene description.

use nalgebra::{Isometry3, Matrix4, Translation3, UnitQuaternion, Vector3};
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{ReplayError, Result};
use crate::pose::{pose_error, Pose, PoseErrorWeights};
use crate::simulator::{CameraId, Simulator};
use crate::transforms::{make_pose, pose_inv, quat_to_euler_xyz_degrees, rotation_matrix_to_quat};
use crate::viewpoint::ResolvedView;

fn homogeneous(pose: &Pose) -> Matrix4<f64> {
    make_pose(&pose.position, pose.orientation.to_rotation_matrix().matrix())
}

fn isometry_from_homogeneous(t: &Matrix4<f64>) -> Isometry3<f64> {
    let rotation = rotation_matrix_to_quat(&t.fixed_view::<3, 3>(0, 0).into_owned());
    Isometry3::from_parts(Translation3::new(t[(0, 3)], t[(1, 3)], t[(2, 3)]), rotation)
}

/// Outcome of a single-shot camera placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraPlacement {
    pub requested: Pose,
    pub achieved: Pose,
    pub error: f64,
}

#[derive(Debug, Clone)]
pub struct CameraRig {
    id: CameraId,
    name: String,
    world_in_file: Isometry3<f64>,
}

impl CameraRig {
    /// Bind to the named camera and capture the world-to-file transform
    /// from its pose at scene load.
    pub fn initialize<S: Simulator + ?Sized>(sim: &S, name: &str) -> Result<Self> {
        let id = sim.camera_id(name)?;
        let file_pose = homogeneous(&sim.camera_model_pose(id)?);
        let world_pose = homogeneous(&sim.camera_pose(id)?);
        let world_in_file = isometry_from_homogeneous(&(file_pose * pose_inv(&world_pose)));

        info!(
            "Camera '{}' ({}) initialized, world_in_file translation {:?}",
            name, id, world_in_file.translation.vector
        );

        Ok(Self {
            id,
            name: name.to_string(),
            world_in_file,
        })
    }

    pub fn id(&self) -> CameraId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn world_in_file(&self) -> &Isometry3<f64> {
        &self.world_in_file
    }

    pub fn world_in_file_matrix(&self) -> Matrix4<f64> {
        self.world_in_file.to_homogeneous()
    }

    /// Move the camera to `position + offset` (world frame) with `orientation`.
    ///
    /// There is no retry: the resulting error is only reported.
    pub fn set_pose<S: Simulator + ?Sized>(
        &self,
        sim: &mut S,
        position: &Vector3<f64>,
        orientation: &UnitQuaternion<f64>,
        offset: &Vector3<f64>,
    ) -> Result<CameraPlacement> {
        let requested = Pose::new(position + offset, *orientation);
        sim.set_camera_pose(self.id, &requested)?;

        let achieved = self.pose_world_frame(sim)?;
        let error = pose_error(&achieved, &requested, &PoseErrorWeights::default());
        let (roll, pitch, yaw) = quat_to_euler_xyz_degrees(&achieved.orientation);
        debug!(
            "Camera '{}' placed at {:?} rpy ({:.2}, {:.2}, {:.2}) with residual error {:.6}",
            self.name, achieved.position, roll, pitch, yaw, error
        );

        Ok(CameraPlacement {
            requested,
            achieved,
            error,
        })
    }

    pub fn pose_world_frame<S: Simulator + ?Sized>(&self, sim: &S) -> Result<Pose> {
        Ok(sim.camera_pose(self.id)?)
    }

    /// Express a world-frame camera pose in the authored (file) frame.
    pub fn pose_file_frame(&self, world_pose: &Pose) -> Pose {
        Pose::from_isometry(&(self.world_in_file * world_pose.to_isometry()))
    }

    /// `<camera>` element for a world pose, in file-frame terms, ready to
    /// paste back into the scene description. The quaternion is `w x y z`.
    pub fn scene_tag(&self, world_pose: &Pose) -> String {
        let file = self.pose_file_frame(world_pose).to_array();
        format!(
            r#"<camera name="{}" pos="{} {} {}" quat="{} {} {} {}"/>"#,
            self.name, file[0], file[1], file[2], file[3], file[4], file[5], file[6]
        )
    }

    /// Inverse of [`CameraRig::pose_file_frame`].
    pub fn pose_from_file_frame(&self, file_pose: &Pose) -> Pose {
        Pose::from_isometry(&(self.world_in_file.inverse() * file_pose.to_isometry()))
    }

    pub fn field_of_view<S: Simulator + ?Sized>(&self, sim: &S) -> Result<f64> {
        Ok(sim.camera_fovy(self.id)?)
    }

    /// Set the vertical field of view in degrees.
    pub fn set_field_of_view<S: Simulator + ?Sized>(&self, sim: &mut S, degrees: f64) -> Result<()> {
        if !degrees.is_finite() || degrees <= 0.0 || degrees >= 180.0 {
            return Err(ReplayError::invalid_input(format!(
                "field of view must be in (0, 180) degrees, got {}",
                degrees
            )));
        }
        sim.set_camera_fovy(self.id, degrees)?;
        Ok(())
    }

    /// Place the camera at a resolved dataset viewpoint.
    pub fn apply_view<S: Simulator + ?Sized>(
        &self,
        sim: &mut S,
        view: &ResolvedView,
    ) -> Result<CameraPlacement> {
        if let Some(fov) = view.fov {
            self.set_field_of_view(sim, fov)?;
        }
        self.set_pose(
            sim,
            &view.pose.position,
            &view.pose.orientation,
            &Vector3::zeros(),
        )
    }
}
