//! End-effector and camera poses.
//!
//! A [`Pose`] is stored as a translation plus a unit quaternion. Its flat
//! form is the 7-element array `[x, y, z, qw, qx, qy, qz]` (scalar-first),
//! which is also its serialized form.

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::errors::{ReplayError, Result};

/// Number of scalars in the flat pose representation.
pub const POSE_DIM: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<f64>", try_from = "Vec<f64>")]
pub struct Pose {
    /// Position in meters.
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Pose {
    pub fn new(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }

    /// Build a pose from `[x, y, z, qw, qx, qy, qz]`.
    ///
    /// The quaternion part is normalized. Anything that is not exactly seven
    /// finite values, or a zero quaternion, is rejected.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        if values.len() != POSE_DIM {
            return Err(ReplayError::invalid_input(format!(
                "pose must have {} elements, got {}",
                POSE_DIM,
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ReplayError::invalid_input("pose contains non-finite values"));
        }

        let quat = Quaternion::new(values[3], values[4], values[5], values[6]);
        if quat.norm() < 1e-12 {
            return Err(ReplayError::invalid_input("pose quaternion has zero norm"));
        }

        Ok(Self::new(
            Vector3::new(values[0], values[1], values[2]),
            UnitQuaternion::from_quaternion(quat),
        ))
    }

    pub fn to_array(&self) -> [f64; POSE_DIM] {
        let q = self.orientation.quaternion();
        [
            self.position.x,
            self.position.y,
            self.position.z,
            q.w,
            q.i,
            q.j,
            q.k,
        ]
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Self::new(iso.translation.vector, iso.rotation)
    }

    /// Orientation as a rotation vector (axis scaled by angle, radians).
    pub fn axis_angle(&self) -> Vector3<f64> {
        self.orientation.scaled_axis()
    }

    /// Elementwise `self - achieved` over the flat representation.
    ///
    /// Reported as a diagnostic when tracking stops short of a target.
    pub fn shortfall(&self, achieved: &Pose) -> [f64; POSE_DIM] {
        let target = self.to_array();
        let reached = achieved.to_array();
        let mut out = [0.0; POSE_DIM];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = target[i] - reached[i];
        }
        out
    }

    pub fn translated(&self, offset: &Vector3<f64>) -> Self {
        Self::new(self.position + offset, self.orientation)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Pose> for Vec<f64> {
    fn from(pose: Pose) -> Self {
        pose.to_array().to_vec()
    }
}

impl TryFrom<Vec<f64>> for Pose {
    type Error = ReplayError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Pose::from_slice(&values)
    }
}

impl From<Isometry3<f64>> for Pose {
    fn from(iso: Isometry3<f64>) -> Self {
        Pose::from_isometry(&iso)
    }
}

impl From<Pose> for Isometry3<f64> {
    fn from(pose: Pose) -> Self {
        pose.to_isometry()
    }
}

/// Relative weighting of the position and orientation terms of [`pose_error`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseErrorWeights {
    pub position: f64,
    pub orientation: f64,
}

impl Default for PoseErrorWeights {
    fn default() -> Self {
        Self {
            position: 1.0,
            orientation: 0.1,
        }
    }
}

/// Minimal rotation angle between two orientations, in radians.
///
/// `q` and `-q` describe the same rotation, so the absolute value of the dot
/// product is used before taking `acos`.
pub fn quat_distance(q1: &UnitQuaternion<f64>, q2: &UnitQuaternion<f64>) -> f64 {
    let dot = q1.coords.dot(&q2.coords).abs().clamp(-1.0, 1.0);
    2.0 * dot.acos()
}

/// Weighted sum of Euclidean position distance and rotation angle.
pub fn pose_error(current: &Pose, target: &Pose, weights: &PoseErrorWeights) -> f64 {
    let pos_err = (current.position - target.position).norm();
    let ori_err = quat_distance(&current.orientation, &target.orientation);
    weights.position * pos_err + weights.orientation * ori_err
}
