//! Per-dataset camera viewpoint metadata.

use std::collections::BTreeMap;

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::errors::{ReplayError, Result};
use crate::pose::Pose;
use crate::transforms::euler_xyz_degrees_to_quat;

/// World position of the robot base in the default replay scene.
pub const DEFAULT_BASE_OFFSET: [f64; 3] = [-0.6, 0.0, 0.912];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ViewOrientation {
    /// Extrinsic x-y-z Euler angles in degrees.
    Euler { roll: f64, pitch: f64, yaw: f64 },
    /// Scalar-first `[w, x, y, z]`.
    Quaternion([f64; 4]),
}

impl ViewOrientation {
    pub fn to_quat(&self) -> Result<UnitQuaternion<f64>> {
        match self {
            ViewOrientation::Euler { roll, pitch, yaw } => {
                Ok(euler_xyz_degrees_to_quat(*roll, *pitch, *yaw))
            }
            ViewOrientation::Quaternion([w, x, y, z]) => {
                let q = Quaternion::new(*w, *x, *y, *z);
                if q.norm() < 1e-12 {
                    return Err(ReplayError::invalid_input("viewpoint quaternion has zero norm"));
                }
                Ok(UnitQuaternion::from_quaternion(q))
            }
        }
    }
}

/// Camera viewpoint with its position relative to the robot base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraViewpoint {
    pub position: [f64; 3],
    pub orientation: ViewOrientation,
    /// Vertical field of view in degrees.
    pub fov: f64,
}

impl CameraViewpoint {
    pub fn world_pose(&self, base_offset: &Vector3<f64>) -> Result<Pose> {
        Ok(Pose::new(
            Vector3::from(self.position) + base_offset,
            self.orientation.to_quat()?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewpointEntry {
    pub episodes: Vec<usize>,
    #[serde(flatten)]
    pub viewpoint: CameraViewpoint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetProfile {
    pub viewpoints: Vec<ViewpointEntry>,
    /// World-frame camera pose shared by every episode; the scene keeps its own FOV.
    pub fixed_pose: Option<Pose>,
}

impl DatasetProfile {
    pub fn fixed(pose: Pose) -> Self {
        Self {
            viewpoints: Vec::new(),
            fixed_pose: Some(pose),
        }
    }
}

/// `[x, y, z, qw, qx, qy, qz]` world pose of the agentview camera.
fn agentview(values: [f64; 7]) -> DatasetProfile {
    let [x, y, z, w, i, j, k] = values;
    DatasetProfile::fixed(Pose::new(
        Vector3::new(x, y, z),
        UnitQuaternion::from_quaternion(Quaternion::new(w, i, j, k)),
    ))
}

/// Fixed camera poses of the simulated robosuite task datasets.
pub fn builtin_profiles() -> BTreeMap<String, DatasetProfile> {
    let tabletop = [0.45, 0.0, 1.35, 0.653, 0.271, 0.271, 0.653];

    let mut profiles = BTreeMap::new();
    profiles.insert(
        "can".to_string(),
        agentview([0.9, 0.1, 1.75, 0.653, 0.271, 0.271, 0.653]),
    );
    for name in ["lift", "square", "stack"] {
        profiles.insert(name.to_string(), agentview(tabletop));
    }
    profiles.insert(
        "three_piece_assembly".to_string(),
        agentview([
            0.713078462147161,
            2.062036796036723e-08,
            1.5194726087166726,
            0.6432409286499023,
            0.293668270111084,
            0.2936684489250183,
            0.6432408690452576,
        ]),
    );
    profiles
}

/// A viewpoint ready to apply: world-frame pose plus an optional FOV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedView {
    pub pose: Pose,
    pub fov: Option<f64>,
}

impl DatasetProfile {
    pub fn resolve(
        &self,
        dataset: &str,
        episode: usize,
        base_offset: &Vector3<f64>,
    ) -> Result<ResolvedView> {
        if let Some(pose) = self.fixed_pose {
            return Ok(ResolvedView { pose, fov: None });
        }

        let entry = self
            .viewpoints
            .iter()
            .find(|v| v.episodes.contains(&episode))
            .ok_or_else(|| ReplayError::NoViewpoint {
                dataset: dataset.to_string(),
                episode,
            })?;

        Ok(ResolvedView {
            pose: entry.viewpoint.world_pose(base_offset)?,
            fov: Some(entry.viewpoint.fov),
        })
    }
}
