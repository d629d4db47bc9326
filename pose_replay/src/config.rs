use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::controller::TrackerConfig;
use crate::errors::{ReplayError, Result};
use crate::gripper::ConventionTable;
use crate::viewpoint::{builtin_profiles, DatasetProfile, ResolvedView, DEFAULT_BASE_OFFSET};

/// ```rust,ignore
/// let config = ReplayConfig::from_path("replay.json")?;
///
/// if let Err(e) = config.validate() {
///     println!("Configuration error: {}", e);
///     return;
/// }
///
/// let table = config.convention_table();
/// let open = table.canonical_open("viola", &GripperSignal::Scalar(0.08))?;
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReplayConfig {
    pub tracker: TrackerConfig,
    pub camera_name: String,
    /// World position of the robot base; dataset viewpoints are relative to it.
    pub base_offset: [f64; 3],
    /// How many times each source frame is teleported before its pose is read.
    pub teleport_repeats: usize,
    /// Entries merged over the builtin gripper conventions.
    pub conventions: ConventionTable,
    /// Viewpoint profiles merged over the builtin fixed-camera datasets.
    pub datasets: BTreeMap<String, DatasetProfile>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            camera_name: "agentview".to_string(),
            base_offset: DEFAULT_BASE_OFFSET,
            teleport_repeats: 5,
            conventions: ConventionTable::new(),
            datasets: BTreeMap::new(),
        }
    }
}

impl ReplayConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ReplayConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.tracker.validate()?;
        if self.camera_name.is_empty() {
            return Err(ReplayError::Config("Camera name cannot be empty.".to_string()));
        }
        if self.teleport_repeats == 0 {
            return Err(ReplayError::Config(
                "teleport_repeats must be greater than 0.".to_string(),
            ));
        }
        if self.base_offset.iter().any(|v| !v.is_finite()) {
            return Err(ReplayError::Config("base_offset must be finite.".to_string()));
        }
        Ok(())
    }

    pub fn base_offset(&self) -> Vector3<f64> {
        Vector3::from(self.base_offset)
    }

    /// Builtin conventions with this config's overrides applied.
    pub fn convention_table(&self) -> ConventionTable {
        let mut table = ConventionTable::builtin();
        table.extend(&self.conventions);
        table
    }

    /// Builtin viewpoint profiles with this config's datasets applied.
    pub fn dataset_profiles(&self) -> BTreeMap<String, DatasetProfile> {
        let mut profiles = builtin_profiles();
        profiles.extend(self.datasets.iter().map(|(k, v)| (k.clone(), v.clone())));
        profiles
    }

    pub fn resolve_view(&self, dataset: &str, episode: usize) -> Result<ResolvedView> {
        let profile = match self.datasets.get(dataset) {
            Some(profile) => profile.clone(),
            None => builtin_profiles()
                .remove(dataset)
                .ok_or_else(|| ReplayError::NoViewpoint {
                    dataset: dataset.to_string(),
                    episode,
                })?,
        };
        profile.resolve(dataset, episode, &self.base_offset())
    }
}
