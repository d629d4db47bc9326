//! Episode replay drivers.
//!
//! [`SourceReplay`] teleports the source robot through a recorded joint
//! trajectory and collects the end-effector poses and canonical gripper
//! flags. [`TargetReplay`] then drives another robot through those poses
//! with the pose-tracking controller.

use std::fs;
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::controller::{TrackingExit, TrackingLimits};
use crate::errors::{ReplayError, Result};
use crate::gripper::{ConventionTable, GripperSignal};
use crate::pose::Pose;
use crate::session::ReplaySession;
use crate::simulator::Simulator;

/// Per-frame source-robot states for one episode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub eef_poses: Vec<Pose>,
    pub gripper_open: Vec<bool>,
}

impl EpisodeRecord {
    pub fn len(&self) -> usize {
        self.eef_poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eef_poses.is_empty()
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn read_json(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let record: EpisodeRecord = serde_json::from_str(&text)?;
        if record.eef_poses.len() != record.gripper_open.len() {
            return Err(ReplayError::invalid_input(format!(
                "episode record has {} poses but {} gripper flags",
                record.eef_poses.len(),
                record.gripper_open.len()
            )));
        }
        Ok(record)
    }
}

#[derive(Debug, Clone)]
pub struct SourceReplay {
    pub dataset: String,
    pub teleport_repeats: usize,
}

impl SourceReplay {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            teleport_repeats: 5,
        }
    }

    pub fn with_teleport_repeats(mut self, repeats: usize) -> Self {
        self.teleport_repeats = repeats.max(1);
        self
    }

    pub fn run<S: Simulator>(
        &self,
        session: &mut ReplaySession<S>,
        conventions: &ConventionTable,
        joints: &[Vec<f64>],
        gripper: &[GripperSignal],
    ) -> Result<EpisodeRecord> {
        if joints.len() != gripper.len() {
            return Err(ReplayError::invalid_input(format!(
                "{} joint frames but {} gripper frames",
                joints.len(),
                gripper.len()
            )));
        }
        // Fail before touching the simulator if the dataset has no convention.
        conventions.lookup(&self.dataset)?;

        let mut record = EpisodeRecord {
            eef_poses: Vec::with_capacity(joints.len()),
            gripper_open: Vec::with_capacity(joints.len()),
        };

        for (frame, (q, signal)) in joints.iter().zip(gripper).enumerate() {
            let open = conventions.canonical_open(&self.dataset, signal)?;
            for _ in 0..self.teleport_repeats {
                session.teleport_to_joint_configuration(q)?;
            }
            let pose = session.eef_pose();
            debug!("source frame {}: open={} pose={:?}", frame, open, pose.to_array());
            record.eef_poses.push(pose);
            record.gripper_open.push(open);
        }

        info!(
            "Recorded {} source frames for dataset '{}'",
            record.len(),
            self.dataset
        );
        Ok(record)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame: usize,
    pub success: bool,
    pub final_error: f64,
    pub iterations: usize,
    pub exit: TrackingExit,
    pub achieved: Pose,
    pub recovered: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetReport {
    pub frames: Vec<FrameReport>,
}

impl TargetReport {
    pub fn success_count(&self) -> usize {
        self.frames.iter().filter(|f| f.success).count()
    }

    pub fn success_rate(&self) -> f64 {
        if self.frames.is_empty() {
            return 0.0;
        }
        self.success_count() as f64 / self.frames.len() as f64
    }
}

#[derive(Debug, Clone)]
pub struct TargetReplay {
    pub limits: TrackingLimits,
    /// Teleport back to the last safe joints after a failed frame.
    pub recover_on_failure: bool,
}

impl Default for TargetReplay {
    fn default() -> Self {
        Self {
            limits: TrackingLimits::default(),
            recover_on_failure: true,
        }
    }
}

impl TargetReplay {
    pub fn run<S: Simulator>(
        &self,
        session: &mut ReplaySession<S>,
        record: &EpisodeRecord,
    ) -> Result<TargetReport> {
        if record.eef_poses.len() != record.gripper_open.len() {
            return Err(ReplayError::invalid_input(format!(
                "episode record has {} poses but {} gripper flags",
                record.eef_poses.len(),
                record.gripper_open.len()
            )));
        }

        let mut report = TargetReport::default();
        for (frame, (target, open)) in record
            .eef_poses
            .iter()
            .zip(&record.gripper_open)
            .enumerate()
        {
            let outcome = session.drive_to_with(target, &self.limits)?;
            session.actuate_gripper(*open)?;

            let mut recovered = false;
            if !outcome.success && self.recover_on_failure {
                match session.recover_to_safe_pose() {
                    Ok(()) => recovered = true,
                    Err(ReplayError::NoSafePose) => {
                        warn!("Frame {}: no safe pose to recover to", frame)
                    }
                    Err(e) => return Err(e),
                }
            }

            report.frames.push(FrameReport {
                frame,
                success: outcome.success,
                final_error: outcome.final_error,
                iterations: outcome.iterations,
                exit: outcome.exit,
                achieved: outcome.achieved,
                recovered,
            });
        }

        info!(
            "Target replay: {}/{} frames reached",
            report.success_count(),
            report.frames.len()
        );
        Ok(report)
    }
}

/// Contiguous slice of episodes handled by one worker process.
pub fn partition_episodes(num_episodes: usize, partition: usize, num_parts: usize) -> Range<usize> {
    if num_parts == 0 || partition >= num_parts {
        return 0..0;
    }
    let start = num_episodes * partition / num_parts;
    let end = num_episodes * (partition + 1) / num_parts;
    start..end
}
