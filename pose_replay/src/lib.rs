//! Pose tracking and camera frame reconciliation for cross-robot dataset replay.
//!
//! A recorded source episode (joint angles plus gripper readings) is
//! teleported through on a simulated source robot to recover end-effector
//! poses; a target robot is then driven to each pose by closed-loop
//! tracking on its operational-space controller, under a camera viewpoint
//! reproduced from dataset metadata.
//!
//! # Architecture
//!
//! - [`simulator`] - the seam to the physics engine ([`Simulator`])
//! - [`controller`] - the pose-tracking loop
//! - [`camera`] - world/file frame reconciliation for scene cameras
//! - [`gripper`] - dataset gripper conventions as a lookup table
//! - [`session`] - per-simulator state: camera, cached safe joints
//! - [`replay`] - episode drivers built on the above
//!
//! # Usage
//!
//! ```rust,ignore
//! use pose_replay::{ReplaySession, TrackerConfig};
//!
//! let mut session = ReplaySession::with_camera(sim, TrackerConfig::default(), "agentview")?;
//! let outcome = session.drive_to_pose(&[0.5, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0])?;
//! if !outcome.success {
//!     session.recover_to_safe_pose()?;
//! }
//! ```

pub mod camera;
pub mod config;
pub mod controller;
pub mod errors;
pub mod gripper;
pub mod pose;
pub mod replay;
pub mod session;
pub mod simulator;
pub mod transforms;
pub mod viewpoint;

pub use camera::{CameraPlacement, CameraRig};
pub use config::ReplayConfig;
pub use controller::{
    track, StagnationMonitor, TrackerConfig, TrackingExit, TrackingLimits, TrackingOutcome,
};
pub use errors::*;
pub use gripper::{
    ApertureRange, Comparison, ConventionTable, GripperConvention, GripperSignal, TargetRobot,
};
pub use pose::{pose_error, quat_distance, Pose, PoseErrorWeights, POSE_DIM};
pub use replay::{
    partition_episodes, EpisodeRecord, FrameReport, SourceReplay, TargetReplay, TargetReport,
};
pub use session::ReplaySession;
pub use simulator::{Action, CameraId, ControlMode, Simulator, SimulatorError, StepOutcome};
pub use viewpoint::{CameraViewpoint, DatasetProfile, ResolvedView, ViewOrientation, ViewpointEntry};
