//! Closed-loop pose tracking on top of an operational-space controller.
//!
//! No inverse kinematics is involved: every iteration sends the absolute
//! target to the simulator's controller, steps physics, and measures the
//! remaining [`pose_error`]. The loop ends when the error drops under the
//! tight threshold, when the iteration budget runs out, or (if configured)
//! when the error has stopped moving for too long.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{ReplayError, Result};
use crate::pose::{pose_error, Pose, PoseErrorWeights, POSE_DIM};
use crate::simulator::{Action, ControlMode, Simulator};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingLimits {
    /// Error under which the loop stops early and reports success.
    pub min_error_threshold: f64,
    /// Error under which an exhausted budget still counts as success.
    pub max_error_threshold: f64,
    pub max_iterations: usize,
}

impl Default for TrackingLimits {
    fn default() -> Self {
        Self {
            min_error_threshold: 0.003,
            max_error_threshold: 0.01,
            max_iterations: 100,
        }
    }
}

impl TrackingLimits {
    pub fn validate(&self) -> Result<()> {
        if self.min_error_threshold <= 0.0 {
            return Err(ReplayError::Config(
                "min_error_threshold must be greater than 0.".to_string(),
            ));
        }
        if self.max_error_threshold < self.min_error_threshold {
            return Err(ReplayError::Config(
                "max_error_threshold cannot be below min_error_threshold.".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(ReplayError::Config(
                "max_iterations must be greater than 0.".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub limits: TrackingLimits,
    pub weights: PoseErrorWeights,
    /// Error change below which an iteration counts as stagnant.
    pub stagnation_tolerance: f64,
    /// Stop with failure after this many consecutive stagnant iterations.
    /// `None` keeps stagnation purely diagnostic.
    pub stagnation_limit: Option<usize>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            limits: TrackingLimits::default(),
            weights: PoseErrorWeights::default(),
            stagnation_tolerance: 1e-5,
            stagnation_limit: None,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;
        if self.stagnation_tolerance < 0.0 {
            return Err(ReplayError::Config(
                "stagnation_tolerance cannot be negative.".to_string(),
            ));
        }
        if self.stagnation_limit == Some(0) {
            return Err(ReplayError::Config(
                "stagnation_limit must be greater than 0 when set.".to_string(),
            ));
        }
        if self.weights.position < 0.0 || self.weights.orientation < 0.0 {
            return Err(ReplayError::Config("error weights cannot be negative.".to_string()));
        }
        Ok(())
    }
}

/// Counts consecutive iterations whose error barely changed.
#[derive(Debug, Clone)]
pub struct StagnationMonitor {
    tolerance: f64,
    streak: usize,
    longest: usize,
}

impl StagnationMonitor {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            streak: 0,
            longest: 0,
        }
    }

    /// Record one iteration and return the current streak.
    pub fn observe(&mut self, previous: f64, current: f64) -> usize {
        if (current - previous).abs() < self.tolerance {
            self.streak += 1;
            self.longest = self.longest.max(self.streak);
        } else {
            self.streak = 0;
        }
        self.streak
    }

    pub fn streak(&self) -> usize {
        self.streak
    }

    pub fn longest(&self) -> usize {
        self.longest
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingExit {
    Converged,
    BudgetExhausted,
    Stagnated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingOutcome {
    pub success: bool,
    pub achieved: Pose,
    pub final_error: f64,
    pub iterations: usize,
    pub longest_stagnation: usize,
    pub exit: TrackingExit,
    /// `target - achieved`, present only on failure.
    pub shortfall: Option<[f64; POSE_DIM]>,
}

impl TrackingOutcome {
    /// Turn a soft failure into [`ReplayError::PoseUnreachable`].
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        Err(ReplayError::PoseUnreachable {
            error: self.final_error,
            shortfall: self.shortfall.unwrap_or([0.0; POSE_DIM]),
        })
    }
}

/// Drive the end effector toward `target`.
///
/// The simulator is switched to absolute mode first. `on_iteration` sees
/// the joint configuration after every physics step, which is how callers
/// keep a "last known good" fallback. Camera observations are re-enabled
/// once the loop is done, whatever the outcome.
pub fn track<S, F>(
    sim: &mut S,
    target: &Pose,
    config: &TrackerConfig,
    limits: &TrackingLimits,
    mut on_iteration: F,
) -> Result<TrackingOutcome>
where
    S: Simulator + ?Sized,
    F: FnMut(&[f64]),
{
    sim.set_control_mode(ControlMode::Absolute);

    let action = Action::absolute_pose(target);
    let mut error = pose_error(&sim.eef_pose(), target, &config.weights);
    let mut monitor = StagnationMonitor::new(config.stagnation_tolerance);
    let mut iterations = 0;
    let mut stagnated = false;

    while error > limits.min_error_threshold && iterations < limits.max_iterations {
        if let Err(e) = sim.step(&action) {
            sim.set_camera_observations(true);
            return Err(e.into());
        }

        let joints = sim.joint_positions();
        on_iteration(&joints);

        let new_error = pose_error(&sim.eef_pose(), target, &config.weights);
        let streak = monitor.observe(error, new_error);
        error = new_error;
        iterations += 1;

        if let Some(limit) = config.stagnation_limit {
            if streak >= limit && error > limits.min_error_threshold {
                stagnated = true;
                break;
            }
        }
    }

    let achieved = sim.eef_pose();
    sim.set_camera_observations(true);

    let exit = if stagnated {
        TrackingExit::Stagnated
    } else if error <= limits.min_error_threshold {
        TrackingExit::Converged
    } else {
        TrackingExit::BudgetExhausted
    };

    let success = match exit {
        TrackingExit::Converged => true,
        TrackingExit::BudgetExhausted => error < limits.max_error_threshold,
        TrackingExit::Stagnated => false,
    };

    debug!(
        "tracking finished after {} iterations: error={:.6} exit={:?} stagnation={}",
        iterations,
        error,
        exit,
        monitor.longest()
    );

    let shortfall = if success {
        None
    } else {
        let s = target.shortfall(&achieved);
        warn!("Failed to drive robot to target pose (error {:.6}), shortfall: {:?}", error, s);
        Some(s)
    };

    Ok(TrackingOutcome {
        success,
        achieved,
        final_error: error,
        iterations,
        longest_stagnation: monitor.longest(),
        exit,
        shortfall,
    })
}
