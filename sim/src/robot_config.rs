/// Robot configuration module for the simulated arms
///
/// Link geometry for the FANUC CRX series in the Modified Denavit-Hartenberg
/// (DHm) convention from "Geometric Approach for Inverse Kinematics of the
/// FANUC CRX Collaborative Robot" by Manel Abbes and Gérard Poisson
/// (Robotics 2024, 13, 91), converted to meters so poses line up with the
/// replay scene.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RobotModel {
    Crx10iA,
    Crx30iA,
}

/// Arm configuration with DHm parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmConfig {
    pub model: RobotModel,

    /// Maximum reach in m
    pub max_reach: f64,

    // Link lengths (a_{i-1} parameters)
    pub a3: f64, // upper arm

    // Link offsets (r_i parameters)
    pub r4: f64, // forearm
    pub r5: f64, // wrist
    pub r6: f64, // flange

    // Link twist angles (α_{i-1} parameters) in radians
    pub alpha2: f64, // α1 = -90°
    pub alpha3: f64, // α2 = +180°
    pub alpha4: f64, // α3 = -90°
    pub alpha5: f64, // α4 = +90°
    pub alpha6: f64, // α5 = -90°

    /// Per-joint speed limit in rad/s
    pub max_joint_velocity: f64,
}

impl ArmConfig {
    /// CRX-10iA: upper arm 0.54, forearm -0.54, wrist 0.15, flange -0.16
    pub fn crx_10ia() -> Self {
        Self {
            model: RobotModel::Crx10iA,
            max_reach: 1.070,
            a3: 0.540,
            r4: -0.540,
            r5: 0.150,
            r6: -0.160,
            alpha2: -90.0_f64.to_radians(),
            alpha3: 180.0_f64.to_radians(),
            alpha4: -90.0_f64.to_radians(),
            alpha5: 90.0_f64.to_radians(),
            alpha6: -90.0_f64.to_radians(),
            max_joint_velocity: 2.0,
        }
    }

    /// CRX-30iA, scaled from the 10iA by the reach ratio 1756 / 1070
    pub fn crx_30ia() -> Self {
        const SCALE_FACTOR: f64 = 1.641121495327103;

        Self {
            model: RobotModel::Crx30iA,
            max_reach: 1.756,
            a3: 0.540 * SCALE_FACTOR,
            r4: -0.540 * SCALE_FACTOR,
            r5: 0.150 * SCALE_FACTOR,
            r6: -0.160 * SCALE_FACTOR,
            max_joint_velocity: 1.5,
            ..Self::crx_10ia()
        }
    }

    pub fn from_model(model: RobotModel) -> Self {
        match model {
            RobotModel::Crx10iA => Self::crx_10ia(),
            RobotModel::Crx30iA => Self::crx_30ia(),
        }
    }
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self::crx_10ia()
    }
}

/// Timing and gains of the simulated operational-space controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlParams {
    /// Duration of one `step` (one policy action), s
    pub control_timestep: f64,
    /// Physics substep, s
    pub model_timestep: f64,
    /// Position gain, 1/s
    pub kp_position: f64,
    /// Orientation gain, 1/s
    pub kp_orientation: f64,
    /// Damped-least-squares damping
    pub damping: f64,
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            control_timestep: 0.05,
            model_timestep: 0.002,
            kp_position: 10.0,
            kp_orientation: 10.0,
            damping: 0.05,
        }
    }
}

impl ControlParams {
    /// Physics substeps per control step
    pub fn substeps(&self) -> usize {
        ((self.control_timestep / self.model_timestep).round() as usize).max(1)
    }

    pub fn validate(&self) -> Result<(), String> {
        let values = [
            self.control_timestep,
            self.model_timestep,
            self.kp_position,
            self.kp_orientation,
            self.damping,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err("Control parameters must be finite.".to_string());
        }
        if self.model_timestep <= 0.0 || self.control_timestep <= 0.0 {
            return Err("Timesteps must be greater than 0.".to_string());
        }
        if self.kp_position <= 0.0 || self.kp_orientation <= 0.0 {
            return Err("Gains must be greater than 0.".to_string());
        }
        if self.damping < 0.0 {
            return Err("Damping cannot be negative.".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substeps() {
        assert_eq!(ControlParams::default().substeps(), 25);
        let coarse = ControlParams {
            model_timestep: 1.0,
            ..ControlParams::default()
        };
        assert_eq!(coarse.substeps(), 1);
    }

    #[test]
    fn test_from_model() {
        assert_eq!(ArmConfig::from_model(RobotModel::Crx30iA).model, RobotModel::Crx30iA);
        assert!((ArmConfig::crx_30ia().a3 - 0.886).abs() < 1e-3);
        assert!(ControlParams::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_degenerate_timing() {
        let zero = ControlParams {
            model_timestep: 0.0,
            ..ControlParams::default()
        };
        assert_eq!(zero.validate(), Err("Timesteps must be greater than 0.".to_string()));

        let nan = ControlParams {
            control_timestep: f64::NAN,
            ..ControlParams::default()
        };
        assert_eq!(nan.validate(), Err("Control parameters must be finite.".to_string()));
    }
}
