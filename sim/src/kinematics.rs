// Kinematics for the FANUC CRX series
// Based on the research paper: "Geometric Approach for Inverse Kinematics of the FANUC CRX Collaborative Robot"
// by Manel Abbes and Gérard Poisson, Robotics 2024, 13, 91
// https://doi.org/10.3390/robotics13060091

use nalgebra::{Isometry3, Matrix3, Matrix4, Matrix6, Rotation3, Translation3, UnitQuaternion};

use crate::robot_config::ArmConfig;

/// Modified Denavit-Hartenberg (DHm) chain for the CRX series
///
/// Link | a_{i-1} | α_{i-1} | θ_i        | r_i
/// -----|---------|---------|------------|--------
/// L1   | 0       | 0       | J1         | 0
/// L2   | 0       | -90     | J2-90      | 0
/// L3   | 0.540   | +180    | J2+J3      | 0
/// L4   | 0       | -90     | J4         | -0.540
/// L5   | 0       | +90     | J5         | 0.150
/// L6   | 0       | -90     | J6         | -0.160
///
/// Lengths in m, angles in degrees (CRX-10iA)
#[derive(Debug, Clone)]
pub struct CrxKinematics {
    config: ArmConfig,
}

/// Step for the central-difference Jacobian, rad
const JACOBIAN_STEP: f64 = 1e-6;

impl CrxKinematics {
    pub fn from_config(config: ArmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArmConfig {
        &self.config
    }

    /// Homogeneous transform for one DHm link (Equation 1 in the paper)
    fn dh_transform(a: f64, alpha: f64, theta: f64, r: f64) -> Matrix4<f64> {
        let (st, ct) = theta.sin_cos();
        let (sa, ca) = alpha.sin_cos();

        Matrix4::new(
            ct, -st, 0.0, a,
            st * ca, ct * ca, -sa, -r * sa,
            st * sa, ct * sa, ca, r * ca,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Tool flange pose in the robot base frame.
    ///
    /// FANUC couples J2 and J3: θ2 = J2 - 90°, θ3 = J2 + J3.
    pub fn forward_kinematics(&self, joints: &[f64; 6]) -> Isometry3<f64> {
        let [j1, j2, j3, j4, j5, j6] = *joints;
        let c = &self.config;

        let t01 = Self::dh_transform(0.0, 0.0, j1, 0.0);
        let t12 = Self::dh_transform(0.0, c.alpha2, j2 - std::f64::consts::FRAC_PI_2, 0.0);
        let t23 = Self::dh_transform(c.a3, c.alpha3, j2 + j3, 0.0);
        let t34 = Self::dh_transform(0.0, c.alpha4, j4, c.r4);
        let t45 = Self::dh_transform(0.0, c.alpha5, j5, c.r5);
        let t56 = Self::dh_transform(0.0, c.alpha6, j6, c.r6);

        // T6^tool (Equation 2)
        let t6_tool = Matrix4::from_diagonal(&nalgebra::Vector4::new(1.0, -1.0, -1.0, 1.0));

        let t = t01 * t12 * t23 * t34 * t45 * t56 * t6_tool;

        let rotation: Matrix3<f64> = t.fixed_view::<3, 3>(0, 0).into_owned();
        let orientation =
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation));
        Isometry3::from_parts(Translation3::new(t[(0, 3)], t[(1, 3)], t[(2, 3)]), orientation)
    }

    /// Geometric Jacobian in the base frame, rows `[v; ω]`.
    ///
    /// Central differences of the forward kinematics; the angular rows use
    /// the rotation vector of `R(q + h) · R(q - h)ᵀ`.
    pub fn jacobian(&self, joints: &[f64; 6]) -> Matrix6<f64> {
        let mut jac = Matrix6::zeros();
        for i in 0..6 {
            let mut plus = *joints;
            let mut minus = *joints;
            plus[i] += JACOBIAN_STEP;
            minus[i] -= JACOBIAN_STEP;

            let tp = self.forward_kinematics(&plus);
            let tm = self.forward_kinematics(&minus);

            let dv = (tp.translation.vector - tm.translation.vector) / (2.0 * JACOBIAN_STEP);
            let dw = (tp.rotation * tm.rotation.inverse()).scaled_axis() / (2.0 * JACOBIAN_STEP);

            jac.fixed_view_mut::<3, 1>(0, i).copy_from(&dv);
            jac.fixed_view_mut::<3, 1>(3, i).copy_from(&dw);
        }
        jac
    }
}

impl Default for CrxKinematics {
    fn default() -> Self {
        Self::from_config(ArmConfig::default())
    }
}
