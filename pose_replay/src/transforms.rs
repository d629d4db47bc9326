//! Coordinate transformation utilities.
//!
//! Homogeneous 4x4 helpers in the style of the simulator's own transform
//! utilities, plus Euler-angle conversions used by dataset viewpoint metadata.
//!
//! # Examples
//!
//! ```rust
//! use nalgebra::{Matrix3, Vector3};
//! use pose_replay::transforms::{make_pose, pose_inv};
//!
//! let t = make_pose(&Vector3::new(1.0, 2.0, 3.0), &Matrix3::identity());
//! let identity = t * pose_inv(&t);
//! assert!((identity - nalgebra::Matrix4::identity()).norm() < 1e-12);
//! ```
//!
//! # Notes
//!
//! - Euler angles here are extrinsic x-y-z in degrees, R = Rz(yaw) * Ry(pitch) * Rx(roll)
//! - Quaternions are scalar-first wherever they appear as plain arrays

use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};

/// Build a homogeneous transform from a translation and a rotation matrix.
pub fn make_pose(position: &Vector3<f64>, rotation: &Matrix3<f64>) -> Matrix4<f64> {
    let mut t = Matrix4::identity();
    t.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    t.fixed_view_mut::<3, 1>(0, 3).copy_from(position);
    t
}

/// Rigid-body inverse of a homogeneous transform: `[R^T, -R^T p]`.
pub fn pose_inv(t: &Matrix4<f64>) -> Matrix4<f64> {
    let r = t.fixed_view::<3, 3>(0, 0).into_owned();
    let p = t.fixed_view::<3, 1>(0, 3).into_owned();
    let rt = r.transpose();
    make_pose(&(-(rt * p)), &rt)
}

/// Rotation matrix (e.g. a site's `xmat`) to a unit quaternion.
///
/// The matrix is assumed orthonormal; it is re-orthonormalized first so
/// accumulated float drift does not leak into the quaternion.
pub fn rotation_matrix_to_quat(m: &Matrix3<f64>) -> UnitQuaternion<f64> {
    let direct = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*m));
    let guess = direct.to_rotation_matrix();
    let rot = Rotation3::from_matrix_eps(m, 1e-12, 16, guess);
    UnitQuaternion::from_rotation_matrix(&rot)
}

/// Extrinsic x-y-z Euler angles in degrees to a unit quaternion.
pub fn euler_xyz_degrees_to_quat(roll: f64, pitch: f64, yaw: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(roll.to_radians(), pitch.to_radians(), yaw.to_radians())
}

/// Inverse of [`euler_xyz_degrees_to_quat`]; returns `(roll, pitch, yaw)` in degrees.
pub fn quat_to_euler_xyz_degrees(q: &UnitQuaternion<f64>) -> (f64, f64, f64) {
    let (roll, pitch, yaw) = q.euler_angles();
    (roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pose_inv_composes_to_identity() {
        let rot = Rotation3::from_euler_angles(0.3, -0.7, 1.1);
        let t = make_pose(&Vector3::new(-0.6, 0.0, 0.912), rot.matrix());
        let id = t * pose_inv(&t);
        assert_relative_eq!(id, Matrix4::identity(), epsilon = 1e-12);
        let id = pose_inv(&t) * t;
        assert_relative_eq!(id, Matrix4::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_make_pose_layout() {
        let t = make_pose(&Vector3::new(1.0, 2.0, 3.0), &Matrix3::identity());
        assert_eq!(t[(0, 3)], 1.0);
        assert_eq!(t[(1, 3)], 2.0);
        assert_eq!(t[(2, 3)], 3.0);
        assert_eq!(t[(3, 3)], 1.0);
        assert_eq!(t[(3, 0)], 0.0);
    }

    #[test]
    fn test_euler_roundtrip_conversion() {
        let q = euler_xyz_degrees_to_quat(-120.0, 10.0, 85.0);
        let (r, p, y) = quat_to_euler_xyz_degrees(&q);
        assert_relative_eq!(r, -120.0, epsilon = 1e-9);
        assert_relative_eq!(p, 10.0, epsilon = 1e-9);
        assert_relative_eq!(y, 85.0, epsilon = 1e-9);
    }

    #[test]
    fn test_euler_yaw_only_is_rotation_about_z() {
        let q = euler_xyz_degrees_to_quat(0.0, 0.0, 90.0);
        let x = q * Vector3::x();
        assert_relative_eq!(x, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_matrix_to_quat() {
        let q = UnitQuaternion::from_euler_angles(0.2, 0.4, -0.9);
        let m = q.to_rotation_matrix().into_inner();
        let back = rotation_matrix_to_quat(&m);
        assert_relative_eq!(back.angle_to(&q), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rotation_matrix_to_quat_half_turn() {
        let q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::PI);
        let back = rotation_matrix_to_quat(q.to_rotation_matrix().matrix());
        assert!(back.angle_to(&q) < 1e-6);
    }
}
