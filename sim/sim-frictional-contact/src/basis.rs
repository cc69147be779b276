//! Local tangent basis at a contact point.
//!
//! The basis is the Rodrigues rotation that takes the world z axis onto the
//! unit contact normal `n`. With `c = n_z` (cosine of the angle),
//! `k = z × n` (axis scaled by the sine) and `q = (1 - c) / |k|²`:
//!
//! ```text
//! R = c·I + [k]× + q·k kᵀ
//! ```
//!
//! Columns `e1`, `e2` of `R` span the tangent plane and `R·z = n`. The form
//! never divides by `1 + c`, so it stays orthonormal arbitrarily close to
//! `-z`, where the frame becomes the half turn about `k`. When `k` vanishes
//! exactly the basis is the identity (`n = z`) or the half turn about x
//! (`n = -z`).

use nalgebra::{Matrix3, Vector3};

/// Orthonormal frame whose third axis is the contact normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentBasis {
    rotation: Matrix3<f64>,
    normal: Vector3<f64>,
}

impl TangentBasis {
    /// Build the basis for a unit normal.
    #[must_use]
    pub fn from_normal(normal: &Vector3<f64>) -> Self {
        let k = Vector3::z().cross(normal);
        let k2 = k.norm_squared();
        let c = normal.z;
        let rotation = if k2 == 0.0 {
            if c < 0.0 {
                Matrix3::from_diagonal(&Vector3::new(1.0, -1.0, -1.0))
            } else {
                Matrix3::identity()
            }
        } else {
            let q = (1.0 - c) / k2;
            Matrix3::identity() * c + k.cross_matrix() + k * k.transpose() * q
        };
        Self {
            rotation,
            normal: *normal,
        }
    }

    /// Tangent axis `j` (0 or 1), in world frame.
    #[must_use]
    pub fn axis(&self, j: usize) -> Vector3<f64> {
        self.rotation.column(j).into_owned()
    }

    /// Full rotation matrix.
    #[must_use]
    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    /// Derivative of tangent axis `j` with respect to the normal.
    ///
    /// With `ê` the j-th unit vector, `Z = [z]×` and `m = k·k`, the axis is
    /// `e = c·ê + k × ê + q·k (k·ê)` and
    ///
    /// ```text
    /// ∂e/∂n = ê zᵀ - [ê]× Z + (k·ê)·k ∇qᵀ + q·(k·ê)·Z + q·k êᵀ Z
    /// ∇qᵀ   = -zᵀ/m - 2(1 - c)/m² · kᵀ Z
    /// ```
    ///
    /// At `n = z` the `q` terms vanish. At `n = -z` the frame is not
    /// differentiable and is treated as frozen.
    #[must_use]
    pub fn axis_derivative(&self, j: usize) -> Matrix3<f64> {
        let unit = Vector3::ith(j, 1.0);
        let z = Vector3::z();
        let zx = z.cross_matrix();
        let k = z.cross(&self.normal);
        let m = k.norm_squared();
        let c = self.normal.z;

        if m == 0.0 {
            return if c < 0.0 {
                Matrix3::zeros()
            } else {
                unit * z.transpose() - unit.cross_matrix() * zx
            };
        }

        let q = (1.0 - c) / m;
        let k_e = k.dot(&unit);
        let grad_q = -z.transpose() / m - (k.transpose() * zx) * (2.0 * (1.0 - c) / (m * m));
        unit * z.transpose() - unit.cross_matrix() * zx
            + k * grad_q * k_e
            + zx * (q * k_e)
            + k * (unit.transpose() * zx) * q
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn normal_from_angles(theta: f64, phi: f64) -> Vector3<f64> {
        Vector3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos())
    }

    #[test]
    fn test_aligned_normal_is_identity() {
        let basis = TangentBasis::from_normal(&Vector3::z());
        assert_eq!(*basis.rotation(), Matrix3::identity());
        assert_eq!(basis.axis(0), Vector3::x());
    }

    #[test]
    fn test_maps_z_onto_normal() {
        let n = normal_from_angles(1.1, 0.4);
        let basis = TangentBasis::from_normal(&n);
        assert_relative_eq!(basis.rotation() * Vector3::z(), n, epsilon = 1e-12);
    }

    #[test]
    fn test_antipodal_normal_is_half_turn() {
        let basis = TangentBasis::from_normal(&-Vector3::z());
        assert_eq!(basis.axis(0), Vector3::x());
        assert_eq!(basis.axis(1), -Vector3::y());
        assert_eq!(basis.rotation() * Vector3::z(), -Vector3::z());
    }

    #[test]
    fn test_near_antipodal_normal_stays_orthonormal() {
        for offset in [1e-12, 1e-9, 1e-6] {
            let n = Vector3::new(offset, -0.5 * offset, -1.0).normalize();
            let basis = TangentBasis::from_normal(&n);
            let r = basis.rotation();
            assert!(r.iter().all(|x| x.is_finite()));
            assert_relative_eq!(r.transpose() * r, Matrix3::identity(), epsilon = 1e-12);
            assert_relative_eq!(r * Vector3::z(), n, epsilon = 1e-12);
        }
    }

    proptest! {
        #[test]
        fn basis_is_orthonormal(theta in 0.0f64..=std::f64::consts::PI, phi in -3.1f64..3.1) {
            let n = normal_from_angles(theta, phi);
            let basis = TangentBasis::from_normal(&n);
            let e1 = basis.axis(0);
            let e2 = basis.axis(1);
            prop_assert!((e1.norm() - 1.0).abs() < 1e-10);
            prop_assert!((e2.norm() - 1.0).abs() < 1e-10);
            prop_assert!(e1.dot(&e2).abs() < 1e-10);
            prop_assert!(e1.dot(&n).abs() < 1e-10);
            prop_assert!(e2.dot(&n).abs() < 1e-10);
        }

        #[test]
        fn axis_derivative_matches_difference(
            theta in 0.05f64..3.09,
            phi in -3.0f64..3.0,
            dx in -1.0f64..1.0,
            dy in -1.0f64..1.0,
            dz in -1.0f64..1.0,
        ) {
            let n = normal_from_angles(theta, phi);
            let direction = Vector3::new(dx, dy, dz);
            let h = 1e-6;
            let plus = TangentBasis::from_normal(&(n + direction * h));
            let minus = TangentBasis::from_normal(&(n - direction * h));
            let basis = TangentBasis::from_normal(&n);
            for j in 0..2 {
                let fd = (plus.axis(j) - minus.axis(j)) / (2.0 * h);
                let analytic = basis.axis_derivative(j) * direction;
                prop_assert!((fd - analytic).norm() < 1e-6 * (1.0 + analytic.norm()));
            }
        }
    }
}
