//! Solver-coefficient gradients of point kinematics.
//!
//! A gradient here is the combined operator `G(q) = ∂q/∂ẏ + c·∂q/∂y` over the
//! twelve body unknowns of one pair, in column order
//! `[v1, ω1, v2, ω2]` (with `[x1, θ1, x2, θ2]` folded into the same columns).
//! `G` is a derivation, so products follow the usual rules:
//!
//! ```text
//! G(a × b) = -[b]× G(a) + [a]× G(b)
//! G(a · b) = bᵀ G(a) + aᵀ G(b)
//! ```

use nalgebra::{Matrix3, SMatrix, Vector3};
use sim_types::SpinCompliance;

/// Gradient of a 3-vector.
pub type Gradient3 = SMatrix<f64, 3, 12>;

/// Gradient of a scalar.
pub type Gradient1 = SMatrix<f64, 1, 12>;

/// First column of body 1's linear unknowns.
pub const LINEAR_1: usize = 0;
/// First column of body 1's angular unknowns.
pub const ANGULAR_1: usize = 3;
/// First column of body 2's linear unknowns.
pub const LINEAR_2: usize = 6;
/// First column of body 2's angular unknowns.
pub const ANGULAR_2: usize = 9;

/// Gradient with a single 3x3 block at `col`.
#[must_use]
pub fn block(col: usize, m: &Matrix3<f64>) -> Gradient3 {
    let mut g = Gradient3::zeros();
    g.fixed_view_mut::<3, 3>(0, col).copy_from(m);
    g
}

/// Gradient of a velocity unknown (`v` or `ω`) at `col`.
#[must_use]
pub fn velocity(col: usize) -> Gradient3 {
    block(col, &Matrix3::identity())
}

/// Gradient of a body position whose linear unknowns start at `col`.
#[must_use]
pub fn position(col: usize, coefficient: f64) -> Gradient3 {
    block(col, &Matrix3::from_diagonal_element(coefficient))
}

/// Gradient of a body-fixed arm `R·a` under `R ← exp([δθ]×)·R`, for the
/// body whose angular unknowns start at `col`.
#[must_use]
pub fn rotated(col: usize, arm: &Vector3<f64>, coefficient: f64) -> Gradient3 {
    block(col, &(-arm.cross_matrix() * coefficient))
}

/// `G(a × b)`.
#[must_use]
pub fn cross(a: &Vector3<f64>, ga: &Gradient3, b: &Vector3<f64>, gb: &Gradient3) -> Gradient3 {
    -b.cross_matrix() * ga + a.cross_matrix() * gb
}

/// `G(a · b)`.
#[must_use]
pub fn dot(a: &Vector3<f64>, ga: &Gradient3, b: &Vector3<f64>, gb: &Gradient3) -> Gradient1 {
    b.transpose() * ga + a.transpose() * gb
}

/// `G(|a|)`. Zero at `a = 0`.
#[must_use]
pub fn norm(a: &Vector3<f64>, ga: &Gradient3) -> Gradient1 {
    let length = a.norm();
    if length > 0.0 {
        a.transpose() * ga / length
    } else {
        Gradient1::zeros()
    }
}

/// `G(a / |a|)`. Zero at `a = 0`.
#[must_use]
pub fn unit(a: &Vector3<f64>, ga: &Gradient3) -> Gradient3 {
    let length = a.norm();
    if length > 0.0 {
        let u = a / length;
        (Matrix3::identity() - u * u.transpose()) * ga / length
    } else {
        Gradient3::zeros()
    }
}

/// `G((I - n nᵀ) f)`.
#[must_use]
pub fn tangential(
    n: &Vector3<f64>,
    gn: &Gradient3,
    f: &Vector3<f64>,
    gf: &Gradient3,
) -> Gradient3 {
    let projector = Matrix3::identity() - n * n.transpose();
    projector * gf - gn * n.dot(f) - n * (f.transpose() * gn)
}

/// `G((r × B + G) × r)` with `B`, `G` frozen.
#[must_use]
pub fn spin_force(arm: &Vector3<f64>, g_arm: &Gradient3, spin: &SpinCompliance) -> Gradient3 {
    let lever = arm.cross(&spin.linear) + spin.angular;
    (arm.cross_matrix() * spin.linear.cross_matrix() + lever.cross_matrix()) * g_arm
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::SVector;

    fn sample_gradient(seed: f64) -> Gradient3 {
        Gradient3::from_fn(|i, j| ((i * 12 + j) as f64 * 0.37 + seed).sin())
    }

    fn along<const R: usize>(
        f: impl Fn(f64) -> SVector<f64, R>,
    ) -> SVector<f64, R> {
        let h = 1e-6;
        (f(h) - f(-h)) / (2.0 * h)
    }

    #[test]
    fn test_product_rules_match_difference() {
        let a = Vector3::new(0.3, -1.2, 0.8);
        let b = Vector3::new(-0.5, 0.4, 2.0);
        let ga = sample_gradient(0.1);
        let gb = sample_gradient(1.7);
        let u = SVector::<f64, 12>::from_fn(|i, _| (i as f64 * 0.9).cos());

        let a_at = |t: f64| a + ga * u * t;
        let b_at = |t: f64| b + gb * u * t;

        let fd = along(|t| a_at(t).cross(&b_at(t)));
        assert_relative_eq!(cross(&a, &ga, &b, &gb) * u, fd, epsilon = 1e-7);

        let fd = along(|t| SVector::<f64, 1>::new(a_at(t).dot(&b_at(t))));
        assert_relative_eq!(dot(&a, &ga, &b, &gb) * u, fd, epsilon = 1e-7);

        let fd = along(|t| SVector::<f64, 1>::new(a_at(t).norm()));
        assert_relative_eq!(norm(&a, &ga) * u, fd, epsilon = 1e-7);

        let fd = along(|t| a_at(t).normalize());
        assert_relative_eq!(unit(&a, &ga) * u, fd, epsilon = 1e-7);
    }

    #[test]
    fn test_tangential_and_spin_force_match_difference() {
        let n = Vector3::new(0.2, -0.3, 0.9);
        let f = Vector3::new(1.0, 0.5, -0.7);
        let gn = sample_gradient(0.4);
        let gf = sample_gradient(2.3);
        let u = SVector::<f64, 12>::from_fn(|i, _| 1.0 / (1.0 + i as f64));

        let fd = along(|t| {
            let n = n + gn * u * t;
            let f = f + gf * u * t;
            f - n * n.dot(&f)
        });
        assert_relative_eq!(tangential(&n, &gn, &f, &gf) * u, fd, epsilon = 1e-7);

        let spin = SpinCompliance::new(Vector3::new(0.1, 2.0, -0.4), Vector3::new(0.7, 0.0, 1.1));
        let fd = along(|t| spin.force_at_arm(&(f + gf * u * t)));
        assert_relative_eq!(spin_force(&f, &gf, &spin) * u, fd, epsilon = 1e-7);
    }

    #[test]
    fn test_rotated_arm_matches_rotation() {
        let arm = Vector3::new(0.0, 0.5, -1.0);
        let g = rotated(ANGULAR_2, &arm, 2.0);
        let delta = Vector3::new(0.3, -0.1, 0.2);
        let mut u = SVector::<f64, 12>::zeros();
        u.fixed_rows_mut::<3>(ANGULAR_2).copy_from(&delta);

        let h = 1e-6;
        let rotate = |t: f64| nalgebra::Rotation3::from_scaled_axis(delta * t) * arm;
        let fd = (rotate(h) - rotate(-h)) / (2.0 * h);
        assert_relative_eq!(g * u, fd * 2.0, epsilon = 1e-8);
    }
}
