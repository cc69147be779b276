//! Rigid body state types.
//!
//! This module provides the plain-data view of a rigid body that contact
//! elements consume: pose, velocity, the optional spin-compliance terms
//! exposed by dynamic bodies, and where the body's six equations live in the
//! global system.

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unique identifier for a rigid body in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId(pub u64);

impl BodyId {
    /// Create a new body ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for BodyId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// Position and orientation of a rigid body.
///
/// # Example
///
/// ```
/// use sim_types::Pose;
/// use nalgebra::{Point3, Vector3};
///
/// let pose = Pose::from_position(Point3::new(1.0, 2.0, 3.0));
/// let world = pose.transform_point(&Vector3::new(1.0, 0.0, 0.0));
/// assert_eq!(world, Point3::new(2.0, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Position in world coordinates.
    pub position: Point3<f64>,
    /// Orientation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Create an identity pose (origin, no rotation).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from position only (identity rotation).
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from position and rotation.
    #[must_use]
    pub const fn from_position_rotation(
        position: Point3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Self { position, rotation }
    }

    /// Orientation as a proper-orthogonal 3x3 matrix.
    #[must_use]
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    /// Map a body-local offset to a world point.
    #[must_use]
    pub fn transform_point(&self, local: &Vector3<f64>) -> Point3<f64> {
        self.position + self.rotation * local
    }

    /// Apply an incremental world-frame rotation `exp([delta]x)` and a
    /// translation increment.
    ///
    /// This is the perturbation an implicit integrator applies to a pose
    /// between Newton iterations.
    #[must_use]
    pub fn perturbed(&self, translation: &Vector3<f64>, rotation: &Vector3<f64>) -> Self {
        Self {
            position: self.position + translation,
            rotation: UnitQuaternion::from_scaled_axis(*rotation) * self.rotation,
        }
    }

    /// Check if the pose contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.rotation.coords.iter().all(|x| x.is_finite())
    }
}

/// Linear and angular velocity of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Twist {
    /// Linear velocity in world coordinates (m/s).
    pub linear: Vector3<f64>,
    /// Angular velocity in world coordinates (rad/s).
    pub angular: Vector3<f64>,
}

impl Default for Twist {
    fn default() -> Self {
        Self::zero()
    }
}

impl Twist {
    /// Create a twist with specified linear and angular velocity.
    #[must_use]
    pub const fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    /// Create a zero twist (at rest).
    #[must_use]
    pub fn zero() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        }
    }

    /// Check if the twist contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.linear.iter().all(|x| x.is_finite()) && self.angular.iter().all(|x| x.is_finite())
    }
}

/// Velocity-dependent compliance terms carried by dynamic bodies.
///
/// Dynamic bodies expose a translational term `B` and a rotational term `G`
/// that contact elements fold into a tangential-force estimate. Bodies
/// without these capabilities contribute zero.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpinCompliance {
    /// Translational term `B`.
    pub linear: Vector3<f64>,
    /// Rotational term `G`.
    pub angular: Vector3<f64>,
}

impl Default for SpinCompliance {
    fn default() -> Self {
        Self::zero()
    }
}

impl SpinCompliance {
    /// Create spin-compliance terms.
    #[must_use]
    pub const fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    /// Zero contribution.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        }
    }

    /// Tangential-force estimate at a world-frame arm: `(r × B + G) × r`.
    #[must_use]
    pub fn force_at_arm(&self, arm: &Vector3<f64>) -> Vector3<f64> {
        (arm.cross(&self.linear) + self.angular).cross(arm)
    }
}

/// Complete state of a rigid body as seen by a contact element.
///
/// # Example
///
/// ```
/// use sim_types::{RigidBodyState, Pose};
/// use nalgebra::Point3;
///
/// let state = RigidBodyState::at_rest(Pose::from_position(Point3::new(0.0, 0.0, 1.0)), 6);
/// assert_eq!(state.pose.position.z, 1.0);
/// assert_eq!(state.dof_offset, 6);
/// assert!(state.spin.is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBodyState {
    /// Position and orientation.
    pub pose: Pose,
    /// Linear and angular velocity.
    pub twist: Twist,
    /// Spin-compliance terms, present only on dynamic bodies.
    pub spin: Option<SpinCompliance>,
    /// First global index of the body's six equations/unknowns.
    pub dof_offset: usize,
}

impl RigidBodyState {
    /// Create a state from pose and twist.
    #[must_use]
    pub const fn new(pose: Pose, twist: Twist, dof_offset: usize) -> Self {
        Self {
            pose,
            twist,
            spin: None,
            dof_offset,
        }
    }

    /// Create a state at rest at the given pose.
    #[must_use]
    pub fn at_rest(pose: Pose, dof_offset: usize) -> Self {
        Self::new(pose, Twist::zero(), dof_offset)
    }

    /// Attach spin-compliance terms, making this a dynamic body.
    #[must_use]
    pub fn with_spin(mut self, spin: SpinCompliance) -> Self {
        self.spin = Some(spin);
        self
    }

    /// Check if pose, twist and spin-compliance terms are all finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.pose.is_finite()
            && self.twist.is_finite()
            && self.spin.map_or(true, |spin| {
                spin.linear.iter().chain(spin.angular.iter()).all(|x| x.is_finite())
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_point_rotates_then_translates() {
        let pose = Pose::from_position_rotation(
            Point3::new(1.0, -2.0, 0.5),
            UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
        );
        let world = pose.transform_point(&Vector3::new(0.2, 0.0, -0.1));
        assert_relative_eq!(world, Point3::new(1.0, -1.8, 0.4), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_matrix_is_orthogonal() {
        let pose = Pose::from_position_rotation(
            Point3::origin(),
            UnitQuaternion::from_euler_angles(0.7, 0.1, -0.4),
        );
        let r = pose.rotation_matrix();
        assert_relative_eq!(r.transpose() * r, Matrix3::identity(), epsilon = 1e-12);
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_perturbed_rotates_in_world_frame() {
        let pose = Pose::identity();
        let turned = pose.perturbed(&Vector3::zeros(), &Vector3::new(0.0, 0.0, 1e-6));
        let arm = turned.rotation_matrix() * Vector3::x();
        // exp([dθ]x)·x ≈ x + dθ × x
        assert_relative_eq!(arm, Vector3::new(1.0, 1e-6, 0.0), epsilon = 1e-11);
    }

    #[test]
    fn test_non_finite_state_detected() {
        let state = RigidBodyState::at_rest(Pose::identity(), 0);
        assert!(state.is_finite());

        let mut moving = state;
        moving.twist.angular.y = f64::NAN;
        assert!(!moving.is_finite());

        let mut displaced = state;
        displaced.pose.position.x = f64::INFINITY;
        assert!(!displaced.is_finite());

        let spinning = state.with_spin(SpinCompliance::new(
            Vector3::zeros(),
            Vector3::new(0.0, f64::NAN, 0.0),
        ));
        assert!(!spinning.is_finite());
    }

    #[test]
    fn test_spin_force_at_arm() {
        let spin = SpinCompliance::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 1.0));
        let f = spin.force_at_arm(&Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(f, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(SpinCompliance::zero().force_at_arm(&Vector3::x()), Vector3::zeros());
    }

    #[test]
    fn test_body_id_display() {
        assert_eq!(BodyId::new(7).to_string(), "Body(7)");
        assert_eq!(BodyId::from(3).raw(), 3);
    }
}
