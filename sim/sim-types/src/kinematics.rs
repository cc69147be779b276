//! Read-only kinematic access to rigid bodies.
//!
//! Contact elements never own bodies. They look them up by [`BodyId`]
//! through a [`BodySet`] at the start of every evaluation and read the
//! current pose and velocity through [`RigidBodyKinematics`].

use std::collections::BTreeMap;
use std::collections::HashMap;

use nalgebra::{Matrix3, Vector3};

use crate::{BodyId, RigidBodyState, SpinCompliance};

/// Kinematic accessors of a rigid body.
pub trait RigidBodyKinematics {
    /// Current position of the body reference point.
    fn position(&self) -> Vector3<f64>;

    /// Current orientation (proper-orthogonal).
    fn orientation(&self) -> Matrix3<f64>;

    /// Current linear velocity.
    fn linear_velocity(&self) -> Vector3<f64>;

    /// Current angular velocity, world frame.
    fn angular_velocity(&self) -> Vector3<f64>;

    /// Spin-compliance terms, if this body variant has them.
    fn spin_compliance(&self) -> Option<SpinCompliance> {
        None
    }

    /// Whether [`Self::spin_compliance`] returns a value.
    fn has_spin_compliance(&self) -> bool {
        self.spin_compliance().is_some()
    }

    /// First global index of the body's six equations/unknowns.
    fn dof_offset(&self) -> usize;

    /// Check that every kinematic quantity is free of `NaN` and `Inf`.
    fn is_finite(&self) -> bool {
        let spin = self.spin_compliance().unwrap_or_default();
        self.position()
            .iter()
            .chain(self.orientation().iter())
            .chain(self.linear_velocity().iter())
            .chain(self.angular_velocity().iter())
            .chain(spin.linear.iter())
            .chain(spin.angular.iter())
            .all(|x| x.is_finite())
    }
}

impl RigidBodyKinematics for RigidBodyState {
    fn position(&self) -> Vector3<f64> {
        self.pose.position.coords
    }

    fn orientation(&self) -> Matrix3<f64> {
        self.pose.rotation_matrix()
    }

    fn linear_velocity(&self) -> Vector3<f64> {
        self.twist.linear
    }

    fn angular_velocity(&self) -> Vector3<f64> {
        self.twist.angular
    }

    fn spin_compliance(&self) -> Option<SpinCompliance> {
        self.spin
    }

    fn dof_offset(&self) -> usize {
        self.dof_offset
    }

    fn is_finite(&self) -> bool {
        Self::is_finite(self)
    }
}

/// Lookup of bodies by ID.
pub trait BodySet {
    /// Get a body, or `None` if it is not part of this set.
    fn body(&self, id: BodyId) -> Option<&dyn RigidBodyKinematics>;
}

impl<B: RigidBodyKinematics> BodySet for BTreeMap<BodyId, B> {
    fn body(&self, id: BodyId) -> Option<&dyn RigidBodyKinematics> {
        self.get(&id).map(|b| b as &dyn RigidBodyKinematics)
    }
}

impl<B: RigidBodyKinematics, S: std::hash::BuildHasher> BodySet for HashMap<BodyId, B, S> {
    fn body(&self, id: BodyId) -> Option<&dyn RigidBodyKinematics> {
        self.get(&id).map(|b| b as &dyn RigidBodyKinematics)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{Pose, Twist};
    use nalgebra::Point3;

    #[test]
    fn test_state_exposes_kinematics() {
        let state = RigidBodyState::new(
            Pose::from_position(Point3::new(1.0, 2.0, 3.0)),
            Twist::new(Vector3::x(), Vector3::z()),
            12,
        );
        assert_eq!(state.position(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(state.orientation(), Matrix3::identity());
        assert_eq!(state.linear_velocity(), Vector3::x());
        assert_eq!(state.angular_velocity(), Vector3::z());
        assert_eq!(state.dof_offset(), 12);
        assert!(!state.has_spin_compliance());

        let dynamic = state.with_spin(SpinCompliance::zero());
        assert!(dynamic.has_spin_compliance());
    }

    #[test]
    fn test_trait_finiteness_matches_state() {
        let state = RigidBodyState::at_rest(Pose::identity(), 0);
        assert!(RigidBodyKinematics::is_finite(&state));

        let mut broken = state;
        broken.twist.linear.z = f64::NAN;
        let body: &dyn RigidBodyKinematics = &broken;
        assert!(!body.is_finite());
    }

    #[test]
    fn test_body_set_lookup() {
        let mut bodies = BTreeMap::new();
        bodies.insert(BodyId::new(4), RigidBodyState::default());
        assert!(bodies.body(BodyId::new(4)).is_some());
        assert!(bodies.body(BodyId::new(5)).is_none());
    }
}
