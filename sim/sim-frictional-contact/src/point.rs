//! Contact points, their persistent stick/slip records, and per-point output.
//!
//! Points are rebuilt on every residual pass. The friction decision that
//! must survive across Newton iterations lives in a [`ContactState`] record
//! keyed by a stable [`ContactKey`], not by the point's position in the
//! rebuilt list.

use nalgebra::{Point3, Vector3};
use sim_types::RigidBodyKinematics;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ShapePair;

/// Identifier of the surface feature a contact came from.
///
/// Geometry sources that know which face, edge or vertex produced a contact
/// report it here. Points without a reported feature get an ordinal ID from
/// their insertion order; ordinals have the high bit set so they never
/// collide with reported features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureId(pub u32);

impl FeatureId {
    const ORDINAL_FLAG: u32 = 1 << 31;

    /// Feature reported by a geometry source. The high bit is cleared.
    #[must_use]
    pub const fn new(code: u32) -> Self {
        Self(code & !Self::ORDINAL_FLAG)
    }

    /// Fallback ID from insertion order within a pair.
    #[must_use]
    pub const fn ordinal(index: usize) -> Self {
        Self(Self::ORDINAL_FLAG | (index as u32 & !Self::ORDINAL_FLAG))
    }

    /// Check if this ID was derived from insertion order.
    #[must_use]
    pub const fn is_ordinal(self) -> bool {
        self.0 & Self::ORDINAL_FLAG != 0
    }
}

/// Stable key of a contact point within its pair.
///
/// `occurrence` counts earlier points of the same pass that carried the
/// same feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactKey {
    /// Surface feature.
    pub feature: FeatureId,
    /// Repeat count of the feature within one pass.
    pub occurrence: u32,
}

impl ContactKey {
    /// Create a key.
    #[must_use]
    pub const fn new(feature: FeatureId, occurrence: u32) -> Self {
        Self {
            feature,
            occurrence,
        }
    }
}

/// Friction regime of a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ContactRegime {
    /// Not interpenetrating, or degenerate direction. Unknowns pinned to zero.
    #[default]
    Inactive,
    /// Normal force only, because the pair has no friction law.
    Frictionless,
    /// Coulomb-limited sliding force. Unknowns pinned to zero.
    Slip,
    /// Unknowns are the tangential reaction force.
    NoSlip,
}

impl ContactRegime {
    /// Check if the point carries a normal force.
    #[must_use]
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Inactive)
    }
}

/// Persistent stick/slip decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StickSlip {
    /// No decision taken since the last reset.
    #[default]
    Undefined,
    /// Sliding.
    Slip,
    /// Sticking.
    NoSlip,
}

/// Which equations a point contributed, and through which law branch.
///
/// Two passes with equal signatures assemble structurally identical blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EquationSignature {
    /// Regime of the point.
    pub regime: ContactRegime,
    /// Branch reported by the normal law (0 when inactive).
    pub branch: u32,
}

impl EquationSignature {
    /// Create a signature.
    #[must_use]
    pub const fn new(regime: ContactRegime, branch: u32) -> Self {
        Self { regime, branch }
    }

    /// Signature of a point that contributes nothing.
    #[must_use]
    pub const fn dormant() -> Self {
        Self::new(ContactRegime::Inactive, 0)
    }
}

/// Per-key record carried across Newton iterations.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactState {
    /// Stick/slip decision, reset every step.
    pub stick: StickSlip,
    /// Trial tangential force of the last pass, reset every step.
    pub ft_prev: Vector3<f64>,
    /// Signature of the last pass. Survives resets.
    pub signature: Option<EquationSignature>,
}

impl ContactState {
    /// Forget the stick/slip decision and the previous tangential force.
    pub fn reset(&mut self) {
        self.stick = StickSlip::Undefined;
        self.ft_prev = Vector3::zeros();
    }

    /// Store a new signature, returning whether it differs from the last one.
    pub fn record_signature(&mut self, signature: EquationSignature) -> bool {
        let previous = self.signature.unwrap_or_else(EquationSignature::dormant);
        self.signature = Some(signature);
        previous != signature
    }
}

/// A detected contact, reduced to body-fixed material points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// Stable key of this point.
    pub key: ContactKey,
    /// Material point on body 1, body-1 frame.
    pub offset1: Vector3<f64>,
    /// Material point on body 2, body-2 frame.
    pub offset2: Vector3<f64>,
    /// Friction application point, body-2 frame.
    pub arm2: Vector3<f64>,
    /// Regime assigned by the last residual pass, `None` until assembled.
    pub regime: Option<ContactRegime>,
}

impl ContactPoint {
    /// Build a point from detected surface points `p1` (on body 1) and `p2`
    /// (on body 2).
    ///
    /// The friction arm sits at `p1 + ratio·(p2 - p1)`.
    #[must_use]
    pub fn from_surface_points(
        key: ContactKey,
        body1: &dyn RigidBodyKinematics,
        body2: &dyn RigidBodyKinematics,
        p1: &Point3<f64>,
        p2: &Point3<f64>,
        ratio: f64,
    ) -> Self {
        let to_local = |body: &dyn RigidBodyKinematics, p: &Point3<f64>| {
            body.orientation().transpose() * (p.coords - body.position())
        };
        let blended = p1 + (p2 - p1) * ratio;
        Self {
            key,
            offset1: to_local(body1, p1),
            offset2: to_local(body2, p2),
            arm2: to_local(body2, &blended),
            regime: None,
        }
    }
}

/// Output of one contact point for one residual pass.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactReport {
    /// Owning pair.
    pub pair: ShapePair,
    /// Point key.
    pub key: ContactKey,
    /// Separation-vector length.
    pub depth: f64,
    /// Rate of change of the separation-vector length.
    pub rate: f64,
    /// Normal force magnitude from the constitutive law.
    pub normal_force: f64,
    /// Friction or reaction force applied to body 1.
    pub friction_force: Vector3<f64>,
    /// Relative tangential velocity of body 2 with respect to body 1.
    pub tangential_velocity: Vector3<f64>,
    /// Regime of the point.
    pub regime: ContactRegime,
}

impl ContactReport {
    /// Report for a point that contributes nothing.
    #[must_use]
    pub fn inactive(pair: ShapePair, key: ContactKey, depth: f64, rate: f64) -> Self {
        Self {
            pair,
            key,
            depth,
            rate,
            normal_force: 0.0,
            friction_force: Vector3::zeros(),
            tangential_velocity: Vector3::zeros(),
            regime: ContactRegime::Inactive,
        }
    }
}
