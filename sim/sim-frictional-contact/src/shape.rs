//! Collision shapes attached to rigid bodies.
//!
//! A [`ShapeProxy`] is the geometry source's view of a body: a shape fixed in
//! the body frame at some offset and orientation. Proxies are re-synchronized
//! with their body's pose at the start of every residual pass so detection
//! always runs on current transforms.

use nalgebra::{Isometry3, Rotation3, Translation3, UnitQuaternion, Vector3};
use sim_types::{BodyId, RigidBodyKinematics};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ContactError;

/// Label of a registered collision shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapeId(pub u32);

impl ShapeId {
    /// Create a new shape ID.
    #[must_use]
    pub const fn new(label: u32) -> Self {
        Self(label)
    }

    /// Get the raw label.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Shape({})", self.0)
    }
}

/// Ordered pair of shapes owning one contact element.
///
/// The order is the registration order: `first` is the later-registered
/// shape and plays the role of body 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapePair {
    /// Shape on body 1.
    pub first: ShapeId,
    /// Shape on body 2.
    pub second: ShapeId,
}

impl ShapePair {
    /// Create a pair.
    #[must_use]
    pub const fn new(first: ShapeId, second: ShapeId) -> Self {
        Self { first, second }
    }

    /// The same pair with roles exchanged.
    #[must_use]
    pub const fn swapped(self) -> Self {
        Self {
            first: self.second,
            second: self.first,
        }
    }
}

impl std::fmt::Display for ShapePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.first.0, self.second.0)
    }
}

/// Collision shape primitives, in the shape's own frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    /// Sphere centered at the origin.
    Sphere {
        /// Radius (m).
        radius: f64,
    },
    /// Axis-aligned box centered at the origin.
    Box {
        /// Half extents along x, y, z (m).
        half_extents: Vector3<f64>,
    },
    /// Capsule along the local y axis.
    Capsule {
        /// Radius (m).
        radius: f64,
        /// Length of the cylindrical section (m).
        height: f64,
    },
    /// Cone along the local y axis.
    Cone {
        /// Base radius (m).
        radius: f64,
        /// Height (m).
        height: f64,
    },
}

impl Shape {
    /// Create a sphere.
    #[must_use]
    pub const fn sphere(radius: f64) -> Self {
        Self::Sphere { radius }
    }

    /// Create a box from half extents.
    #[must_use]
    pub fn cuboid(hx: f64, hy: f64, hz: f64) -> Self {
        Self::Box {
            half_extents: Vector3::new(hx, hy, hz),
        }
    }

    /// Check that every dimension is positive and finite.
    pub fn validate(&self, label: u32) -> Result<(), ContactError> {
        let dims: &[f64] = match self {
            Self::Sphere { radius } => &[*radius],
            Self::Box { half_extents } => half_extents.as_slice(),
            Self::Capsule { radius, height } | Self::Cone { radius, height } => {
                &[*radius, *height]
            }
        };
        if dims.iter().all(|d| d.is_finite() && *d > 0.0) {
            Ok(())
        } else {
            Err(ContactError::invalid_shape(
                label,
                format!("dimensions must be positive and finite: {self:?}"),
            ))
        }
    }
}

/// A shape attached to a body, with its current world transform.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeProxy {
    id: ShapeId,
    body: BodyId,
    shape: Shape,
    margin: f64,
    material: String,
    /// Offset from the body reference point, body frame.
    offset: Vector3<f64>,
    /// Shape orientation relative to the body.
    orientation: UnitQuaternion<f64>,
    world: Isometry3<f64>,
}

impl ShapeProxy {
    /// Create a proxy at the body origin.
    pub fn new(
        id: ShapeId,
        body: BodyId,
        shape: Shape,
        material: impl Into<String>,
    ) -> Result<Self, ContactError> {
        shape.validate(id.raw())?;
        Ok(Self {
            id,
            body,
            shape,
            margin: 0.0,
            material: material.into(),
            offset: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            world: Isometry3::identity(),
        })
    }

    /// Place the shape at an offset and orientation in the body frame.
    #[must_use]
    pub fn with_placement(
        mut self,
        offset: Vector3<f64>,
        orientation: UnitQuaternion<f64>,
    ) -> Self {
        self.offset = offset;
        self.orientation = orientation;
        self
    }

    /// Set the collision margin.
    pub fn with_margin(mut self, margin: f64) -> Result<Self, ContactError> {
        if !(margin.is_finite() && margin >= 0.0) {
            return Err(ContactError::invalid_shape(
                self.id.raw(),
                format!("margin must be finite and non-negative, got {margin}"),
            ));
        }
        self.margin = margin;
        Ok(self)
    }

    /// Shape label.
    #[must_use]
    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// Owning body.
    #[must_use]
    pub fn body(&self) -> BodyId {
        self.body
    }

    /// Shape primitive.
    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Collision margin (m).
    #[must_use]
    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Material name used for the material-pair lookup.
    #[must_use]
    pub fn material(&self) -> &str {
        &self.material
    }

    /// World transform as of the last [`Self::sync`].
    #[must_use]
    pub fn world_transform(&self) -> &Isometry3<f64> {
        &self.world
    }

    /// Recompute the world transform from the body's current pose:
    /// `x + R·offset`, `R·orientation`.
    pub fn sync(&mut self, body: &dyn RigidBodyKinematics) {
        let rotation = body.orientation();
        let translation = body.position() + rotation * self.offset;
        let body_rotation =
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation));
        self.world = Isometry3::from_parts(
            Translation3::from(translation),
            body_rotation * self.orientation,
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use sim_types::{Pose, RigidBodyState};

    #[test]
    fn test_invalid_dimensions_fail_fast() {
        assert!(ShapeProxy::new(ShapeId(1), BodyId(0), Shape::sphere(0.0), "steel").is_err());
        assert!(ShapeProxy::new(ShapeId(1), BodyId(0), Shape::cuboid(1.0, -1.0, 1.0), "steel")
            .is_err());
        let err = ShapeProxy::new(ShapeId(1), BodyId(0), Shape::sphere(1.0), "steel")
            .unwrap()
            .with_margin(-0.1)
            .unwrap_err();
        assert!(err.is_setup_error());
    }

    #[test]
    fn test_sync_follows_body_pose() {
        let mut proxy = ShapeProxy::new(ShapeId(3), BodyId(1), Shape::sphere(0.5), "rubber")
            .unwrap()
            .with_placement(Vector3::new(1.0, 0.0, 0.0), UnitQuaternion::identity());

        let rotation =
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2);
        let body = RigidBodyState::at_rest(
            Pose::from_position_rotation(Point3::new(0.0, 0.0, 2.0), rotation),
            0,
        );
        proxy.sync(&body);

        let center = proxy.world_transform() * Point3::origin();
        assert_relative_eq!(center, Point3::new(0.0, 1.0, 2.0), epsilon = 1e-12);
        assert_relative_eq!(
            proxy.world_transform().rotation.angle(),
            std::f64::consts::FRAC_PI_2,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_pair_swap() {
        let pair = ShapePair::new(ShapeId(2), ShapeId(1));
        assert_eq!(pair.swapped(), ShapePair::new(ShapeId(1), ShapeId(2)));
        assert_eq!(pair.to_string(), "(2, 1)");
    }
}
