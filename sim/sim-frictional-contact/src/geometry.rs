//! Interface to collision detection.
//!
//! The contact core consumes detected contacts; it does not find them. A
//! [`ContactGeometrySource`] is called exactly once per residual pass with
//! the tracked shape proxies (already synchronized with their bodies) and
//! returns a finite list of [`RawContact`]s. Order within a pair is
//! insertion order.
//!
//! [`SphereContactSource`] is a brute-force sphere/sphere narrow phase that
//! ships for tests and small demos.

use nalgebra::{Point3, Vector3};
use smallvec::SmallVec;
use tracing::trace;

use crate::{FeatureId, Shape, ShapeId, ShapeProxy};

/// One contact as reported by a geometry source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawContact {
    /// First shape of the detected pair.
    pub shape_a: ShapeId,
    /// Second shape of the detected pair.
    pub shape_b: ShapeId,
    /// Surface point on shape A, world frame.
    pub point_on_a: Point3<f64>,
    /// Surface point on shape B, world frame.
    pub point_on_b: Point3<f64>,
    /// Unit normal from A towards B, world frame.
    pub normal: Vector3<f64>,
    /// Penetration depth reported by the detector.
    pub depth: f64,
    /// Surface feature, if the detector tracks one.
    pub feature: Option<FeatureId>,
}

impl RawContact {
    /// Build a contact from two surface points; normal and depth are derived
    /// from them.
    #[must_use]
    pub fn from_points(
        shape_a: ShapeId,
        shape_b: ShapeId,
        point_on_a: Point3<f64>,
        point_on_b: Point3<f64>,
    ) -> Self {
        let gap = point_on_b - point_on_a;
        let depth = gap.norm();
        let normal = if depth > 0.0 { -gap / depth } else { Vector3::zeros() };
        Self {
            shape_a,
            shape_b,
            point_on_a,
            point_on_b,
            normal,
            depth,
            feature: None,
        }
    }

    /// Attach a feature ID.
    #[must_use]
    pub fn with_feature(mut self, feature: FeatureId) -> Self {
        self.feature = Some(feature);
        self
    }

    /// The same contact with A and B exchanged.
    #[must_use]
    pub fn swapped(self) -> Self {
        Self {
            shape_a: self.shape_b,
            shape_b: self.shape_a,
            point_on_a: self.point_on_b,
            point_on_b: self.point_on_a,
            normal: -self.normal,
            ..self
        }
    }
}

/// Collision detection over the tracked shapes.
pub trait ContactGeometrySource {
    /// Detect contacts among `proxies`. Called once per residual pass.
    fn detect(&mut self, proxies: &[ShapeProxy]) -> Vec<RawContact>;
}

impl<F> ContactGeometrySource for F
where
    F: FnMut(&[ShapeProxy]) -> Vec<RawContact>,
{
    fn detect(&mut self, proxies: &[ShapeProxy]) -> Vec<RawContact> {
        self(proxies)
    }
}

/// Brute-force sphere/sphere detection.
///
/// Every pair of sphere proxies on different bodies is tested; other shape
/// combinations produce nothing. Radii include the collision margin.
#[derive(Debug, Clone, Copy, Default)]
pub struct SphereContactSource;

impl SphereContactSource {
    /// Create the source.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ContactGeometrySource for SphereContactSource {
    fn detect(&mut self, proxies: &[ShapeProxy]) -> Vec<RawContact> {
        let spheres: SmallVec<[(&ShapeProxy, Point3<f64>, f64); 16]> = proxies
            .iter()
            .filter_map(|p| match p.shape() {
                Shape::Sphere { radius } => Some((
                    p,
                    p.world_transform() * Point3::origin(),
                    radius + p.margin(),
                )),
                _ => None,
            })
            .collect();

        let mut contacts = Vec::new();
        for (i, (a, center_a, radius_a)) in spheres.iter().enumerate() {
            for (b, center_b, radius_b) in &spheres[i + 1..] {
                if a.body() == b.body() {
                    continue;
                }
                let axis = center_b - center_a;
                let distance = axis.norm();
                let depth = radius_a + radius_b - distance;
                if depth <= 0.0 || distance <= 0.0 {
                    continue;
                }
                let normal = axis / distance;
                contacts.push(RawContact {
                    shape_a: a.id(),
                    shape_b: b.id(),
                    point_on_a: center_a + normal * *radius_a,
                    point_on_b: center_b - normal * *radius_b,
                    normal,
                    depth,
                    feature: Some(FeatureId::new(0)),
                });
            }
        }
        trace!(candidates = spheres.len(), contacts = contacts.len(), "sphere detection");
        contacts
    }
}
