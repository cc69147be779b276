//! Frictional unilateral contact elements for implicit multibody solvers.
//!
//! This crate fills the contact block of an implicit Newton-type solver's
//! residual and Jacobian. For every pair of shapes that may touch it:
//!
//! - reduces the two bodies' poses and velocities to a separation vector
//!   between body-fixed material points,
//! - evaluates a pluggable one-dimensional constitutive law for the normal
//!   force,
//! - decides per contact point between sliding (Coulomb-limited force) and
//!   sticking (two tangential reaction unknowns with a zero-velocity
//!   constraint), and keeps that decision across Newton iterations,
//! - assembles the exact analytic Jacobian of all of the above.
//!
//! # Contact Model
//!
//! With `d` the separation between the material points and `L0` the law's
//! reference length:
//!
//! ```text
//! F_n = law(|d| / L0, (d·ḋ / |d|) / L0)
//! F   = d · F_n / |d|
//! ```
//!
//! A point is active only when the material points have crossed,
//! `d·(x2 - x1) < 0`. Sliding points apply `μ·F_n` along the trial
//! tangential force; sticking points apply `λ1·e1 + λ2·e2` and constrain the
//! tangential velocity to zero.
//!
//! # Structural Changes
//!
//! Every residual pass returns an [`AssemblyStatus`]. When it is
//! [`AssemblyStatus::StructuralChange`] the set or meaning of the equations
//! changed (a point switched regime or the number of unknowns changed) and
//! the caller must assemble a fresh Jacobian before iterating further.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use nalgebra::Point3;
//! use sim_frictional_contact::{
//!     ContactConfig, ContactSetManager, LinearViscoelastic, MaterialPairSpec, MaterialTable,
//!     Shape, ShapeId, ShapeProxy, ShapeRegistry, SphereContactSource,
//! };
//! use sim_types::{BodyId, Pose, RigidBodyState};
//!
//! let mut registry = ShapeRegistry::new();
//! registry.register(ShapeProxy::new(ShapeId(1), BodyId(0), Shape::sphere(1.0), "steel")?)?;
//! registry.register(ShapeProxy::new(ShapeId(2), BodyId(1), Shape::sphere(1.0), "steel")?)?;
//!
//! let materials = MaterialTable::new().with_pair(
//!     "steel",
//!     "steel",
//!     MaterialPairSpec::frictionless(LinearViscoelastic::new(1000.0, 0.0)),
//! )?;
//!
//! let mut contacts = ContactSetManager::new(
//!     &registry,
//!     &[ShapeId(1), ShapeId(2)],
//!     &materials,
//!     SphereContactSource::new(),
//!     ContactConfig::default(),
//! )?;
//! contacts.set_first_index(12);
//!
//! let bodies = BTreeMap::from([
//!     (BodyId(0), RigidBodyState::at_rest(Pose::identity(), 0)),
//!     (BodyId(1), RigidBodyState::at_rest(Pose::from_position(Point3::new(0.0, 0.0, 1.99)), 6)),
//! ]);
//!
//! let state = vec![0.0; 14];
//! let assembly = contacts.compute_residual(&bodies, &state, 1.0)?;
//! assert!(assembly.status.is_structural_change()); // first activation
//!
//! let report = contacts.reports().next().unwrap();
//! assert!((report.normal_force - 10.0).abs() < 1e-9);
//!
//! let jacobian = contacts.compute_jacobian(&bodies, &state, 1.0)?;
//! assert_eq!(jacobian.len(), 1);
//! # Ok::<(), sim_frictional_contact::ContactError>(())
//! ```
//!
//! # Layer 0 Crate
//!
//! This crate has no engine or rendering dependencies. Collision detection
//! and the outer solver are external; they meet this crate through
//! [`ContactGeometrySource`] and [`sim_types::BodySet`].

#![doc(html_root_url = "https://docs.rs/sim-frictional-contact/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn, clippy::suboptimal_flops)]

mod basis;
mod config;
mod element;
mod error;
mod friction;
mod geometry;
pub mod gradient;
mod law;
mod manager;
mod material;
mod point;
mod registry;
mod shape;
mod status;
mod workspace;

pub use basis::TangentBasis;
pub use config::ContactConfig;
pub use element::ContactPairElement;
pub use error::ContactError;
pub use friction::{CoulombFriction, FrictionLaw, StaticKineticFriction, StribeckFriction};
pub use geometry::{ContactGeometrySource, RawContact, SphereContactSource};
pub use law::{LawResponse, LinearViscoelastic, NormalConstitutiveLaw, PowerLawViscoelastic};
pub use manager::{ContactSetManager, ResidualAssembly};
pub use material::{FrictionSpec, MaterialPairSpec, MaterialTable};
pub use point::{
    ContactKey, ContactPoint, ContactRegime, ContactReport, ContactState, EquationSignature,
    FeatureId, StickSlip,
};
pub use registry::ShapeRegistry;
pub use shape::{Shape, ShapeId, ShapePair, ShapeProxy};
pub use status::AssemblyStatus;
pub use workspace::{Footprint, LayoutCursor, WorkMatrix, WorkVector};

// Re-export types needed to drive a contact set
pub use sim_types::{BodyId, BodySet, RigidBodyKinematics, RigidBodyState};
