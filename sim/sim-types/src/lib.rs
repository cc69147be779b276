//! Core body types for contact elements.
//!
//! This crate provides the foundational types a contact element needs from
//! the surrounding multibody solver:
//!
//! - [`RigidBodyState`] - Pose, velocity, spin compliance and DOF offset
//! - [`RigidBodyKinematics`] - Read-only kinematic accessors
//! - [`BodySet`] - Lookup of bodies by [`BodyId`]
//!
//! # Design Philosophy
//!
//! These types are **pure data** plus accessor traits. Bodies are owned by
//! the outer solver; contact code only ever borrows them for the duration of
//! one evaluation.
//!
//! # Example
//!
//! ```
//! use sim_types::{BodyId, BodySet, Pose, RigidBodyState};
//! use nalgebra::Point3;
//! use std::collections::BTreeMap;
//!
//! let mut bodies = BTreeMap::new();
//! bodies.insert(
//!     BodyId::new(0),
//!     RigidBodyState::at_rest(Pose::from_position(Point3::new(0.0, 0.0, 1.0)), 0),
//! );
//!
//! let body = bodies.body(BodyId::new(0)).unwrap();
//! assert_eq!(body.position().z, 1.0);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
)]

mod body;
mod kinematics;

pub use body::{BodyId, Pose, RigidBodyState, SpinCompliance, Twist};
pub use kinematics::{BodySet, RigidBodyKinematics};

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
